//! Serial transport for the roomwatch sensor gateway.
//!
//! Owns the physical connection to the microcontroller and provides:
//! - Single-attempt open/close lifecycle with a small event stream
//! - Delimiter-based line splitting with bounded line length
//! - JSON decoding of each line into a `Reading` (malformed lines are dropped)
//! - Fire-and-forget command writes through a cloneable `CommandHandle`
//! - Host port enumeration

pub mod command_handle;
pub mod config;
pub mod error;
pub mod line;
#[cfg(any(test, feature = "test-util"))]
pub mod loopback;
pub mod port;
pub mod transport;

pub use command_handle::CommandHandle;
pub use config::SerialConfig;
pub use error::{SerialError, SerialResult};
pub use line::{decode_line, Frame, LineSplitter};
#[cfg(any(test, feature = "test-util"))]
pub use loopback::{LoopbackDevice, LoopbackOpener};
pub use port::{list_ports, PortInfo, PortOpener, SerialIo, SystemPortOpener};
pub use transport::{ConnectionState, SerialTransport, TransportEvent};
