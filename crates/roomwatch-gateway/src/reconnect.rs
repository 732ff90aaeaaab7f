//! Bounded reconnect policy layered outside the transport.
//!
//! The transport itself never retries. When `max_attempts > 0` the gateway
//! retries a failed open with exponential backoff, and re-arms the same
//! policy after the device drops.

use std::time::Duration;

use roomwatch_serial::{SerialError, SerialResult, SerialTransport};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Retries after the first failed attempt (0 = single attempt, no retry).
    #[serde(default)]
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        // base * 2^(attempt-1): 1 -> base, 2 -> 2*base, 3 -> 4*base
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Open the transport, retrying per `policy`.
///
/// Returns the last open error once attempts run out, or
/// `SerialError::Aborted` if `shutdown` fires while waiting.
pub async fn connect_with_retry(
    transport: &SerialTransport,
    policy: &ReconnectConfig,
    shutdown: &CancellationToken,
) -> SerialResult<()> {
    let mut attempt = 0u32;
    loop {
        if shutdown.is_cancelled() {
            return Err(SerialError::Aborted);
        }

        let err = match transport.connect().await {
            Ok(()) => return Ok(()),
            Err(e @ (SerialError::AlreadyConnecting | SerialError::Aborted)) => return Err(e),
            Err(e) => e,
        };

        if attempt >= policy.max_attempts {
            return Err(err);
        }
        attempt += 1;

        let delay = policy.backoff_delay(attempt);
        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Serial open failed, retrying"
        );

        // Cancellation-aware sleep
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = shutdown.cancelled() => {
                info!("Shutdown requested during backoff");
                return Err(SerialError::Aborted);
            }
        }
    }
}
