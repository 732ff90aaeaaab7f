//! Roomwatch gateway - Entry Point
//!
//! Reads JSON sensor lines from the serial device and serves them to
//! browsers over HTTP and WebSocket.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Roomwatch serial-to-WebSocket gateway
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ROOMWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Serial device path, overrides `serial.port`
    #[arg(short, long)]
    port: Option<String>,

    /// Print available serial devices and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_ports {
        let ports = roomwatch_serial::list_ports();
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            match port.manufacturer {
                Some(manufacturer) => println!("{} ({manufacturer})", port.path),
                None => println!("{}", port.path),
            }
        }
        return Ok(());
    }

    let mut config = roomwatch_gateway::AppConfig::load(args.config)?;
    if let Some(port) = args.port {
        config.serial.port = port;
        config.validate()?;
    }

    roomwatch_telemetry::init_logging(config.debug_logging())?;
    info!(
        port = %config.serial.port,
        dashboard = %config.dashboard.listen_addr(),
        "Configuration loaded"
    );

    let app = roomwatch_gateway::Application::new(config)?;
    app.run().await?;

    Ok(())
}
