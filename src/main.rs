use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use ble_notify_logger::btle::BtleTransport;
use ble_notify_logger::logging::init_logger;
use ble_notify_logger::{Args, LoggerSession, SessionOutcome};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level)?;

    let config = args.session_config();
    info!(
        "Logging {} / {} from {} to {}",
        config.endpoint.service,
        config.endpoint.characteristic,
        config.endpoint.address,
        config.log_path.display()
    );

    let transport = BtleTransport::new(args.scan_timeout())
        .await
        .context("Bluetooth is unavailable")?;
    let mut session = LoggerSession::new(transport, config);

    let report = session.run(interrupted()).await?;
    match report.outcome {
        SessionOutcome::Interrupted => println!("\nStopped by user."),
        SessionOutcome::Disconnected => println!("Peripheral disconnected."),
        SessionOutcome::StreamClosed => println!("Notification stream ended."),
        SessionOutcome::DurationElapsed => println!("Capture finished."),
    }
    info!(
        "{} records written, {} skipped",
        report.records_written, report.records_skipped
    );
    Ok(())
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        futures::future::pending::<()>().await;
    }
}
