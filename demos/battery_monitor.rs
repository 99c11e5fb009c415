//! Monitor battery reports pushed by a connected accessory.
//!
//! Run with: cargo run --example battery_monitor

use otobuds_ble::{BleTransport, DeviceSession, Result, SessionEvent};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("otobuds_ble=info".parse().unwrap()),
        )
        .init();

    let session = DeviceSession::new(BleTransport::new().await?);
    let mut events = session.subscribe_events();

    println!("Scanning...");
    session.start_scan().await?;

    let device = loop {
        let event = tokio::time::timeout(Duration::from_secs(15), events.recv()).await;
        match event {
            Ok(Ok(SessionEvent::DeviceDiscovered(device))) if device.name.is_some() => {
                break device;
            }
            Ok(Ok(_)) => continue,
            Ok(Err(_)) | Err(_) => {
                println!("No accessory found.");
                session.disconnect().await?;
                return Ok(());
            }
        }
    };

    println!("Connecting to {}...", device.display_name());
    session.select_device(&device).await?;
    println!("Connected. Waiting for battery reports (Ctrl+C to exit).\n");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::BatteryUpdated(reading)) => {
                        let marker = if reading.is_plausible() { "" } else { " (out of range!)" };
                        println!(
                            "[{}] Battery: {}%{}",
                            reading.received_at.format("%H:%M:%S"),
                            reading.percent,
                            marker
                        );
                    }
                    Ok(SessionEvent::PhaseChanged(phase)) => {
                        println!("Phase: {}", phase);
                        if phase.is_failed() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted!");
                break;
            }
        }
    }

    session.disconnect().await?;
    println!("Done!");

    Ok(())
}
