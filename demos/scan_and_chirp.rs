//! Walkthrough: discover an accessory, connect, and play a test chirp.
//!
//! Run with: cargo run --example scan_and_chirp

use otobuds_ble::{BleTransport, Command, DeviceSession, Result, SessionEvent};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("otobuds_ble=debug".parse().unwrap()),
        )
        .init();

    println!("Scanning for Otobuds accessories...");
    println!("Make sure the earbuds are out of the case!\n");

    let session = DeviceSession::new(BleTransport::new().await?);
    let mut events = session.subscribe_events();

    session.start_scan().await?;

    // Wait up to 15 seconds for a named accessory.
    let device = loop {
        let event = tokio::time::timeout(Duration::from_secs(15), events.recv()).await;
        match event {
            Ok(Ok(SessionEvent::DeviceDiscovered(device))) => {
                println!(
                    "  Found: {} ({}) RSSI: {:?} dBm",
                    device.display_name(),
                    device.identifier,
                    device.rssi
                );
                if device.name.is_some() {
                    break device;
                }
            }
            Ok(Ok(_)) => continue,
            Ok(Err(_)) | Err(_) => {
                println!("No named accessory found; giving up.");
                session.disconnect().await?;
                return Ok(());
            }
        }
    };

    println!("\nConnecting to {}...", device.display_name());
    session.select_device(&device).await?;
    println!("Session ready (phase: {})", session.phase());

    // Configure a 440 Hz -> 880 Hz sweep over 100 ms at amplitude 1200,
    // capture 20 ms after playback starts for 500 ms total, then play.
    session
        .dispatch(&Command::chirp_config(440, 880, 100, 1200)?)
        .await?;
    session.dispatch(&Command::mic_config(20, 500)?).await?;
    session.dispatch(&Command::Play).await?;

    println!("Chirp dispatched. Listening for battery reports for 10s...");

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(10)) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted!");
        }
    }

    match session.battery_percent() {
        Some(percent) => println!("Battery: {}%", percent),
        None => println!("Battery: unknown (no report received)"),
    }

    session.disconnect().await?;
    println!("Done!");

    Ok(())
}
