//! Demonstration of the Pulse Sync pipeline without a network or sensor.
//!
//! This example shows how to:
//! 1. Build a replay dataset whose channel B is a synthetic companion
//! 2. Attach it to a scheduler
//! 3. Subscribe an in-process viewer to the broadcaster
//! 4. Print each correlation frame as it is published
//!
//! Run with: cargo run --example replay_demo

use std::sync::Arc;
use std::time::Duration;

use pulse_sync::{
    broadcast::Broadcaster,
    core::{CorrelationFrame, ReplayCursor, ReplayDataset},
    scheduler::{DataSource, SchedulerConfig, StreamScheduler},
    sensor::CompanionGenerator,
    stats::create_shared_stats,
    SYNTHETIC_COMPANION_NOTICE,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Pulse Sync - Replay Demo");
    println!("========================");
    println!();
    println!("{SYNTHETIC_COMPANION_NOTICE}");

    // Ten seconds of a 50 Hz pulse-like waveform
    let sampling_rate = 50;
    let channel_a: Vec<f64> = (0..sampling_rate * 10)
        .map(|i| {
            let t = i as f64 / sampling_rate as f64;
            72.0 + 6.0 * (2.0 * std::f64::consts::PI * 1.2 * t).sin()
        })
        .collect();
    let dataset = ReplayDataset {
        sampling_rate,
        channel_a,
        channel_b: None,
    };
    dataset.validate()?;

    // Noise grows from none to heavy so the synchrony visibly drops
    for std_dev in [0.0, 2.0, 8.0] {
        println!("Companion noise std = {std_dev}");

        let mut companion = CompanionGenerator::new(std_dev, Some(42));
        let cursor = ReplayCursor::from_dataset(dataset.clone(), &mut companion);

        let broadcaster = Arc::new(Broadcaster::new());
        let stats = create_shared_stats();
        let (tx, mut rx) = mpsc::channel::<Arc<str>>(32);
        broadcaster.subscribe(tx);

        let config = SchedulerConfig {
            tick_interval: Duration::from_millis(100),
            ..SchedulerConfig::default()
        };
        let mut scheduler = StreamScheduler::new(config, broadcaster, stats.clone());
        scheduler.attach(DataSource::Replay(cursor))?;
        let run = tokio::spawn(scheduler.run());

        while let Some(payload) = rx.recv().await {
            let frame: CorrelationFrame = serde_json::from_str(&payload)?;
            println!(
                "  t={:>2}s  a={:>6.2}  b={:>6.2}  synchrony={:.3}",
                frame.time, frame.channel_a_value, frame.channel_b_value, frame.correlation
            );
        }

        let reason = run.await??;
        println!("  stopped: {reason}");
        println!();
    }

    Ok(())
}
