//! Integration tests for the stream scheduler

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use pulse_sync::broadcast::Broadcaster;
use pulse_sync::core::{CorrelationFrame, ReplayCursor};
use pulse_sync::error::{IngestionError, SchedulerError};
use pulse_sync::scheduler::{
    DataSource, SchedulerConfig, SchedulerState, StopReason, StreamScheduler,
};
use pulse_sync::sensor::{
    decoder::encode_heart_rate, CompanionGenerator, LiveFeed, Notification, SensorKind, SensorLink,
    SimulatedConfig, SimulatedSensor,
};
use pulse_sync::stats::create_shared_stats;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        tick_interval: Duration::from_millis(10),
        max_session: None,
        window_capacity: 30,
        min_samples: 5,
    }
}

fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 70.0 + 5.0 * (i as f64 / 4.0).sin() + (i % 3) as f64)
        .collect()
}

/// Collect frames until the broadcaster closes the connection.
async fn collect(mut rx: mpsc::Receiver<Arc<str>>) -> Vec<CorrelationFrame> {
    let mut frames = Vec::new();
    while let Some(payload) = rx.recv().await {
        frames.push(serde_json::from_str(&payload).expect("frame should parse"));
    }
    frames
}

/// Link driven by the test instead of a device.
struct ScriptedLink {
    sink: Arc<Mutex<Option<Sender<Notification>>>>,
    stops: Arc<Mutex<u32>>,
    fail_start: bool,
    fail_stop: bool,
}

impl SensorLink for ScriptedLink {
    fn address(&self) -> &str {
        "AA:BB:CC:DD:EE:FF"
    }

    fn start_notify(
        &mut self,
        characteristic: &str,
        sink: Sender<Notification>,
    ) -> Result<(), IngestionError> {
        if self.fail_start {
            return Err(IngestionError::Subscribe {
                characteristic: characteristic.to_string(),
                reason: "not paired".to_string(),
            });
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop_notify(&mut self, characteristic: &str) -> Result<(), IngestionError> {
        *self.stops.lock() += 1;
        if self.fail_stop {
            return Err(IngestionError::Unsubscribe {
                characteristic: characteristic.to_string(),
                reason: "device unreachable".to_string(),
            });
        }
        self.sink.lock().take();
        Ok(())
    }
}

struct Scripted {
    feed: LiveFeed,
    sink: Arc<Mutex<Option<Sender<Notification>>>>,
    stops: Arc<Mutex<u32>>,
}

fn scripted(fail_start: bool) -> Scripted {
    scripted_with(fail_start, false)
}

fn scripted_with(fail_start: bool, fail_stop: bool) -> Scripted {
    let sink = Arc::new(Mutex::new(None));
    let stops = Arc::new(Mutex::new(0));
    let link = ScriptedLink {
        sink: sink.clone(),
        stops: stops.clone(),
        fail_start,
        fail_stop,
    };
    let feed = LiveFeed::new(
        Box::new(link),
        SensorKind::HeartRate,
        CompanionGenerator::new(0.0, Some(7)),
        256,
    );
    Scripted { feed, sink, stops }
}

#[tokio::test]
async fn test_replay_shorter_than_window_publishes_nothing() {
    let broadcaster = Arc::new(Broadcaster::new());
    let stats = create_shared_stats();
    let (tx, rx) = mpsc::channel(16);
    broadcaster.subscribe(tx);

    let a = wave(99);
    let mut scheduler = StreamScheduler::new(fast_config(), broadcaster.clone(), stats.clone());
    scheduler
        .attach(DataSource::Replay(ReplayCursor::new(a.clone(), a, 100)))
        .unwrap();
    let handle = scheduler.handle();

    let reason = scheduler.run().await.unwrap();
    assert_eq!(reason, StopReason::ReplayExhausted);
    assert_eq!(handle.state(), SchedulerState::Stopped(StopReason::ReplayExhausted));

    assert!(collect(rx).await.is_empty());
    assert_eq!(stats.snapshot().frames_published, 0);
    assert_eq!(broadcaster.subscriber_count(), 0);
}

#[tokio::test]
async fn test_replay_identical_channels_are_fully_synchronous() {
    let broadcaster = Arc::new(Broadcaster::new());
    let (tx, rx) = mpsc::channel(64);
    broadcaster.subscribe(tx);

    let a = wave(5 * 20 + 7);
    let mut scheduler =
        StreamScheduler::new(fast_config(), broadcaster.clone(), create_shared_stats());
    scheduler
        .attach(DataSource::Replay(ReplayCursor::new(a.clone(), a.clone(), 20)))
        .unwrap();

    assert_eq!(scheduler.run().await.unwrap(), StopReason::ReplayExhausted);

    let frames = collect(rx).await;
    assert_eq!(frames.len(), 5);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.time, i as u64);
        assert!((frame.correlation - 1.0).abs() < 1e-9);
        assert_eq!(frame.channel_a_value, frame.channel_b_value);
        // Latest value is the last sample of the slice
        assert_eq!(frame.channel_a_value, a[i * 20 + 19]);
    }
}

#[tokio::test]
async fn test_replay_anticorrelated_channels() {
    let broadcaster = Arc::new(Broadcaster::new());
    let (tx, rx) = mpsc::channel(64);
    broadcaster.subscribe(tx);

    let a = wave(40);
    let b: Vec<f64> = a.iter().map(|v| 200.0 - v).collect();
    let mut scheduler =
        StreamScheduler::new(fast_config(), broadcaster.clone(), create_shared_stats());
    scheduler
        .attach(DataSource::Replay(ReplayCursor::new(a, b, 20)))
        .unwrap();
    scheduler.run().await.unwrap();

    let frames = collect(rx).await;
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.correlation.abs() < 1e-9));
}

#[tokio::test]
async fn test_flat_replay_publishes_neutral_frames() {
    let broadcaster = Arc::new(Broadcaster::new());
    let stats = create_shared_stats();
    let (tx, rx) = mpsc::channel(64);
    broadcaster.subscribe(tx);

    let flat = vec![72.0; 30];
    let mut scheduler = StreamScheduler::new(fast_config(), broadcaster.clone(), stats.clone());
    scheduler
        .attach(DataSource::Replay(ReplayCursor::new(flat.clone(), flat, 10)))
        .unwrap();
    scheduler.run().await.unwrap();

    let frames = collect(rx).await;
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.correlation == 0.0));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.frames_published, 3);
    assert_eq!(snapshot.neutral_frames, 3);
}

#[tokio::test]
async fn test_dropped_subscriber_does_not_disturb_others() {
    let broadcaster = Arc::new(Broadcaster::new());
    let stats = create_shared_stats();
    let (tx_a, rx_a) = mpsc::channel(64);
    let (tx_b, mut rx_b) = mpsc::channel(64);
    let (tx_c, rx_c) = mpsc::channel(64);
    broadcaster.subscribe(tx_a);
    broadcaster.subscribe(tx_b);
    broadcaster.subscribe(tx_c);

    let a = wave(20 * 10);
    let mut config = fast_config();
    config.tick_interval = Duration::from_millis(20);
    let mut scheduler = StreamScheduler::new(config, broadcaster.clone(), stats.clone());
    scheduler
        .attach(DataSource::Replay(ReplayCursor::new(a.clone(), a, 10)))
        .unwrap();
    let run = tokio::spawn(scheduler.run());

    // Second viewer leaves after two frames
    let mut seen_by_b = 0;
    while seen_by_b < 2 {
        rx_b.recv().await.expect("frame for b");
        seen_by_b += 1;
    }
    drop(rx_b);

    assert_eq!(run.await.unwrap().unwrap(), StopReason::ReplayExhausted);

    for frames in [collect(rx_a).await, collect(rx_c).await] {
        assert_eq!(frames.len(), 20);
        let times: Vec<u64> = frames.iter().map(|f| f.time).collect();
        assert_eq!(times, (0..20).collect::<Vec<u64>>());
    }
    assert_eq!(stats.snapshot().subscribers_dropped, 1);
}

#[tokio::test]
async fn test_session_duration_elapses() {
    let broadcaster = Arc::new(Broadcaster::new());
    let stats = create_shared_stats();
    let a = wave(10 * 1000);

    let mut config = fast_config();
    config.max_session = Some(Duration::from_millis(55));
    let mut scheduler = StreamScheduler::new(config, broadcaster, stats.clone());
    scheduler
        .attach(DataSource::Replay(ReplayCursor::new(a.clone(), a, 10)))
        .unwrap();
    let handle = scheduler.handle();

    let reason = scheduler.run().await.unwrap();
    assert_eq!(reason, StopReason::SessionElapsed);
    assert!(handle.is_stopped());

    let published = stats.snapshot().frames_published;
    assert!(published >= 1 && published < 1000, "published {published}");
}

#[tokio::test]
async fn test_live_feed_streams_and_releases_on_cancel() {
    let Scripted { feed, sink, stops } = scripted(false);
    let broadcaster = Arc::new(Broadcaster::new());
    let stats = create_shared_stats();
    let (tx, mut rx) = mpsc::channel(64);
    broadcaster.subscribe(tx);

    let mut scheduler = StreamScheduler::new(fast_config(), broadcaster.clone(), stats.clone());
    scheduler.attach(DataSource::Live(feed)).unwrap();
    scheduler.start().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);
    let handle = scheduler.handle();

    {
        let guard = sink.lock();
        let sink = guard.as_ref().expect("subscribed");
        for bpm in [62u16, 75, 68, 81, 70, 90, 66, 77] {
            sink.send(Notification::Payload(encode_heart_rate(bpm))).unwrap();
        }
        // Malformed payloads are skipped
        sink.send(Notification::Payload(vec![0x01, 0x48])).unwrap();
    }

    let run = tokio::spawn(scheduler.run());

    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("frame within timeout")
        .expect("open connection");
    let frame: CorrelationFrame = serde_json::from_str(&payload).unwrap();
    assert_eq!(frame.time, 0);
    assert_eq!(frame.channel_a_value, 77.0);
    assert_eq!(frame.channel_b_value, 77.0);
    assert!((frame.correlation - 1.0).abs() < 1e-9);

    handle.stop();
    assert_eq!(run.await.unwrap().unwrap(), StopReason::Cancelled);
    assert_eq!(*stops.lock(), 1);
    assert!(sink.lock().is_none());

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.samples_ingested, 8);
    assert_eq!(snapshot.samples_rejected, 1);
    assert_eq!(broadcaster.subscriber_count(), 0);
}

#[tokio::test]
async fn test_live_feed_too_few_samples_is_neutral() {
    let Scripted { feed, sink, stops } = scripted(false);
    let broadcaster = Arc::new(Broadcaster::new());
    let (tx, mut rx) = mpsc::channel(64);
    broadcaster.subscribe(tx);

    let mut scheduler =
        StreamScheduler::new(fast_config(), broadcaster.clone(), create_shared_stats());
    scheduler.attach(DataSource::Live(feed)).unwrap();
    scheduler.start().unwrap();
    let handle = scheduler.handle();

    for bpm in [60u16, 64, 70] {
        sink.lock()
            .as_ref()
            .unwrap()
            .send(Notification::Payload(encode_heart_rate(bpm)))
            .unwrap();
    }

    let run = tokio::spawn(scheduler.run());
    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let frame: CorrelationFrame = serde_json::from_str(&payload).unwrap();
    assert_eq!(frame.correlation, 0.0);

    handle.stop();
    run.await.unwrap().unwrap();
    assert_eq!(*stops.lock(), 1);
}

#[tokio::test]
async fn test_lost_device_stops_session_and_releases() {
    let Scripted { feed, sink, stops } = scripted(false);
    let broadcaster = Arc::new(Broadcaster::new());
    let (tx, rx) = mpsc::channel(16);
    broadcaster.subscribe(tx);

    let mut scheduler =
        StreamScheduler::new(fast_config(), broadcaster.clone(), create_shared_stats());
    scheduler.attach(DataSource::Live(feed)).unwrap();
    scheduler.start().unwrap();
    let handle = scheduler.handle();

    sink.lock()
        .as_ref()
        .unwrap()
        .send(Notification::Lost("link supervision timeout".to_string()))
        .unwrap();

    let reason = scheduler.run().await.unwrap();
    assert!(matches!(reason, StopReason::IngestionFailed(ref msg) if msg.contains("supervision")));
    assert_eq!(handle.state(), SchedulerState::Stopped(reason));
    assert_eq!(*stops.lock(), 1);

    // Subscribers are closed on the failure path too
    assert!(collect(rx).await.is_empty());
}

#[tokio::test]
async fn test_failed_subscription_is_reported() {
    let Scripted { feed, stops, .. } = scripted(true);
    let broadcaster = Arc::new(Broadcaster::new());

    let mut scheduler = StreamScheduler::new(fast_config(), broadcaster, create_shared_stats());
    scheduler.attach(DataSource::Live(feed)).unwrap();
    let handle = scheduler.handle();

    let err = scheduler.run().await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Ingestion(IngestionError::Subscribe { .. })
    ));
    assert!(matches!(
        handle.state(),
        SchedulerState::Stopped(StopReason::IngestionFailed(_))
    ));
    // Never subscribed, so nothing to release
    assert_eq!(*stops.lock(), 0);
}

#[tokio::test]
async fn test_lifecycle_errors() {
    let broadcaster = Arc::new(Broadcaster::new());
    let mut scheduler =
        StreamScheduler::new(fast_config(), broadcaster.clone(), create_shared_stats());
    assert!(matches!(scheduler.start(), Err(SchedulerError::NoDataSource)));

    let a = wave(40);
    scheduler
        .attach(DataSource::Replay(ReplayCursor::new(a.clone(), a.clone(), 20)))
        .unwrap();
    scheduler.start().unwrap();
    assert!(matches!(
        scheduler.attach(DataSource::Replay(ReplayCursor::new(a.clone(), a, 20))),
        Err(SchedulerError::AlreadyStarted)
    ));
    assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyStarted)));

    assert_eq!(scheduler.run().await.unwrap(), StopReason::ReplayExhausted);
}

#[tokio::test]
async fn test_failed_unsubscribe_still_closes_subscribers() {
    let Scripted { feed, sink, stops } = scripted_with(false, true);
    let broadcaster = Arc::new(Broadcaster::new());
    let (tx, mut rx) = mpsc::channel(64);
    broadcaster.subscribe(tx);

    let mut scheduler =
        StreamScheduler::new(fast_config(), broadcaster.clone(), create_shared_stats());
    scheduler.attach(DataSource::Live(feed)).unwrap();
    scheduler.start().unwrap();
    let handle = scheduler.handle();

    for bpm in [60u16, 66, 71, 64, 80, 75] {
        sink.lock()
            .as_ref()
            .unwrap()
            .send(Notification::Payload(encode_heart_rate(bpm)))
            .unwrap();
    }

    let run = tokio::spawn(scheduler.run());
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("frame within timeout")
        .expect("open connection");

    handle.stop();
    assert_eq!(run.await.unwrap().unwrap(), StopReason::Cancelled);
    assert_eq!(handle.state(), SchedulerState::Stopped(StopReason::Cancelled));
    assert_eq!(*stops.lock(), 1);

    // Remaining queued frames drain, then the connection ends
    while rx.recv().await.is_some() {}
    assert_eq!(broadcaster.subscriber_count(), 0);
}

#[tokio::test]
async fn test_simulated_sensor_teardown_is_prompt() {
    let kind = SensorKind::HeartRate;
    let mut sensor_config = SimulatedConfig::for_kind(kind);
    sensor_config.seed = Some(11);
    let feed = LiveFeed::new(
        Box::new(SimulatedSensor::new(sensor_config)),
        kind,
        CompanionGenerator::new(0.0, Some(11)),
        64,
    );

    let broadcaster = Arc::new(Broadcaster::new());
    let mut scheduler = StreamScheduler::new(fast_config(), broadcaster, create_shared_stats());
    scheduler.attach(DataSource::Live(feed)).unwrap();
    let handle = scheduler.handle();
    let run = tokio::spawn(scheduler.run());

    // Let the generator settle into its one-second wait
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    handle.stop();
    assert_eq!(run.await.unwrap().unwrap(), StopReason::Cancelled);
    let elapsed = started.elapsed();

    // Well under the one-second notification period
    assert!(elapsed < Duration::from_millis(300), "teardown took {elapsed:?}");
    assert!(handle.is_stopped());
}
