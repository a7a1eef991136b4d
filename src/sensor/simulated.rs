//! Simulated sensor link.
//!
//! Emits device-shaped payloads from a background thread so the pipeline can
//! run end to end without Bluetooth hardware.

use crate::error::IngestionError;
use crate::sensor::decoder::{encode_ecg, encode_heart_rate};
use crate::sensor::link::SensorLink;
use crate::sensor::types::{Notification, SensorKind};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Address reported by the simulated device.
pub const SIMULATED_ADDRESS: &str = "00:00:00:00:00:00";

/// Configuration for the simulated sensor.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    pub kind: SensorKind,
    /// Delay between notifications
    pub period: Duration,
    pub seed: Option<u64>,
}

impl SimulatedConfig {
    /// Defaults for a kind: one heart rate reading per second, ECG at 130 Hz.
    pub fn for_kind(kind: SensorKind) -> Self {
        let period = match kind {
            SensorKind::HeartRate => Duration::from_secs(1),
            SensorKind::Ecg => Duration::from_micros(7_692),
        };
        Self {
            kind,
            period,
            seed: None,
        }
    }
}

/// A sensor link backed by a generator thread.
pub struct SimulatedSensor {
    config: SimulatedConfig,
    running: Arc<AtomicBool>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedSensor {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stop: None,
            worker: None,
        }
    }

    /// Check if the generator thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl SensorLink for SimulatedSensor {
    fn address(&self) -> &str {
        SIMULATED_ADDRESS
    }

    fn start_notify(
        &mut self,
        characteristic: &str,
        sink: Sender<Notification>,
    ) -> Result<(), IngestionError> {
        if characteristic != self.config.kind.characteristic() {
            return Err(IngestionError::Subscribe {
                characteristic: characteristic.to_string(),
                reason: format!("simulated {} sensor has no such characteristic", self.config.kind),
            });
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::Subscribe {
                characteristic: characteristic.to_string(),
                reason: "notifications already active".to_string(),
            });
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let config = self.config.clone();
        let worker = thread::Builder::new()
            .name("simulated-sensor".to_string())
            .spawn(move || generate(config, stop_rx, sink))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                IngestionError::Subscribe {
                    characteristic: characteristic.to_string(),
                    reason: e.to_string(),
                }
            })?;
        self.stop = Some(stop_tx);
        self.worker = Some(worker);

        tracing::info!(
            kind = %self.config.kind,
            "Simulated sensor streaming (no physical device attached)"
        );
        Ok(())
    }

    fn stop_notify(&mut self, characteristic: &str) -> Result<(), IngestionError> {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the stop sender wakes the generator out of its wait
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| IngestionError::Unsubscribe {
                characteristic: characteristic.to_string(),
                reason: "generator thread panicked".to_string(),
            })?;
        }
        Ok(())
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop.take();
    }
}

fn generate(config: SimulatedConfig, stop: Receiver<()>, sink: Sender<Notification>) {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut step: u64 = 0;

    loop {
        let t = step as f64;
        let payload = match config.kind {
            SensorKind::HeartRate => {
                let bpm = 72.0 + 6.0 * (t / 15.0).sin() + rng.gen_range(-1.5..1.5);
                encode_heart_rate(bpm.round().clamp(30.0, 220.0) as u16)
            }
            SensorKind::Ecg => {
                // Sharp periodic peak on top of a slow baseline wander
                let phase = (t / 100.0).fract();
                let peak = (-((phase - 0.5) * 40.0).powi(2)).exp() * 1200.0;
                let wander = 80.0 * (t / 400.0).sin();
                let value = peak + wander + rng.gen_range(-20.0..20.0);
                encode_ecg(value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
            }
        };

        match sink.try_send(Notification::Payload(payload)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Simulated sensor queue full, dropping payload");
            }
            Err(TrySendError::Disconnected(_)) => break,
        }

        step += 1;
        match stop.recv_timeout(config.period) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
