//! Live ingestion from a sensor link.
//!
//! Notifications are funneled through a bounded queue. The scheduler drains
//! the queue on its own thread of control, so the rolling buffers only ever
//! have one writer.

use crate::error::IngestionError;
use crate::sensor::decoder::decode;
use crate::sensor::link::SensorLink;
use crate::sensor::synthetic::CompanionGenerator;
use crate::sensor::types::{Notification, Sample, SensorKind};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Samples decoded during one drain.
#[derive(Debug, Default)]
pub struct FeedBatch {
    /// Channel A sample paired with its companion on channel B
    pub pairs: Vec<(Sample, Sample)>,
    /// Payloads skipped because they could not be decoded
    pub rejected: usize,
}

/// A live sensor feed plus its synthetic companion channel.
pub struct LiveFeed {
    link: Box<dyn SensorLink>,
    kind: SensorKind,
    companion: CompanionGenerator,
    sender: Option<Sender<Notification>>,
    receiver: Receiver<Notification>,
    next_index: u64,
    subscribed: bool,
}

impl LiveFeed {
    /// Create a feed over `link`. Nothing is subscribed until [`LiveFeed::start`].
    pub fn new(
        link: Box<dyn SensorLink>,
        kind: SensorKind,
        companion: CompanionGenerator,
        queue_capacity: usize,
    ) -> Self {
        let (sender, receiver) = bounded(queue_capacity.max(1));
        Self {
            link,
            kind,
            companion,
            sender: Some(sender),
            receiver,
            next_index: 0,
            subscribed: false,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Subscribe to the sensor characteristic for this feed's kind.
    pub fn start(&mut self) -> Result<(), IngestionError> {
        let sender = self.sender.take().ok_or(IngestionError::ChannelClosed)?;
        self.link.start_notify(self.kind.characteristic(), sender)?;
        self.subscribed = true;

        tracing::info!(
            address = self.link.address(),
            characteristic = self.kind.characteristic(),
            companion_std = self.companion.std_dev(),
            "Subscribed to sensor notifications; channel B is a synthetic companion"
        );
        Ok(())
    }

    /// Decode everything queued since the last drain.
    ///
    /// Malformed payloads are skipped. A lost device, or a link that dropped
    /// its end of the queue before delivering anything new, is an
    /// [`IngestionError`].
    pub fn drain(&mut self) -> Result<FeedBatch, IngestionError> {
        let mut batch = FeedBatch::default();

        loop {
            match self.receiver.try_recv() {
                Ok(Notification::Payload(raw)) => {
                    match decode(&raw, self.kind, self.next_index as f64) {
                        Ok(sample) => {
                            self.next_index += 1;
                            let companion = self.companion.companion(&sample);
                            batch.pairs.push((sample, companion));
                        }
                        Err(e) => {
                            tracing::warn!("Skipping malformed payload: {}", e);
                            batch.rejected += 1;
                        }
                    }
                }
                Ok(Notification::Lost(reason)) => {
                    return Err(IngestionError::Disconnected(reason));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if batch.pairs.is_empty() && batch.rejected == 0 {
                        return Err(IngestionError::ChannelClosed);
                    }
                    break;
                }
            }
        }

        Ok(batch)
    }

    /// Unsubscribe from the sensor. Attempted at most once.
    pub fn release(&mut self) -> Result<(), IngestionError> {
        if !self.subscribed {
            return Ok(());
        }
        self.subscribed = false;
        self.link.stop_notify(self.kind.characteristic())
    }
}
