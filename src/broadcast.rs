//! Fan-out of correlation frames to connected subscribers.
//!
//! Every subscriber owns a bounded queue drained by its connection task.
//! Publishing never waits on a subscriber: a closed or full queue drops that
//! subscriber alone and delivery to the rest continues.

use crate::core::frame::CorrelationFrame;
use crate::error::DeliveryError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Identifier handed out by [`Broadcaster::subscribe`].
pub type SubscriberId = Uuid;

/// Outbound half of a subscriber connection. Each message is one serialized frame.
pub type Connection = mpsc::Sender<Arc<str>>;

struct Subscriber {
    connection: Connection,
    connected_at: DateTime<Utc>,
}

/// Outcome of one publish.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Subscribers the frame was queued for
    pub delivered: usize,
    /// Subscribers removed during this publish
    pub dropped: Vec<DeliveryError>,
}

/// Registry of live subscribers.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its id.
    pub fn subscribe(&self, connection: Connection) -> SubscriberId {
        let id = Uuid::new_v4();
        self.subscribers.write().insert(
            id,
            Subscriber {
                connection,
                connected_at: Utc::now(),
            },
        );
        tracing::info!(subscriber = %id, "Subscriber connected");
        id
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        match self.subscribers.write().remove(&id) {
            Some(subscriber) => {
                let connected_for = Utc::now() - subscriber.connected_at;
                tracing::info!(
                    subscriber = %id,
                    connected_secs = connected_for.num_seconds(),
                    "Subscriber disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Serialize `frame` once and queue it for every subscriber.
    pub fn publish(&self, frame: &CorrelationFrame) -> PublishReport {
        match frame.to_json() {
            Ok(json) => self.publish_text(Arc::from(json)),
            Err(e) => {
                tracing::error!("Failed to serialize frame {}: {}", frame.time, e);
                PublishReport::default()
            }
        }
    }

    /// Queue an already-serialized payload for every subscriber.
    pub fn publish_text(&self, payload: Arc<str>) -> PublishReport {
        let mut report = PublishReport::default();

        {
            let subscribers = self.subscribers.read();
            for (&id, subscriber) in subscribers.iter() {
                match subscriber.connection.try_send(payload.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Closed(_)) => report.dropped.push(DeliveryError::Closed(id)),
                    Err(TrySendError::Full(_)) => report.dropped.push(DeliveryError::Lagging(id)),
                }
            }
        }

        if !report.dropped.is_empty() {
            let mut subscribers = self.subscribers.write();
            for failure in &report.dropped {
                let id = match failure {
                    DeliveryError::Closed(id) | DeliveryError::Lagging(id) => *id,
                };
                subscribers.remove(&id);
                tracing::warn!("Dropping subscriber: {}", failure);
            }
        }

        report
    }

    /// Disconnect every subscriber. Their connection tasks observe a closed queue.
    pub fn close_all(&self) -> usize {
        let drained: Vec<SubscriberId> = self.subscribers.write().drain().map(|(id, _)| id).collect();
        if !drained.is_empty() {
            tracing::info!("Closed {} subscriber connection(s)", drained.len());
        }
        drained.len()
    }
}
