//! Upstream sensor link abstraction.
//!
//! The pipeline only needs two operations from a wearable: subscribe to a
//! characteristic and unsubscribe from it. Discovery, pairing and the
//! transport itself live behind this trait.

use crate::error::IngestionError;
use crate::sensor::types::Notification;
use crossbeam_channel::Sender;

/// A connected sensor that can push notifications for a characteristic.
pub trait SensorLink: Send {
    /// Address of the device this link is connected to.
    fn address(&self) -> &str;

    /// Start delivering notifications for `characteristic` into `sink`.
    ///
    /// Payloads are delivered asynchronously from the link's own execution
    /// context. Dropping every clone of `sink` signals end of stream.
    fn start_notify(
        &mut self,
        characteristic: &str,
        sink: Sender<Notification>,
    ) -> Result<(), IngestionError>;

    /// Stop delivering notifications for `characteristic`.
    fn stop_notify(&mut self, characteristic: &str) -> Result<(), IngestionError>;
}
