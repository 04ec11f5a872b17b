use async_channel::{Receiver, Sender};
use log::warn;

use crate::{Barcode, ScanError};

/// Receives detections from a scan session.
///
/// Calls are fire-and-forget and may come from the recognizer's executor.
pub trait ResultSink: Send + Sync {
    /// Forward a detection.
    fn emit(&self, barcode: Barcode);

    /// Observe a recognizer failure. The session keeps running either way.
    fn error(&self, error: &ScanError) {
        let _ = error;
    }
}

impl<F> ResultSink for F
where
    F: Fn(Barcode) + Send + Sync,
{
    fn emit(&self, barcode: Barcode) {
        self(barcode);
    }
}

/// Sink that forwards detections into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Barcode>,
}

impl ChannelSink {
    /// Create a sink and the receiver detections arrive on.
    #[must_use]
    pub fn new() -> (Self, Receiver<Barcode>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl ResultSink for ChannelSink {
    fn emit(&self, barcode: Barcode) {
        if let Err(err) = self.sender.try_send(barcode) {
            warn!("dropping detection, receiver is gone: {err}");
        }
    }
}
