//! The position-source boundary: an external collaborator produces fixes,
//! the controller consumes them as a stream of events.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::error::{TrackerError, TrackerResult};
use crate::position::PositionSample;

/// Event emitted by a position source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Sample(PositionSample),
    Error(String),
}

/// External provider of position fixes.
pub trait PositionSource {
    /// One-shot fix, used to show a location before tracking starts.
    fn request_current_position(&mut self) -> TrackerResult<PositionSample>;

    /// Open the continuous stream. At most one live subscription.
    fn subscribe(&mut self) -> TrackerResult<Subscription>;

    /// Close the stream. Events still queued at this point are discarded.
    fn unsubscribe(&mut self, subscription: Subscription);
}

/// Receiving end of a source's event stream.
///
/// Owning this is what keeps events observable; handing it back through
/// `unsubscribe` ends delivery before the unsubscribe returns.
#[derive(Debug)]
pub struct Subscription {
    events: Receiver<SourceEvent>,
}

impl Subscription {
    pub fn new(events: Receiver<SourceEvent>) -> Self {
        Self { events }
    }

    /// Next pending event, if any. Never blocks.
    pub fn try_next(&self) -> Option<SourceEvent> {
        self.events.try_recv().ok()
    }
}

/// Cloneable producer side of a `ChannelSource`.
#[derive(Clone)]
pub struct SourceHandle {
    tx: Sender<SourceEvent>,
    latest_fix: Arc<Mutex<Option<PositionSample>>>,
}

impl SourceHandle {
    /// Publish one fix into the stream and remember it as the latest.
    pub fn push_sample(&self, sample: PositionSample) {
        let mut latest = self
            .latest_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *latest = Some(sample.clone());
        drop(latest);
        let _ = self.tx.send(SourceEvent::Sample(sample));
    }

    /// Publish a source fault (permission denied, fix timeout, ...).
    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self.tx.send(SourceEvent::Error(message.into()));
    }
}

/// Channel-backed position source.
///
/// Producers push through cloneable handles; the controller drains the
/// single live subscription. Stands in for the platform location service
/// in tests, replays and host integrations.
pub struct ChannelSource {
    tx: Sender<SourceEvent>,
    idle_rx: Option<Receiver<SourceEvent>>,
    latest_fix: Arc<Mutex<Option<PositionSample>>>,
}

impl ChannelSource {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            idle_rx: Some(rx),
            latest_fix: Arc::new(Mutex::new(None)),
        }
    }

    /// Producer handle for the platform side of the boundary.
    pub fn handle(&self) -> SourceHandle {
        SourceHandle {
            tx: self.tx.clone(),
            latest_fix: Arc::clone(&self.latest_fix),
        }
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for ChannelSource {
    fn request_current_position(&mut self) -> TrackerResult<PositionSample> {
        let latest = self
            .latest_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        latest
            .clone()
            .ok_or_else(|| TrackerError::SourceUnavailable("no fix yet".to_string()))
    }

    fn subscribe(&mut self) -> TrackerResult<Subscription> {
        let rx = self.idle_rx.take().ok_or_else(|| {
            TrackerError::SourceUnavailable("stream already subscribed".to_string())
        })?;
        // Fixes pushed while nobody watched belong to no session
        while rx.try_recv().is_ok() {}
        Ok(Subscription::new(rx))
    }

    fn unsubscribe(&mut self, subscription: Subscription) {
        // Anything queued between the last pump and this call is dropped
        while subscription.try_next().is_some() {}
        self.idle_rx = Some(subscription.events);
    }
}
