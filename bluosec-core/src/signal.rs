//! Signals raised towards the rest of the controller.

use parking_lot::Mutex;
use std::sync::Arc;

/// Fire-and-forget notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// One of the three speed limits was written.
    SpeedLimitChanged,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::SpeedLimitChanged => "speed_limit_changed",
        }
    }
}

/// Receiver of engine signals. Must not block.
pub trait SignalSink: Send {
    fn raise(&self, signal: Signal);
}

/// Discards every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignals;

impl SignalSink for NoSignals {
    fn raise(&self, _signal: Signal) {}
}

/// Records raised signals in order.
#[derive(Debug, Default, Clone)]
pub struct SignalRecorder {
    raised: Arc<Mutex<Vec<Signal>>>,
}

impl SignalRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals raised so far, oldest first.
    pub fn raised(&self) -> Vec<Signal> {
        self.raised.lock().clone()
    }

    /// Removes and returns the recorded signals.
    pub fn take(&self) -> Vec<Signal> {
        std::mem::take(&mut *self.raised.lock())
    }
}

impl SignalSink for SignalRecorder {
    fn raise(&self, signal: Signal) {
        tracing::debug!("Signal raised: {}", signal.as_str());
        self.raised.lock().push(signal);
    }
}

impl<S: SignalSink + Sync + ?Sized> SignalSink for Arc<S> {
    fn raise(&self, signal: Signal) {
        (**self).raise(signal)
    }
}
