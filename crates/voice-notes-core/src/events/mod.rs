//! Audio lifecycle notifications for presentation-layer collaborators.
//!
//! The controller publishes [`AudioEvent`]s on an [`EventBus`]; collaborators
//! hold a [`Subscription`] for as long as they want to hear about them.
//! Dropping (or [`Subscription::cancel`]ling) the handle unsubscribes.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

/// Events buffered per subscriber before the slowest one starts lagging.
const EVENT_BUS_CAPACITY: usize = 64;

/// Recording/playback lifecycle transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Playback started.
    DidStartPlaying,
    /// Playback ended, whether finished, stopped, or interrupted.
    DidEndPlaying,
    /// A recording ended and produced a usable file.
    DidFinishRecording,
    /// A recording ended without a usable file.
    RecordingFailed(RecordingFailure),
}

/// Why a finished recording is not usable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordingFailure {
    /// Recorded audio is shorter than the minimum duration.
    #[error("Recording too short ({duration:?})")]
    TooShort {
        /// Duration read back from the recorded file.
        duration: Duration,
    },

    /// Device reported failure without further detail.
    #[error("Recording failed")]
    Unknown,

    /// Encoder reported an error while recording.
    #[error("Recording encoder error: {reason}")]
    EncodeFailed {
        /// Encoder error description.
        reason: String,
    },
}

/// Fan-out channel for [`AudioEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AudioEvent>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Events published while nobody is subscribed are dropped.
    pub fn publish(&self, event: AudioEvent) {
        match self.tx.send(event) {
            Ok(count) => debug!(subscriber_count = count, "Audio event published"),
            Err(broadcast::error::SendError(event)) => {
                debug!(event = ?event, "Audio event published with no subscribers")
            }
        }
    }

    /// Start receiving events published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-owned subscription to an [`EventBus`].
pub struct Subscription {
    rx: broadcast::Receiver<AudioEvent>,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the bus and every publisher are gone. If this
    /// subscriber fell behind, the missed events are skipped and logged.
    pub async fn recv(&mut self) -> Option<AudioEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber lagged, skipping missed events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<AudioEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber lagged, skipping missed events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving events.
    pub fn cancel(self) {
        debug!("Event subscription cancelled");
    }
}
