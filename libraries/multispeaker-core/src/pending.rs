//! Handle for a deferred routed playback request

use crate::types::ChannelHandle;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a deferred `play_to` request ended
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// The sound became ready and a routed channel was started
    Started(ChannelHandle),

    /// Nothing was loaded, or the sound was unloaded before it became ready
    NotLoaded,

    /// The sound did not become ready before the configured timeout
    TimedOut,

    /// The request was cancelled (explicitly, by unload, or by dropping the player)
    Cancelled,

    /// The engine refused to start the channel
    Failed(String),
}

impl PlayOutcome {
    /// Channel started by the request, if any
    pub fn channel(&self) -> Option<ChannelHandle> {
        match self {
            Self::Started(channel) => Some(*channel),
            _ => None,
        }
    }
}

/// In-flight `play_to_when_ready` request
///
/// Dropping the handle does not cancel the request; the owning player still
/// joins its waiter on unload and drop.
#[derive(Debug)]
pub struct PendingPlay {
    outcome_rx: Option<Receiver<PlayOutcome>>,
    cancel: Arc<AtomicBool>,
    outcome: Option<PlayOutcome>,
}

impl PendingPlay {
    pub(crate) fn new(outcome_rx: Receiver<PlayOutcome>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            outcome_rx: Some(outcome_rx),
            cancel,
            outcome: None,
        }
    }

    /// Request that finished before any waiter was spawned
    pub(crate) fn finished(outcome: PlayOutcome) -> Self {
        Self {
            outcome_rx: None,
            cancel: Arc::new(AtomicBool::new(false)),
            outcome: Some(outcome),
        }
    }

    /// Outcome, if the request has finished
    pub fn poll(&mut self) -> Option<&PlayOutcome> {
        if self.outcome.is_none() {
            if let Some(rx) = &self.outcome_rx {
                match rx.try_recv() {
                    Ok(outcome) => self.outcome = Some(outcome),
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        self.outcome = Some(PlayOutcome::Failed("waiter exited".to_string()));
                    }
                }
            }
        }
        self.outcome.as_ref()
    }

    /// Whether the request has finished
    pub fn is_finished(&mut self) -> bool {
        self.poll().is_some()
    }

    /// Block until the request finishes
    pub fn wait(mut self) -> PlayOutcome {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        match self.outcome_rx.take() {
            Some(rx) => rx
                .recv()
                .unwrap_or_else(|_| PlayOutcome::Failed("waiter exited".to_string())),
            None => PlayOutcome::Failed("waiter exited".to_string()),
        }
    }

    /// Block for at most `timeout`; `None` if the request is still running
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<&PlayOutcome> {
        if self.outcome.is_none() {
            if let Some(rx) = &self.outcome_rx {
                match rx.recv_timeout(timeout) {
                    Ok(outcome) => self.outcome = Some(outcome),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        self.outcome = Some(PlayOutcome::Failed("waiter exited".to_string()));
                    }
                }
            }
        }
        self.outcome.as_ref()
    }

    /// Ask the waiter to stop; it reports [`PlayOutcome::Cancelled`] unless
    /// the channel was already started
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }
}
