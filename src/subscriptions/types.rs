//! Subscription configuration, consumer callbacks, and drop reasons.

use crate::error::{ClientError, Result};
use crate::types::RecordedEvent;
use serde::{Deserialize, Serialize};

/// Configuration for a catch-up subscription.
///
/// Immutable once the subscription starts.
#[derive(Clone, Debug)]
pub struct CatchUpSettings {
    /// Page size for historical reads.
    /// Default: 500
    pub read_batch_size: usize,

    /// Max live events buffered during catch-up before the subscription is
    /// dropped. Default: 10_000
    pub max_live_queue_size: usize,

    /// Ask the store to resolve link events to their targets.
    pub resolve_link_tos: bool,
}

impl Default for CatchUpSettings {
    fn default() -> Self {
        Self {
            read_batch_size: 500,
            max_live_queue_size: 10_000,
            resolve_link_tos: false,
        }
    }
}

impl CatchUpSettings {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.read_batch_size == 0 {
            return Err(ClientError::InvalidSettings(
                "read_batch_size must be positive".to_string(),
            ));
        }
        if self.max_live_queue_size == 0 {
            return Err(ClientError::InvalidSettings(
                "max_live_queue_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a subscription ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// `stop()` was called on the handle.
    UserInitiated,

    /// The server ended the live feed, or the live buffer overflowed.
    SubscriptionDropped,

    /// A historical read failed or the event handler returned an error.
    CatchUpError,

    /// The underlying connection went away.
    ConnectionClosed,
}

/// Error type event handlers may return to end the subscription.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type EventFn =
    Box<dyn FnMut(RecordedEvent) -> std::result::Result<(), HandlerError> + Send>;
pub(crate) type LiveStartedFn = Box<dyn FnMut() + Send>;
pub(crate) type DroppedFn = Box<dyn FnOnce(DropReason, Option<ClientError>) + Send>;

/// The consumer callbacks driving a catch-up subscription.
///
/// `on_event` sees every event exactly once, in position order, regardless
/// of whether it came from replay or the live feed. Returning an error ends
/// the subscription with [`DropReason::CatchUpError`].
pub struct SubscriptionHandlers {
    pub(crate) on_event: EventFn,
    pub(crate) on_live_started: LiveStartedFn,
    pub(crate) on_dropped: Option<DroppedFn>,
}

impl SubscriptionHandlers {
    pub fn new(
        on_event: impl FnMut(RecordedEvent) -> std::result::Result<(), HandlerError>
            + Send
            + 'static,
    ) -> Self {
        Self {
            on_event: Box::new(on_event),
            on_live_started: Box::new(|| {}),
            on_dropped: None,
        }
    }

    /// Invoked once, after the last replayed event and before the first event
    /// delivered from the live feed.
    pub fn on_live_processing_started(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_live_started = Box::new(f);
        self
    }

    /// Invoked exactly once when the subscription ends, with the reason and
    /// the underlying cause if there was one.
    pub fn on_dropped(
        mut self,
        f: impl FnOnce(DropReason, Option<ClientError>) + Send + 'static,
    ) -> Self {
        self.on_dropped = Some(Box::new(f));
        self
    }
}
