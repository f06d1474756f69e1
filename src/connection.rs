//! Contract between the subscription machinery and the store transport.
//!
//! The wire protocol, socket management, and authentication live behind
//! [`StoreConnection`]. A connection is shared across many subscriptions and
//! must treat every call as independent.

use crate::error::Result;
use crate::types::{Credentials, RecordedEvent, StreamPosition};

/// One page of a forward stream read.
#[derive(Clone, Debug)]
pub struct StreamSlice {
    /// Events in ascending position order.
    pub events: Vec<RecordedEvent>,

    /// Position the next read should start from.
    pub next_position: StreamPosition,

    /// True when this page reaches the current end of the stream.
    pub is_end_of_stream: bool,
}

/// Why the transport ended a live subscription.
#[derive(Clone, Debug)]
pub enum LiveDropCause {
    /// [`LiveSubscription::stop`] was called on the handle.
    Unsubscribed,

    /// The server ended the subscription.
    SubscriptionDropped(String),

    /// The underlying connection went away.
    ConnectionClosed(String),
}

/// Callback invoked for every event pushed on a live subscription.
pub type LiveEventFn = Box<dyn Fn(RecordedEvent) + Send + Sync>;

/// Callback invoked exactly once when a live subscription ends.
pub type LiveDropFn = Box<dyn FnOnce(LiveDropCause) + Send>;

/// Handle to an open live subscription.
pub trait LiveSubscription: Send {
    /// Request termination of the live feed.
    ///
    /// The drop callback registered at subscribe time still fires afterward.
    fn stop(&self);
}

/// Operations the subscription machinery needs from a store transport.
pub trait StoreConnection: Send + Sync {
    /// Read a page of up to `max_count` events forward from `from`.
    ///
    /// May be called repeatedly until the returned slice reports
    /// end-of-stream.
    fn read_stream_forward(
        &self,
        stream: &str,
        from: StreamPosition,
        max_count: usize,
        resolve_link_tos: bool,
        credentials: Option<&Credentials>,
    ) -> Result<StreamSlice>;

    /// Open a live push subscription on `stream`.
    ///
    /// `on_event` is invoked for every event appended from now on, in append
    /// order. `on_drop` is invoked exactly once when the feed ends, for any
    /// reason including an explicit [`LiveSubscription::stop`].
    fn subscribe_live(
        &self,
        stream: &str,
        resolve_link_tos: bool,
        credentials: Option<&Credentials>,
        on_event: LiveEventFn,
        on_drop: LiveDropFn,
    ) -> Result<Box<dyn LiveSubscription>>;
}
