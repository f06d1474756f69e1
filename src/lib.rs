//! # Tailstream
//!
//! A client-side subscription engine for append-only event stores.
//!
//! ## Core Concepts
//!
//! - **Streams**: named, append-only sequences of events, each event at a
//!   store-assigned position
//! - **Catch-up subscriptions**: replay a stream from any historical
//!   position, then seamlessly continue with live events with no gaps,
//!   duplicates, or reordering
//! - **Store connection**: the transport boundary supplying paged reads and
//!   live push feeds
//!
//! ## Example
//!
//! ```ignore
//! use tailstream::{CatchUpSettings, CatchUpSubscription, StreamPosition, SubscriptionHandlers};
//!
//! let handlers = SubscriptionHandlers::new(|event| {
//!     println!("event {} on {}", event.position, event.stream);
//!     Ok(())
//! })
//! .on_live_processing_started(|| println!("caught up, now live"));
//!
//! let subscription = CatchUpSubscription::start(
//!     connection,           // Arc<impl StoreConnection>
//!     "orders",
//!     Some(StreamPosition(5)),
//!     None,
//!     handlers,
//!     CatchUpSettings::default(),
//! )?;
//! ```
//!
//! Write-path version checks use the [`expected_version`] sentinels, e.g.
//! `expected_version::ANY` when the writer does not assert a version.

pub mod connection;
pub mod error;
pub mod expected_version;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use connection::{
    LiveDropCause, LiveDropFn, LiveEventFn, LiveSubscription, StoreConnection, StreamSlice,
};
pub use error::{ClientError, Result};
pub use subscriptions::{
    CatchUpSettings, CatchUpSubscription, DropReason, HandlerError, SubscriptionHandlers,
    SubscriptionPhase,
};
pub use types::*;
