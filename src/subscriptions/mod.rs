//! Catch-up subscriptions over a store connection.
//!
//! A catch-up subscription replays a stream's historical events from a
//! given position, then transparently continues with events appended while
//! it runs:
//! - One ordered, duplicate-free sequence across both sources
//! - A one-time signal when replay hands over to live delivery
//! - Exactly one drop notification, with a reason, when the subscription ends
//!
//! # Example
//!
//! ```ignore
//! let handlers = SubscriptionHandlers::new(|event| {
//!     println!("got event at {}", event.position);
//!     Ok(())
//! })
//! .on_live_processing_started(|| println!("now live"))
//! .on_dropped(|reason, _cause| println!("dropped: {:?}", reason));
//!
//! let subscription = CatchUpSubscription::start(
//!     connection,
//!     "orders",
//!     Some(StreamPosition(5)),
//!     None,
//!     handlers,
//!     CatchUpSettings::default(),
//! )?;
//!
//! // ... later
//! subscription.stop();
//! ```

mod engine;
mod types;

pub use engine::{CatchUpSubscription, SubscriptionPhase};
pub use types::{CatchUpSettings, DropReason, HandlerError, SubscriptionHandlers};
