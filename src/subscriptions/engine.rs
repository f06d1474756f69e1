//! The catch-up subscription engine.
//!
//! Replays a stream from a historical position, then hands over to the live
//! push feed without gaps, duplicates, or reordering. The consumer never
//! observes which phase an event came from.
//!
//! Every input racing against the replay loop (live events, transport drop
//! signals, stop requests) funnels through a single channel consumed only
//! by the delivery worker, so the two sources can never interleave their
//! mutations of shared state and the buffered-to-direct switch is atomic.

use crate::connection::{LiveDropCause, LiveSubscription, StoreConnection};
use crate::error::{ClientError, Result};
use crate::subscriptions::types::{
    CatchUpSettings, DropReason, DroppedFn, EventFn, LiveStartedFn, SubscriptionHandlers,
};
use crate::types::{Credentials, RecordedEvent, StreamPosition};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

/// Where a subscription is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionPhase {
    /// Created but the worker has not opened the live feed yet.
    Idle,
    /// Replaying historical events; live arrivals are being buffered.
    CatchingUp,
    /// Replay finished; events are delivered as they arrive.
    Live,
    /// Terminal. No callback fires after this.
    Dropped,
}

/// Engine state shared between the delivery worker and the handle.
struct Shared {
    phase: SubscriptionPhase,
    last_processed: Option<StreamPosition>,
}

/// Inputs feeding the delivery worker.
enum Signal {
    Live(RecordedEvent),
    LiveDrop(LiveDropCause),
    Stop,
}

/// How the worker loop ended.
type Ended = (DropReason, Option<ClientError>);

/// Handle to a running catch-up subscription.
///
/// Dropping the handle does not stop the subscription; call
/// [`CatchUpSubscription::stop`] to end it.
pub struct CatchUpSubscription {
    stream: String,
    signals: Sender<Signal>,
    shared: Arc<Mutex<Shared>>,
}

impl CatchUpSubscription {
    /// Start a catch-up subscription on `stream`.
    ///
    /// Events strictly after `from` are delivered to the handlers on a
    /// dedicated worker thread; `from = None` replays the stream from the
    /// beginning. Fails synchronously only on invalid settings or if the
    /// worker cannot be spawned.
    pub fn start<C>(
        connection: Arc<C>,
        stream: impl Into<String>,
        from: Option<StreamPosition>,
        credentials: Option<Credentials>,
        handlers: SubscriptionHandlers,
        settings: CatchUpSettings,
    ) -> Result<Self>
    where
        C: StoreConnection + 'static,
    {
        settings.validate()?;

        let stream = stream.into();
        let (signal_tx, signal_rx) = unbounded();
        let shared = Arc::new(Mutex::new(Shared {
            phase: SubscriptionPhase::Idle,
            last_processed: from,
        }));

        let worker = Worker {
            connection,
            stream: stream.clone(),
            credentials,
            settings,
            on_event: handlers.on_event,
            on_live_started: handlers.on_live_started,
            on_dropped: handlers.on_dropped,
            shared: shared.clone(),
            signals: signal_rx,
            signal_tx: Some(signal_tx.clone()),
            live_queue: VecDeque::new(),
            live_handle: None,
        };

        thread::Builder::new()
            .name(format!("catch-up-{stream}"))
            .spawn(move || worker.run())?;

        Ok(Self {
            stream,
            signals: signal_tx,
            shared,
        })
    }

    /// Stream this subscription is attached to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SubscriptionPhase {
        self.shared.lock().phase
    }

    /// True once the subscription has ended.
    pub fn is_dropped(&self) -> bool {
        self.phase() == SubscriptionPhase::Dropped
    }

    /// Position of the most recently delivered event, or the starting
    /// position if nothing has been delivered yet.
    pub fn last_processed_position(&self) -> Option<StreamPosition> {
        self.shared.lock().last_processed
    }

    /// Request termination with [`DropReason::UserInitiated`].
    ///
    /// Idempotent and callable from any thread. The drop callback fires
    /// exactly once, eventually; no event is delivered after it.
    pub fn stop(&self) {
        // Fails only once the worker is gone, i.e. already dropped.
        let _ = self.signals.send(Signal::Stop);
    }
}

struct Worker<C: StoreConnection> {
    connection: Arc<C>,
    stream: String,
    credentials: Option<Credentials>,
    settings: CatchUpSettings,
    on_event: EventFn,
    on_live_started: LiveStartedFn,
    on_dropped: Option<DroppedFn>,
    shared: Arc<Mutex<Shared>>,
    signals: Receiver<Signal>,
    /// Held only until the live callbacks are wired up, so the channel
    /// disconnects once the handle and the transport are both gone.
    signal_tx: Option<Sender<Signal>>,
    live_queue: VecDeque<RecordedEvent>,
    live_handle: Option<Box<dyn LiveSubscription>>,
}

impl<C: StoreConnection> Worker<C> {
    fn run(mut self) {
        let (reason, cause) = self.pump();
        self.finish(reason, cause);
    }

    /// Drive the subscription until something ends it.
    fn pump(&mut self) -> Ended {
        // Open the live feed before reading, so nothing appended during
        // replay can be missed.
        let tx = match self.signal_tx.take() {
            Some(tx) => tx,
            None => return disconnected(),
        };
        let on_event = {
            let tx = tx.clone();
            Box::new(move |event: RecordedEvent| {
                let _ = tx.send(Signal::Live(event));
            })
        };
        let on_drop = Box::new(move |cause: LiveDropCause| {
            let _ = tx.send(Signal::LiveDrop(cause));
        });

        let live = match self.connection.subscribe_live(
            &self.stream,
            self.settings.resolve_link_tos,
            self.credentials.as_ref(),
            on_event,
            on_drop,
        ) {
            Ok(handle) => handle,
            Err(err) => return (DropReason::SubscriptionDropped, Some(err)),
        };
        self.live_handle = Some(live);
        self.set_phase(SubscriptionPhase::CatchingUp);
        tracing::debug!(stream = %self.stream, "catch-up replay started");

        // Historical replay.
        loop {
            if let Some(ended) = self.drain_signals() {
                return ended;
            }

            let from = self.read_from();
            let slice = match self.connection.read_stream_forward(
                &self.stream,
                from,
                self.settings.read_batch_size,
                self.settings.resolve_link_tos,
                self.credentials.as_ref(),
            ) {
                Ok(slice) => slice,
                Err(err) => return (DropReason::CatchUpError, Some(err)),
            };

            // A stop or transport drop that arrived while the read was in
            // flight wins over the page it raced with.
            if let Some(ended) = self.drain_signals() {
                return ended;
            }

            for event in slice.events {
                if self.already_processed(event.position) {
                    continue;
                }
                if let Err(ended) = self.deliver(event) {
                    return ended;
                }
            }

            if slice.is_end_of_stream {
                break;
            }
        }

        // The live buffer can repeat the historical tail; the position check
        // while draining eliminates the overlap.
        if let Some(ended) = self.drain_signals() {
            return ended;
        }
        while let Some(event) = self.live_queue.pop_front() {
            if self.already_processed(event.position) {
                continue;
            }
            if let Err(ended) = self.deliver(event) {
                return ended;
            }
        }

        self.set_phase(SubscriptionPhase::Live);
        (self.on_live_started)();
        tracing::debug!(
            stream = %self.stream,
            last = ?self.shared.lock().last_processed,
            "live processing started"
        );

        // Direct live delivery.
        loop {
            match self.signals.recv() {
                Ok(Signal::Live(event)) => {
                    if self.already_processed(event.position) {
                        continue;
                    }
                    if let Err(ended) = self.deliver(event) {
                        return ended;
                    }
                }
                Ok(Signal::Stop) => return (DropReason::UserInitiated, None),
                Ok(Signal::LiveDrop(cause)) => return drop_outcome(cause),
                Err(_) => return disconnected(),
            }
        }
    }

    /// Drain pending signals while catching up. Live events are buffered,
    /// bounded by `max_live_queue_size`; a stop or live-drop signal ends the
    /// subscription.
    fn drain_signals(&mut self) -> Option<Ended> {
        loop {
            match self.signals.try_recv() {
                Ok(Signal::Live(event)) => {
                    self.live_queue.push_back(event);
                    if self.live_queue.len() > self.settings.max_live_queue_size {
                        tracing::warn!(
                            stream = %self.stream,
                            buffered = self.live_queue.len(),
                            limit = self.settings.max_live_queue_size,
                            "live queue overflow during catch-up"
                        );
                        return Some((
                            DropReason::SubscriptionDropped,
                            Some(ClientError::LiveQueueOverflow {
                                buffered: self.live_queue.len(),
                                limit: self.settings.max_live_queue_size,
                            }),
                        ));
                    }
                }
                Ok(Signal::Stop) => return Some((DropReason::UserInitiated, None)),
                Ok(Signal::LiveDrop(cause)) => return Some(drop_outcome(cause)),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(disconnected()),
            }
        }
    }

    /// Hand one event to the consumer and advance the cursor.
    fn deliver(&mut self, event: RecordedEvent) -> std::result::Result<(), Ended> {
        let position = event.position;
        if let Err(err) = (self.on_event)(event) {
            return Err((
                DropReason::CatchUpError,
                Some(ClientError::EventHandler(err.to_string())),
            ));
        }
        self.shared.lock().last_processed = Some(position);
        Ok(())
    }

    fn already_processed(&self, position: StreamPosition) -> bool {
        match self.shared.lock().last_processed {
            Some(last) => position <= last,
            None => false,
        }
    }

    /// Next position the historical read should start from.
    fn read_from(&self) -> StreamPosition {
        self.shared
            .lock()
            .last_processed
            .map(StreamPosition::next)
            .unwrap_or(StreamPosition::START)
    }

    fn set_phase(&self, phase: SubscriptionPhase) {
        self.shared.lock().phase = phase;
    }

    /// Enter the terminal state: stop the live feed, release buffers, and
    /// fire the drop callback exactly once.
    fn finish(&mut self, reason: DropReason, cause: Option<ClientError>) {
        if let Some(live) = self.live_handle.take() {
            live.stop();
        }
        self.live_queue.clear();
        self.set_phase(SubscriptionPhase::Dropped);
        tracing::debug!(stream = %self.stream, ?reason, "subscription dropped");
        if let Some(on_dropped) = self.on_dropped.take() {
            on_dropped(reason, cause);
        }
    }
}

fn drop_outcome(cause: LiveDropCause) -> Ended {
    match cause {
        LiveDropCause::Unsubscribed => (
            DropReason::SubscriptionDropped,
            Some(ClientError::SubscriptionDropped(
                "live subscription unsubscribed".to_string(),
            )),
        ),
        LiveDropCause::SubscriptionDropped(message) => (
            DropReason::SubscriptionDropped,
            Some(ClientError::SubscriptionDropped(message)),
        ),
        LiveDropCause::ConnectionClosed(message) => (
            DropReason::ConnectionClosed,
            Some(ClientError::ConnectionClosed(message)),
        ),
    }
}

fn disconnected() -> Ended {
    (
        DropReason::ConnectionClosed,
        Some(ClientError::ConnectionClosed(
            "subscription signal channel disconnected".to_string(),
        )),
    )
}
