//! Shared test support: an in-memory store transport with hooks for
//! blocking reads and injecting transport failures.
#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tailstream::{
    ClientError, LiveDropCause, LiveDropFn, LiveEventFn, LiveSubscription, RecordedEvent,
    Result, StoreConnection, StreamPosition, StreamSlice, Timestamp,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Poll `pred` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Collects delivered positions across threads.
#[derive(Clone, Default)]
pub struct Recorder {
    positions: Arc<Mutex<Vec<StreamPosition>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, position: StreamPosition) {
        self.positions.lock().push(position);
    }

    pub fn snapshot(&self) -> Vec<StreamPosition> {
        self.positions.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.positions.lock().len()
    }
}

struct LiveSub {
    id: u64,
    stream: String,
    on_event: LiveEventFn,
    on_drop: Option<LiveDropFn>,
}

#[derive(Default)]
struct Inner {
    streams: HashMap<String, Vec<RecordedEvent>>,
    live: Vec<LiveSub>,
    next_live_id: u64,
    reads_blocked: bool,
    fail_next_read: Option<String>,
    fail_subscribe: Option<String>,
    last_read_resolve_link_tos: Option<bool>,
    last_read_username: Option<String>,
    last_subscribe_username: Option<String>,
}

/// In-memory store transport. Appends go to history and to every live
/// subscriber of the stream, in order, like a real push feed would.
#[derive(Clone)]
pub struct InMemoryConnection {
    inner: Arc<(Mutex<Inner>, Condvar)>,
}

impl InMemoryConnection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(Inner::default()), Condvar::new())),
        }
    }

    /// Append one event, pushing it to live subscribers before returning.
    pub fn append(
        &self,
        stream: &str,
        event_type: &str,
        data: serde_json::Value,
    ) -> StreamPosition {
        let (lock, _) = &*self.inner;
        let mut inner = lock.lock();

        let history = inner.streams.entry(stream.to_string()).or_default();
        let position = StreamPosition(history.len() as u64);
        let event = RecordedEvent {
            stream: stream.to_string(),
            position,
            event_type: event_type.to_string(),
            data: serde_json::to_vec(&data).unwrap(),
            metadata: Vec::new(),
            created: Timestamp::now(),
        };
        history.push(event.clone());

        for sub in inner.live.iter().filter(|s| s.stream == stream) {
            (sub.on_event)(event.clone());
        }
        position
    }

    /// Make every read call block until [`unblock_reads`] is called.
    pub fn block_reads(&self) {
        let (lock, _) = &*self.inner;
        lock.lock().reads_blocked = true;
    }

    pub fn unblock_reads(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().reads_blocked = false;
        cvar.notify_all();
    }

    /// The next read fails with the given message.
    pub fn fail_next_read(&self, message: &str) {
        let (lock, _) = &*self.inner;
        lock.lock().fail_next_read = Some(message.to_string());
    }

    /// The next live subscribe fails with the given message.
    pub fn fail_subscribe(&self, message: &str) {
        let (lock, _) = &*self.inner;
        lock.lock().fail_subscribe = Some(message.to_string());
    }

    pub fn live_subscription_count(&self) -> usize {
        let (lock, _) = &*self.inner;
        lock.lock().live.len()
    }

    /// End every live subscription on `stream` with `cause`, as a server
    /// drop or a lost connection would.
    pub fn drop_live_subs(&self, stream: &str, cause: LiveDropCause) {
        let (lock, _) = &*self.inner;
        let dropped: Vec<LiveSub> = {
            let mut inner = lock.lock();
            let (matching, rest) = inner
                .live
                .drain(..)
                .partition(|s| s.stream == stream);
            inner.live = rest;
            matching
        };
        for mut sub in dropped {
            if let Some(on_drop) = sub.on_drop.take() {
                on_drop(cause.clone());
            }
        }
    }

    pub fn last_read_resolve_link_tos(&self) -> Option<bool> {
        let (lock, _) = &*self.inner;
        lock.lock().last_read_resolve_link_tos
    }

    pub fn last_read_username(&self) -> Option<String> {
        let (lock, _) = &*self.inner;
        lock.lock().last_read_username.clone()
    }

    pub fn last_subscribe_username(&self) -> Option<String> {
        let (lock, _) = &*self.inner;
        lock.lock().last_subscribe_username.clone()
    }
}

struct InMemoryLiveHandle {
    inner: Arc<(Mutex<Inner>, Condvar)>,
    id: u64,
}

impl LiveSubscription for InMemoryLiveHandle {
    fn stop(&self) {
        let (lock, _) = &*self.inner;
        let sub = {
            let mut inner = lock.lock();
            inner
                .live
                .iter()
                .position(|s| s.id == self.id)
                .map(|i| inner.live.remove(i))
        };
        if let Some(mut sub) = sub {
            if let Some(on_drop) = sub.on_drop.take() {
                on_drop(LiveDropCause::Unsubscribed);
            }
        }
    }
}

impl StoreConnection for InMemoryConnection {
    fn read_stream_forward(
        &self,
        stream: &str,
        from: StreamPosition,
        max_count: usize,
        resolve_link_tos: bool,
        credentials: Option<&tailstream::Credentials>,
    ) -> Result<StreamSlice> {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock();
        while inner.reads_blocked {
            cvar.wait(&mut inner);
        }
        if let Some(message) = inner.fail_next_read.take() {
            return Err(ClientError::Read(message));
        }
        inner.last_read_resolve_link_tos = Some(resolve_link_tos);
        inner.last_read_username = credentials.map(|c| c.username.clone());

        let history = inner.streams.get(stream).cloned().unwrap_or_default();
        let events: Vec<RecordedEvent> = history
            .iter()
            .filter(|e| e.position >= from)
            .take(max_count)
            .cloned()
            .collect();
        let next_position = events.last().map(|e| e.position.next()).unwrap_or(from);
        let is_end_of_stream = match history.last() {
            Some(last) => last.position < next_position,
            None => true,
        };
        Ok(StreamSlice {
            events,
            next_position,
            is_end_of_stream,
        })
    }

    fn subscribe_live(
        &self,
        stream: &str,
        _resolve_link_tos: bool,
        credentials: Option<&tailstream::Credentials>,
        on_event: LiveEventFn,
        on_drop: LiveDropFn,
    ) -> Result<Box<dyn LiveSubscription>> {
        let (lock, _) = &*self.inner;
        let mut inner = lock.lock();
        if let Some(message) = inner.fail_subscribe.take() {
            return Err(ClientError::SubscriptionDropped(message));
        }
        inner.last_subscribe_username = credentials.map(|c| c.username.clone());
        inner.next_live_id += 1;
        let id = inner.next_live_id;
        inner.live.push(LiveSub {
            id,
            stream: stream.to_string(),
            on_event,
            on_drop: Some(on_drop),
        });
        Ok(Box::new(InMemoryLiveHandle {
            inner: self.inner.clone(),
            id,
        }))
    }
}
