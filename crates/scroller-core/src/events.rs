//! Segment lifecycle notifications
//!
//! Four points in a fetch cycle are observable: load start, load complete,
//! insert complete and load failure. Hosts either implement
//! [`SegmentObserver`] directly, hand closures to [`FnObserver`], or subscribe
//! to a channel of [`SegmentEvent`]s through [`ChannelObserver`].

use tokio::sync::mpsc;

/// A response received from the content server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl SegmentResponse {
    /// Body length in characters, the unit used for end-of-content detection
    pub fn len(&self) -> usize {
        self.body.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A failed segment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    pub url: String,
    /// Status code when the server answered at all
    pub status: Option<u16>,
    /// Response body when the server sent one
    pub body: Option<String>,
    pub message: String,
}

/// Lifecycle event emitted by a fetch cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentEvent {
    LoadStart,
    LoadComplete(SegmentResponse),
    InsertComplete,
    LoadFailure(SegmentFailure),
}

/// Receives lifecycle notifications; every method defaults to a no-op
pub trait SegmentObserver: Send + Sync {
    fn on_load_start(&self) {}

    fn on_load_complete(&self, _response: &SegmentResponse) {}

    fn on_insert_complete(&self) {}

    fn on_load_failure(&self, _failure: &SegmentFailure) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SegmentObserver for NoopObserver {}

/// Forwards every notification into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SegmentEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<SegmentEvent>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SegmentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: SegmentEvent) {
        // Receiver may be gone; the scroller keeps running regardless
        let _ = self.tx.send(event);
    }
}

impl SegmentObserver for ChannelObserver {
    fn on_load_start(&self) {
        self.send(SegmentEvent::LoadStart);
    }

    fn on_load_complete(&self, response: &SegmentResponse) {
        self.send(SegmentEvent::LoadComplete(response.clone()));
    }

    fn on_insert_complete(&self) {
        self.send(SegmentEvent::InsertComplete);
    }

    fn on_load_failure(&self, failure: &SegmentFailure) {
        self.send(SegmentEvent::LoadFailure(failure.clone()));
    }
}

type StartFn = Box<dyn Fn() + Send + Sync>;
type CompleteFn = Box<dyn Fn(&SegmentResponse) + Send + Sync>;
type InsertFn = Box<dyn Fn() + Send + Sync>;
type FailureFn = Box<dyn Fn(&SegmentFailure) + Send + Sync>;

/// Closure slots, one per event point; empty slots do nothing
#[derive(Default)]
pub struct FnObserver {
    load_start: Option<StartFn>,
    load_complete: Option<CompleteFn>,
    insert_complete: Option<InsertFn>,
    load_failure: Option<FailureFn>,
}

impl FnObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.load_start = Some(Box::new(f));
        self
    }

    pub fn with_load_complete(
        mut self,
        f: impl Fn(&SegmentResponse) + Send + Sync + 'static,
    ) -> Self {
        self.load_complete = Some(Box::new(f));
        self
    }

    pub fn with_insert_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.insert_complete = Some(Box::new(f));
        self
    }

    pub fn with_load_failure(
        mut self,
        f: impl Fn(&SegmentFailure) + Send + Sync + 'static,
    ) -> Self {
        self.load_failure = Some(Box::new(f));
        self
    }
}

impl SegmentObserver for FnObserver {
    fn on_load_start(&self) {
        if let Some(f) = &self.load_start {
            f();
        }
    }

    fn on_load_complete(&self, response: &SegmentResponse) {
        if let Some(f) = &self.load_complete {
            f(response);
        }
    }

    fn on_insert_complete(&self) {
        if let Some(f) = &self.insert_complete {
            f();
        }
    }

    fn on_load_failure(&self, failure: &SegmentFailure) {
        if let Some(f) = &self.load_failure {
            f(failure);
        }
    }
}

impl std::fmt::Debug for FnObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObserver")
            .field("load_start", &self.load_start.is_some())
            .field("load_complete", &self.load_complete.is_some())
            .field("insert_complete", &self.insert_complete.is_some())
            .field("load_failure", &self.load_failure.is_some())
            .finish()
    }
}
