use std::sync::Arc;

use graphbinary::{Uuid, Value, ValueMap};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{Error, Result};

/// Default buffer capacity of a [`ResultSet`]'s queue, per spec.md §4.D.
pub const DEFAULT_CAPACITY: usize = 1000;

/// One item streamed back for a request: the decoded value plus the
/// traverser `bulk` it arrived with, if the wire value was a traverser.
/// spec.md's reference bulk-expansion policy (§9's Open Question,
/// resolved): one `Result` per wire value, `bulk` kept as metadata and
/// never used to duplicate entries client-side.
#[derive(Debug, Clone, PartialEq)]
pub struct GremlinResult {
    pub value: Value,
    pub bulk: Option<i64>,
}

impl GremlinResult {
    pub fn new(value: Value) -> Self {
        Self { value, bulk: None }
    }

    pub fn with_bulk(value: Value, bulk: i64) -> Self {
        Self {
            value,
            bulk: Some(bulk),
        }
    }
}

#[derive(Debug, Clone)]
enum Terminal {
    Open,
    ClosedOk,
    ClosedErr(Arc<Error>),
}

struct Shared {
    terminal: Mutex<Terminal>,
    attributes: Mutex<ValueMap>,
    aggregate_to: Mutex<Option<String>>,
    signal: Notify,
    sender: Mutex<Option<mpsc::Sender<GremlinResult>>>,
}

/// The request-scoped sink described in spec.md §4.D: a buffered queue of
/// results plus terminal state and sticky metadata.
///
/// Backed by a bounded `tokio::sync::mpsc` channel (backpressure falls out
/// of the bound directly — spec.md's "blocks the reader task otherwise") and
/// a `tokio::sync::Notify` as the sticky one-shot wake-up spec.md calls
/// `waitSignal`. This mirrors the teacher's own choice of `tokio::sync`
/// primitives over hand-rolled ones for exactly this kind of single-slot
/// coordination (`crates/gazette/src/journal/append.rs`'s `oneshot::channel`
/// use for its input-error signal).
#[derive(Clone)]
pub struct ResultSet {
    request_id: Uuid,
    shared: Arc<Shared>,
    receiver: Arc<Mutex<mpsc::Receiver<GremlinResult>>>,
}

impl ResultSet {
    pub fn new(request_id: Uuid) -> Self {
        Self::with_capacity(request_id, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(request_id: Uuid, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            request_id,
            shared: Arc::new(Shared {
                terminal: Mutex::new(Terminal::Open),
                attributes: Mutex::new(Vec::new()),
                aggregate_to: Mutex::new(None),
                signal: Notify::new(),
                sender: Mutex::new(Some(sender)),
            }),
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Pushes a result. Non-blocking so long as buffer capacity remains;
    /// blocks the caller (the connection's reader task) otherwise. A no-op,
    /// by design, if the set has already reached a terminal state — no item
    /// is ever delivered after `closedOk`/`closedErr` (spec.md §3's
    /// invariant).
    pub async fn add_result(&self, item: GremlinResult) {
        let sender = self.shared.sender.lock().await.clone();
        if let Some(sender) = sender {
            // Ignore send errors: a dropped receiver means the caller
            // abandoned their drain, which spec.md §5 says must not affect
            // the request's completion server-side.
            let _ = sender.send(item).await;
        }
    }

    /// Marks the set `closedOk`, stamping the final status attributes and
    /// aggregation hint. Idempotent with respect to terminal state: calling
    /// this after `close_err` has no effect.
    ///
    /// `aggregate_to` only overwrites the sticky hint when the terminal
    /// frame actually carries one — a `None` here must not erase a hint a
    /// prior partial frame already stamped via [`Self::set_aggregate_to`]
    /// (spec.md §4.C step 2: the hint is sticky, not reset by a later frame
    /// that's merely silent on it).
    pub async fn close_ok(&self, attributes: ValueMap, aggregate_to: Option<String>) {
        let mut terminal = self.shared.terminal.lock().await;
        if matches!(*terminal, Terminal::Open) {
            *self.shared.attributes.lock().await = attributes;
            if let Some(aggregate_to) = aggregate_to {
                *self.shared.aggregate_to.lock().await = Some(aggregate_to);
            }
            *terminal = Terminal::ClosedOk;
            self.shared.sender.lock().await.take();
            self.shared.signal.notify_waiters();
        }
    }

    /// Marks the set `closedErr`. Idempotent: the first error wins.
    pub async fn close_err(&self, err: Error) {
        let mut terminal = self.shared.terminal.lock().await;
        if matches!(*terminal, Terminal::Open) {
            *terminal = Terminal::ClosedErr(Arc::new(err));
            self.shared.sender.lock().await.take();
            self.shared.signal.notify_waiters();
        }
    }

    /// Closes the set without an error, dropping subsequent frames for this
    /// request id. Idempotent.
    pub async fn close(&self) {
        self.close_ok(Vec::new(), None).await;
    }

    /// Consumes to completion. Returns an error if the set ends `closedErr`.
    pub async fn all(&self) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut receiver = self.receiver.lock().await;
        while let Some(item) = receiver.recv().await {
            items.push(item.value);
        }
        drop(receiver);
        self.propagate_terminal_error().await?;
        Ok(items)
    }

    /// Consumes a single item, blocking until one is available or the set
    /// reaches a terminal state (in which case `None` is returned, or the
    /// terminal error is propagated).
    pub async fn one(&self) -> Result<Option<Value>> {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(item) => Ok(Some(item.value)),
            None => {
                drop(receiver);
                self.propagate_terminal_error().await?;
                Ok(None)
            }
        }
    }

    async fn propagate_terminal_error(&self) -> Result<()> {
        if let Terminal::ClosedErr(err) = &*self.shared.terminal.lock().await {
            return Err(clone_error(err));
        }
        Ok(())
    }

    /// A hard predicate, not a snapshot (spec.md §4.D): if the queue is
    /// currently empty but still open, this waits for the next state change
    /// (a push, or a terminal transition) and re-evaluates, rather than
    /// returning a possibly-stale `true`.
    pub async fn is_empty(&self) -> bool {
        loop {
            {
                let receiver = self.receiver.lock().await;
                if !receiver.is_empty() {
                    return false;
                }
            }
            if !matches!(*self.shared.terminal.lock().await, Terminal::Open) {
                return true;
            }
            let notified = self.shared.signal.notified();
            // Re-check after registering interest to avoid missing a signal
            // that fired between the checks above and here.
            {
                let receiver = self.receiver.lock().await;
                if !receiver.is_empty() {
                    return false;
                }
            }
            if !matches!(*self.shared.terminal.lock().await, Terminal::Open) {
                return true;
            }
            notified.await;
        }
    }

    pub async fn get_status_attributes(&self) -> ValueMap {
        self.shared.attributes.lock().await.clone()
    }

    pub async fn get_aggregate_to(&self) -> Option<String> {
        self.shared.aggregate_to.lock().await.clone()
    }

    /// Stamps the sticky aggregation hint from `result.meta.aggregateTo`.
    /// Per spec.md §4.C step 2, the hint is applied on *every* partial
    /// frame, not just at terminal time, so a server that sends it once on
    /// an early 206 and omits it from the final 200/204 still leaves it
    /// visible on [`Self::get_aggregate_to`].
    pub async fn set_aggregate_to(&self, aggregate_to: String) {
        *self.shared.aggregate_to.lock().await = Some(aggregate_to);
    }

    pub async fn get_error(&self) -> Option<Error> {
        match &*self.shared.terminal.lock().await {
            Terminal::ClosedErr(err) => Some(clone_error(err)),
            _ => None,
        }
    }

    /// The consumer-facing streaming endpoint: yields values until
    /// `closedOk` (the stream simply ends) or `closedErr` (the error is
    /// dropped; callers that need it should also check [`Self::get_error`]).
    pub fn channel(&self) -> impl futures_core::Stream<Item = Value> {
        // ReceiverStream needs ownership of a Receiver; since ResultSet may
        // be cloned and consumed from one logical drain, we hand out a
        // fresh bounded channel fed by a forwarding task rather than taking
        // the shared receiver, so `channel()` can be called without
        // poisoning `all`/`one` on the same handle.
        let (tx, rx) = mpsc::channel(DEFAULT_CAPACITY);
        let receiver = self.receiver.clone();
        tokio::spawn(async move {
            let mut receiver = receiver.lock().await;
            while let Some(item) = receiver.recv().await {
                if tx.send(item.value).await.is_err() {
                    break;
                }
            }
        });
        ReceiverStream::new(rx)
    }
}

fn clone_error(err: &Arc<Error>) -> Error {
    Error::Shared(err.clone())
}
