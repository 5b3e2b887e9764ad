use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use graphbinary::Uuid;
use tokio::sync::Mutex;

use crate::auth::AuthInfo;
use crate::error::{Error, Result, TransportError, UsageError};
use crate::protocol::{self, Dispatch};
use crate::request::Request;
use crate::result_set::{DEFAULT_CAPACITY, ResultSet};
use crate::transport::{Transport, TransportConfig, TransporterFactory, WebSocketTransporterFactory};

/// The in-flight request table a connection's reader task dispatches
/// against, keyed by request id (spec.md §4.E's "active results").
///
/// A thin `Arc<Mutex<HashMap<..>>>` wrapper rather than a raw map so the
/// register/remove/drain operations used from both `Connection::write` and
/// the reader task stay in one place.
#[derive(Clone, Default)]
pub struct ActiveResults {
    inner: Arc<Mutex<HashMap<Uuid, ResultSet>>>,
}

impl ActiveResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, result_set: ResultSet) {
        self.inner
            .lock()
            .await
            .insert(result_set.request_id(), result_set);
    }

    pub async fn get(&self, request_id: &Uuid) -> Option<ResultSet> {
        self.inner.lock().await.get(request_id).cloned()
    }

    pub async fn remove(&self, request_id: &Uuid) -> Option<ResultSet> {
        self.inner.lock().await.remove(request_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Fails every outstanding entry with `err` and empties the table. Used
    /// when the connection's transport drops: every live request on this
    /// connection fails, none of the others do (spec.md §7).
    pub async fn drain_with_error(&self, err: &Error) {
        let mut guard = self.inner.lock().await;
        for (_, result_set) in guard.drain() {
            result_set.close_err(shared_clone(err)).await;
        }
    }
}

fn shared_clone(err: &Error) -> Error {
    match err {
        Error::Transport(TransportError::UnexpectedEof) => {
            Error::Transport(TransportError::UnexpectedEof)
        }
        Error::Transport(TransportError::Closed) => Error::Transport(TransportError::Closed),
        other => Error::server(-1, other.to_string()),
    }
}

/// spec.md §3's monotonic connection state machine (the `Initialized` phase
/// has no observable window here: a `Connection` is only ever constructed
/// around an already-dialed transport, so it starts life `Established`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Established,
    ClosedDueToError,
    Closed,
}

impl State {
    fn is_closed(self) -> bool {
        !matches!(self, State::Established)
    }
}

/// Per-connection knobs layered on top of [`TransportConfig`]: the result
/// queue capacity and, eventually, protocol-level settings distinct from
/// transport ones. Split out from `TransportConfig` the way the teacher
/// separates dial options from protocol options between `gazette::Client`
/// and its inner `journal_client::RouterConfig`.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub transport: TransportConfig,
    pub result_set_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            result_set_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// One established link to a Gremlin Server: a transport plus the
/// multiplexer state spec.md §4.E describes — the active-results table and
/// the dedicated reader task that drains frames off the wire and dispatches
/// them.
///
/// Grounded on the teacher's `crates/gazette/src/journal/read.rs`
/// reader-task-owns-the-socket structure: one task per connection reads in
/// a loop and fans results out to per-call consumers, exactly the split
/// this module draws between `Connection` (the handle) and the spawned
/// reader (the loop).
pub struct Connection {
    results: ActiveResults,
    transport: Arc<dyn Transport>,
    #[allow(dead_code)]
    auth: Option<AuthInfo>,
    state: Arc<StdMutex<State>>,
    result_capacity: usize,
}

impl Connection {
    /// Dials a connection using the default [`WebSocketTransporterFactory`].
    pub async fn connect(url: &str, config: ConnectionConfig) -> Result<Self> {
        Self::connect_with_factory(url, config, &WebSocketTransporterFactory).await
    }

    /// Dials a connection through an arbitrary [`TransporterFactory`],
    /// per spec.md §6. Used directly by tests wiring in a mock transport;
    /// [`Self::connect`] is the production entry point.
    pub async fn connect_with_factory(
        url: &str,
        config: ConnectionConfig,
        factory: &dyn TransporterFactory,
    ) -> Result<Self> {
        let auth = config.transport.auth.clone();
        let transport = factory.connect(url, &config.transport).await?;
        Ok(Self::from_transport(transport, auth, config.result_set_capacity))
    }

    /// Binds an already-connected [`Transport`] to a fresh connection
    /// state, spawning its reader task. Split out from
    /// [`Self::connect_with_factory`] so tests can hand in a transport that
    /// was never dialed through a `TransporterFactory` at all.
    pub fn from_transport(
        transport: Arc<dyn Transport>,
        auth: Option<AuthInfo>,
        result_capacity: usize,
    ) -> Self {
        let results = ActiveResults::new();
        let state = Arc::new(StdMutex::new(State::Established));

        spawn_reader(transport.clone(), results.clone(), auth.clone(), state.clone());

        Self {
            results,
            transport,
            auth,
            state,
            result_capacity,
        }
    }

    /// Registers a fresh [`ResultSet`] for `request`, writes the framed
    /// request to the wire, and returns the set. The set is registered
    /// *before* the write completes so a response racing ahead of the write
    /// call's return can never find the table empty (spec.md §4.E).
    pub async fn write(&self, request: Request) -> Result<ResultSet> {
        if self.is_closed() {
            return Err(UsageError::Closed.into());
        }
        let result_set = ResultSet::with_capacity(request.request_id, self.result_capacity);
        self.results.register(result_set.clone()).await;

        let frame = protocol::encode_request(&request)?;
        if let Err(err) = self.transport.write(frame).await {
            self.results.remove(&request.request_id).await;
            return Err(err.into());
        }
        Ok(result_set)
    }

    pub async fn active_results(&self) -> usize {
        self.results.len().await
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().is_closed() || self.transport.is_closed()
    }

    pub async fn close(&self) -> Result<()> {
        *self.state.lock().unwrap() = State::Closed;
        self.transport.close().await
    }
}

fn spawn_reader(
    transport: Arc<dyn Transport>,
    results: ActiveResults,
    auth: Option<AuthInfo>,
    state: Arc<StdMutex<State>>,
) {
    tokio::spawn(async move {
        loop {
            match transport.read().await {
                Ok(Some(frame)) => {
                    match protocol::dispatch_frame(frame, &results, auth.as_ref()).await {
                        Ok(Dispatch::Done) => {}
                        Ok(Dispatch::Reply(request)) => {
                            if let Ok(encoded) = protocol::encode_request(&request) {
                                if let Err(err) = transport.write(encoded).await {
                                    tracing::debug!(?err, "failed to send authentication reply");
                                }
                            }
                        }
                        Err(err) => {
                            tracing::debug!(?err, "protocol error dispatching frame");
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("connection closed by peer");
                    fail_all(&results, Error::Transport(TransportError::UnexpectedEof)).await;
                    let _ = transport.close().await;
                    *state.lock().unwrap() = State::ClosedDueToError;
                    break;
                }
                Err(err) => {
                    tracing::warn!(?err, "transport read failed, tearing down connection");
                    fail_all(&results, err).await;
                    let _ = transport.close().await;
                    *state.lock().unwrap() = State::ClosedDueToError;
                    break;
                }
            }
        }
    });
}

async fn fail_all(results: &ActiveResults, err: Error) {
    results.drain_with_error(&err).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn active_results_register_get_remove() {
        let results = ActiveResults::new();
        let request_id = Uuid::new_v4();
        let result_set = ResultSet::new(request_id);
        results.register(result_set.clone()).await;
        assert_eq!(results.len().await, 1);
        assert!(results.get(&request_id).await.is_some());
        results.remove(&request_id).await;
        assert_eq!(results.len().await, 0);
    }

    #[tokio::test]
    async fn drain_with_error_fails_every_entry() {
        let results = ActiveResults::new();
        let a = ResultSet::new(Uuid::new_v4());
        let b = ResultSet::new(Uuid::new_v4());
        results.register(a.clone()).await;
        results.register(b.clone()).await;

        results
            .drain_with_error(&Error::Transport(TransportError::UnexpectedEof))
            .await;

        assert_eq!(results.len().await, 0);
        assert!(a.get_error().await.is_some());
        assert!(b.get_error().await.is_some());
    }
}
