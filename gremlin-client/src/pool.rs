use std::sync::Arc;

use tokio::sync::Mutex;

use crate::connection::{Connection, ConnectionConfig};
use crate::error::{Result, UsageError};
use crate::request::Request;
use crate::result_set::ResultSet;
use crate::transport::{TransporterFactory, WebSocketTransporterFactory};

/// Admission-control and sizing knobs for a [`Pool`], per spec.md §4.F.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Open a new connection once every existing one carries at least this
    /// many in-flight requests. Default 4.
    pub new_connection_threshold: usize,
    /// Hard cap on concurrently open connections. Defaults to the number of
    /// available CPUs, the same default the teacher's router pool sizing
    /// uses for its dial concurrency.
    pub maximum_concurrent_connections: usize,
    /// Connections opened eagerly at pool construction. Default 1.
    pub initial_concurrent_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            new_connection_threshold: 4,
            maximum_concurrent_connections: num_cpus(),
            initial_concurrent_connections: 1,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

struct Slot {
    connection: Arc<Connection>,
}

/// A load-balancing pool of [`Connection`]s to one Gremlin Server endpoint,
/// per spec.md §4.F.
///
/// Selection is the O(N) fairness scan spec.md describes: find the
/// connection carrying the fewest in-flight requests; if even that minimum
/// is at or above `new_connection_threshold` and there's room under
/// `maximum_concurrent_connections`, open a fresh connection and use it
/// instead. A connection found in an error state is retired and the scan
/// retried. Grounded on the teacher's `crates/gazette/src/router.rs`
/// `sweep()` member-selection loop, which runs the same
/// scan-then-replace-bad-members shape over its route table.
pub struct Pool {
    url: String,
    config: ConnectionConfig,
    pool_config: PoolConfig,
    factory: Arc<dyn TransporterFactory>,
    slots: Mutex<Vec<Slot>>,
    /// Session pools are capped at exactly one connection regardless of
    /// `pool_config`, per spec.md §4.F's session-mode rule.
    session_mode: bool,
    closed: std::sync::atomic::AtomicBool,
}

impl Pool {
    pub async fn connect(url: impl Into<String>, pool_config: PoolConfig, config: ConnectionConfig) -> Result<Self> {
        Self::new(url, pool_config, config, false).await
    }

    pub(crate) async fn new(
        url: impl Into<String>,
        pool_config: PoolConfig,
        config: ConnectionConfig,
        session_mode: bool,
    ) -> Result<Self> {
        Self::with_factory(
            url,
            pool_config,
            config,
            session_mode,
            Arc::new(WebSocketTransporterFactory),
        )
        .await
    }

    /// Builds a pool dialing through an arbitrary [`TransporterFactory`]
    /// instead of the default websocket one — spec.md §6's
    /// `TransporterFactory` seam, exercised directly by tests that wire in
    /// a mock transport to exercise multiplexing/fairness/failure
    /// scenarios without a live server.
    pub async fn with_factory(
        url: impl Into<String>,
        pool_config: PoolConfig,
        config: ConnectionConfig,
        session_mode: bool,
        factory: Arc<dyn TransporterFactory>,
    ) -> Result<Self> {
        let url = url.into();
        let pool = Self {
            url: url.clone(),
            config,
            pool_config,
            factory,
            slots: Mutex::new(Vec::new()),
            session_mode,
            closed: std::sync::atomic::AtomicBool::new(false),
        };

        let initial = if session_mode {
            1
        } else {
            pool.pool_config.initial_concurrent_connections.max(1)
        };
        for _ in 0..initial {
            pool.open_connection().await?;
        }
        Ok(pool)
    }

    fn effective_cap(&self) -> usize {
        if self.session_mode {
            1
        } else {
            self.pool_config.maximum_concurrent_connections.max(1)
        }
    }

    async fn open_connection(&self) -> Result<Arc<Connection>> {
        let connection = Arc::new(
            Connection::connect_with_factory(&self.url, self.config.clone(), self.factory.as_ref())
                .await?,
        );
        tracing::debug!(url = %self.url, "pool opened new connection");
        self.slots.lock().await.push(Slot {
            connection: connection.clone(),
        });
        Ok(connection)
    }

    /// Selects a connection to carry the next request, opening a new one if
    /// admission control allows it, retiring any connection observed in an
    /// error state.
    async fn select(&self) -> Result<Arc<Connection>> {
        loop {
            let candidate = {
                let slots = self.slots.lock().await;
                let mut best: Option<(usize, Arc<Connection>)> = None;
                for slot in slots.iter() {
                    if slot.connection.is_closed() {
                        continue;
                    }
                    let load = slot.connection.active_results().await;
                    if best.as_ref().map(|(b, _)| load < *b).unwrap_or(true) {
                        best = Some((load, slot.connection.clone()));
                    }
                }
                best
            };

            self.reap_closed().await;

            match candidate {
                Some((load, connection)) => {
                    let under_cap = self.slots.lock().await.len() < self.effective_cap();
                    if load >= self.pool_config.new_connection_threshold && under_cap {
                        tracing::debug!(load, "all connections over threshold, opening new one");
                        return self.open_connection().await;
                    }
                    return Ok(connection);
                }
                None => {
                    return self.open_connection().await;
                }
            }
        }
    }

    async fn reap_closed(&self) {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|slot| !slot.connection.is_closed());
        let removed = before - slots.len();
        if removed > 0 {
            tracing::debug!(removed, "retired closed connections from pool");
        }
    }

    /// Submits `request` on whichever connection the selection policy picks.
    pub async fn submit(&self, request: Request) -> Result<ResultSet> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(UsageError::Closed.into());
        }
        let connection = self.select().await?;
        connection.write(request).await
    }

    pub async fn connection_count(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Closes every connection in parallel and marks the pool closed.
    /// Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return Ok(());
        }
        let slots = self.slots.lock().await;
        let closes = slots
            .iter()
            .map(|slot| {
                let connection = slot.connection.clone();
                async move { connection.close().await }
            })
            .collect::<Vec<_>>();
        drop(slots);
        futures::future::join_all(closes).await;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_and_initial_size() {
        let config = PoolConfig::default();
        assert_eq!(config.new_connection_threshold, 4);
        assert_eq!(config.initial_concurrent_connections, 1);
        assert!(config.maximum_concurrent_connections >= 1);
    }
}
