use graphbinary::{Bytecode, Uuid};

use crate::connection::ConnectionConfig;
use crate::error::Result;
use crate::pool::{Pool, PoolConfig};
use crate::request::Request;
use crate::result_set::ResultSet;
use crate::session::Session;

/// The top-level entry point: a non-session [`Pool`] against one traversal
/// source, plus the ability to mint a [`Session`] handle off the same
/// endpoint (spec.md §6's `submit`/`CreateSession` collaborator surface).
///
/// Grounded on the teacher's `gazette::journal::Client` /
/// `journal_client::connect_journal_client` split: a thin client type that
/// owns the routed transport and exposes the request-shaped operations
/// (`read`, `append`) as methods, rather than leaving callers to build
/// requests and call a lower-level `submit` directly.
pub struct GremlinClient {
    url: String,
    traversal_source: String,
    config: ConnectionConfig,
    pool: Pool,
}

impl GremlinClient {
    /// Connects a non-session pool against `url` for `traversal_source`
    /// (typically `"g"`).
    pub async fn connect(
        url: impl Into<String>,
        traversal_source: impl Into<String>,
        pool_config: PoolConfig,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let url = url.into();
        let pool = Pool::connect(url.clone(), pool_config, config.clone()).await?;
        Ok(Self {
            url,
            traversal_source: traversal_source.into(),
            config,
            pool,
        })
    }

    /// Submits bytecode. `op="bytecode"`, no session — per spec.md §3.
    pub async fn submit(&self, bytecode: Bytecode) -> Result<ResultSet> {
        let request = Request::bytecode(
            Uuid::new_v4(),
            bytecode,
            self.traversal_source.clone(),
            None,
        )?;
        self.pool.submit(request).await
    }

    /// Submits a Gremlin-Groovy script. `op="eval"` — per spec.md §3.
    pub async fn submit_script(&self, script: impl Into<String>) -> Result<ResultSet> {
        let request = Request::eval(Uuid::new_v4(), script, None);
        self.pool.submit(request).await
    }

    /// Binds a new session handle to this client's endpoint, per spec.md
    /// §6's `CreateSession(sessionId?) → handle | error`. The session's
    /// pool is a separate, single-connection pool; it does not share
    /// connections with this client's own pool (spec.md §4.F's session-mode
    /// rule is a property of the session's pool, not a mode switch on an
    /// existing one).
    pub async fn create_session(&self, session_id: Option<Uuid>) -> Result<Session> {
        Session::create(
            &self.url,
            self.traversal_source.clone(),
            session_id,
            self.config.clone(),
        )
        .await
    }

    pub async fn connection_count(&self) -> usize {
        self.pool.connection_count().await
    }

    pub async fn close(&self) -> Result<()> {
        self.pool.close().await
    }
}
