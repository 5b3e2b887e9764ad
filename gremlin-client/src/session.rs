use std::sync::atomic::{AtomicBool, Ordering};

use graphbinary::{Bytecode, Uuid, Value};

use crate::connection::ConnectionConfig;
use crate::error::{Result, UsageError};
use crate::pool::{Pool, PoolConfig};
use crate::request::Request;
use crate::result_set::ResultSet;

/// A bound Gremlin session: requests submitted through it all carry the same
/// `session` id and land on the same single connection, per spec.md §4.F's
/// session-mode rule and §6's session lifecycle (`CreateSession`,
/// `Commit`/`Rollback`).
///
/// Backed by a one-connection [`Pool`] rather than a bespoke connection
/// holder, so session mode only has to change the pool's sizing policy
/// (`maximum_concurrent_connections` forced to 1) instead of duplicating the
/// write/select/close logic a second time.
pub struct Session {
    session_id: Uuid,
    traversal_source: String,
    pool: Pool,
    /// Tracks whether this session currently has a transaction open, so a
    /// second [`Self::begin`] without an intervening commit/rollback can be
    /// rejected with [`UsageError::DoubleBegin`] (spec.md §7).
    tx_open: AtomicBool,
}

impl Session {
    /// Opens a session against `url`. `session_id` defaults to a fresh
    /// random id when `None`.
    pub async fn create(
        url: &str,
        traversal_source: impl Into<String>,
        session_id: Option<Uuid>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let session_id = session_id.unwrap_or_else(Uuid::new_v4);
        let pool = Pool::new(url, PoolConfig::default(), config, true).await?;
        Ok(Self {
            session_id,
            traversal_source: traversal_source.into(),
            pool,
            tx_open: AtomicBool::new(false),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// A session is already server-side stateful; it cannot itself be
    /// handed off into a second, nested session. Always fails with
    /// [`UsageError::AlreadySession`] (spec.md §7) — mirrors the
    /// collaborator surface spec.md §6 describes on the non-session handle,
    /// so callers that generically hold "something you can create a
    /// session from" get a clear error instead of a silent no-op.
    pub async fn create_session(&self, _session_id: Option<Uuid>) -> Result<Session> {
        Err(UsageError::AlreadySession.into())
    }

    /// Submits bytecode under this session's id.
    pub async fn submit(&self, bytecode: Bytecode) -> Result<ResultSet> {
        let request = Request::bytecode(
            Uuid::new_v4(),
            bytecode,
            self.traversal_source.clone(),
            Some(self.session_id),
        )?;
        self.pool.submit(request).await
    }

    /// Marks a transaction as open on this session. A second call before a
    /// commit/rollback fails with [`UsageError::DoubleBegin`] (spec.md §7):
    /// a session's state is tied to one transport, so two concurrently
    /// "open" transactions on the same handle is a caller bug, not
    /// something the server can arbitrate.
    pub fn begin(&self) -> Result<()> {
        if self.tx_open.swap(true, Ordering::SeqCst) {
            return Err(UsageError::DoubleBegin.into());
        }
        Ok(())
    }

    /// Commits the session's open transaction: bytecode with a single
    /// `tx:commit` source instruction and no steps, per spec.md §6.
    pub async fn commit(&self) -> Result<ResultSet> {
        let result = self.submit_tx("tx:commit").await;
        self.tx_open.store(false, Ordering::SeqCst);
        result
    }

    /// Rolls back the session's open transaction: bytecode with a single
    /// `tx:rollback` source instruction, per spec.md §6.
    pub async fn rollback(&self) -> Result<ResultSet> {
        let result = self.submit_tx("tx:rollback").await;
        self.tx_open.store(false, Ordering::SeqCst);
        result
    }

    async fn submit_tx(&self, operator: &str) -> Result<ResultSet> {
        let mut bytecode = Bytecode::default();
        bytecode.add_source(operator, Vec::<Value>::new());
        self.submit(bytecode).await
    }

    /// Closes the session: asks the server to release session-scoped state,
    /// then tears down the underlying connection. Supplements spec.md §6,
    /// which leaves session teardown to the server's idle timeout; an
    /// explicit close avoids leaking server-side state while a long-lived
    /// client process keeps running.
    pub async fn close(&self) -> Result<()> {
        let request = Request::close_session(Uuid::new_v4(), self.session_id);
        let result_set = self.pool.submit(request).await?;
        let _ = result_set.all().await;
        self.pool.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_bytecode_has_single_tx_source() {
        let mut bytecode = Bytecode::default();
        bytecode.add_source("tx:commit", Vec::<Value>::new());
        assert_eq!(bytecode.sources.len(), 1);
        assert_eq!(bytecode.sources[0].operator, "tx:commit");
        assert!(bytecode.steps.is_empty());
    }
}
