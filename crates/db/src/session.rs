//! Transaction scoping.
//!
//! [`transact`] opens a transaction, hands the caller a [`Session`], and
//! commits or rolls back depending on what the caller's future returns.
//! Repository writes take a [`WriteExecutor`]: either the pool or a
//! session, with the same call shape for both.
//!
//! A write inside a session invalidates its cache keys right away and again
//! after the commit, so a read that refilled the cache from the pre-commit
//! row in between cannot outlive the transaction.

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::cache::Invalidate;
use crate::error::ModelError;
use crate::DbPool;

/// Invalidation to repeat after commit.
type Deferred = (Arc<dyn Invalidate>, Vec<String>);

/// Handle to an open transaction.
///
/// Cloning shares the same transaction. Once [`transact`] has committed or
/// rolled back, [`Session::conn`] returns [`ModelError::TransactionClosed`].
#[derive(Clone)]
pub struct Session {
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
    deferred: Arc<std::sync::Mutex<Vec<Deferred>>>,
}

impl Session {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            deferred: Arc::default(),
        }
    }

    /// Lock the transaction's connection for the duration of one or more
    /// statements.
    ///
    /// Release the guard before handing the session to a repository write,
    /// which locks the connection itself.
    pub async fn conn(&self) -> Result<MappedMutexGuard<'_, PgConnection>, ModelError> {
        let guard = self.tx.lock().await;
        MutexGuard::try_map(guard, |tx| tx.as_deref_mut())
            .map_err(|_| ModelError::TransactionClosed)
    }

    /// Delete `keys` through `cache` again once the transaction commits.
    /// Dropped on rollback.
    pub fn defer_invalidate(&self, cache: Arc<dyn Invalidate>, keys: Vec<String>) {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((cache, keys));
    }

    async fn finish(&self) -> Option<Transaction<'static, Postgres>> {
        self.tx.lock().await.take()
    }

    /// Run every deferred invalidation, returning the first failure. Each
    /// failed invalidation schedules its own retry.
    async fn run_deferred(&self) -> Result<(), ModelError> {
        let deferred =
            std::mem::take(&mut *self.deferred.lock().unwrap_or_else(PoisonError::into_inner));
        let mut first_err = None;
        for (cache, keys) in deferred {
            if let Err(e) = cache.invalidate(&keys).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Connection one write runs on.
pub enum WriteConn<'a> {
    Pooled(PoolConnection<Postgres>),
    Session(MappedMutexGuard<'a, PgConnection>),
}

impl Deref for WriteConn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            WriteConn::Pooled(conn) => &**conn,
            WriteConn::Session(conn) => &**conn,
        }
    }
}

impl DerefMut for WriteConn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            WriteConn::Pooled(conn) => &mut **conn,
            WriteConn::Session(conn) => &mut **conn,
        }
    }
}

/// Where a repository write runs: the pool or an open [`Session`].
#[async_trait]
pub trait WriteExecutor: Send + Sync {
    /// Connection for one write.
    async fn write_conn(&self) -> Result<WriteConn<'_>, ModelError>;

    /// Register `keys` for invalidation after commit. A no-op outside a
    /// transaction, where the write's own invalidation is final.
    fn defer_invalidate(&self, cache: Arc<dyn Invalidate>, keys: Vec<String>);
}

#[async_trait]
impl WriteExecutor for DbPool {
    async fn write_conn(&self) -> Result<WriteConn<'_>, ModelError> {
        Ok(WriteConn::Pooled(self.acquire().await?))
    }

    fn defer_invalidate(&self, _cache: Arc<dyn Invalidate>, _keys: Vec<String>) {}
}

#[async_trait]
impl WriteExecutor for Session {
    async fn write_conn(&self) -> Result<WriteConn<'_>, ModelError> {
        Ok(WriteConn::Session(self.conn().await?))
    }

    fn defer_invalidate(&self, cache: Arc<dyn Invalidate>, keys: Vec<String>) {
        Session::defer_invalidate(self, cache, keys);
    }
}

/// Run `f` inside a transaction on `pool`.
///
/// Commits when `f` returns `Ok`; rolls back and returns `f`'s error
/// unchanged otherwise. After a commit the session's deferred
/// invalidations run; if one fails the commit stands and
/// [`ModelError::Cache`] is returned. Nested transactions are not
/// supported: pass the session down instead of calling `transact` again.
pub async fn transact<T, F, Fut>(pool: &DbPool, f: F) -> Result<T, ModelError>
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let session = Session::new(pool.begin().await?);
    let outcome = f(session.clone()).await;
    let tx = session
        .finish()
        .await
        .ok_or(ModelError::TransactionClosed)?;

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            session.run_deferred().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}
