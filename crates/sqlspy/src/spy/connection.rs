use super::{SpyContext, SpyPreparedStatement, SpyStatement};
use crate::dispatch::Dispatcher;
use crate::driver::Connection;
use crate::error::DriverResult;
use crate::event::{Category, StatementKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A connection whose statements are spied.
///
/// Commit and rollback are logged under [`Category::Commit`] and
/// [`Category::Rollback`].
pub struct SpyConnection<C> {
    inner: C,
    ctx: SpyContext,
}

impl<C: Connection> SpyConnection<C> {
    /// Wrap `inner`, assigning it a process-unique connection id.
    pub fn new(inner: C, dispatcher: Arc<Dispatcher>) -> Self {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            inner,
            ctx: SpyContext::new(id, dispatcher),
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.ctx.connection_id
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.ctx.dispatcher
    }

    /// Get a reference to the inner connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Get the inner connection, consuming this wrapper.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Connection> Connection for SpyConnection<C> {
    type Statement = SpyStatement<C::Statement>;
    type Prepared = SpyPreparedStatement<C::Prepared>;
    type Callable = SpyPreparedStatement<C::Callable>;

    fn create_statement(&mut self) -> DriverResult<Self::Statement> {
        let inner = self.inner.create_statement()?;
        Ok(SpyStatement::new(inner, self.ctx.clone()))
    }

    fn prepare_statement(&mut self, sql: &str) -> DriverResult<Self::Prepared> {
        let inner = self.inner.prepare_statement(sql)?;
        Ok(SpyPreparedStatement::new(
            inner,
            self.ctx.clone(),
            sql,
            StatementKind::Prepared,
        ))
    }

    fn prepare_call(&mut self, sql: &str) -> DriverResult<Self::Callable> {
        let inner = self.inner.prepare_call(sql)?;
        Ok(SpyPreparedStatement::new(
            inner,
            self.ctx.clone(),
            sql,
            StatementKind::Callable,
        ))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        self.inner.set_auto_commit(auto_commit)
    }

    fn auto_commit(&self) -> DriverResult<bool> {
        self.inner.auto_commit()
    }

    async fn commit(&mut self) -> DriverResult<()> {
        let probe = self.ctx.probe(Category::Commit);
        let result = self.inner.commit().await;
        if let Some(probe) = probe {
            self.ctx.finish(probe, &result, |_| {
                self.ctx
                    .event(Category::Commit, StatementKind::Connection, "commit")
            });
        }
        result
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        let probe = self.ctx.probe(Category::Rollback);
        let result = self.inner.rollback().await;
        if let Some(probe) = probe {
            self.ctx.finish(probe, &result, |_| {
                self.ctx
                    .event(Category::Rollback, StatementKind::Connection, "rollback")
            });
        }
        result
    }

    fn close(&mut self) -> DriverResult<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
