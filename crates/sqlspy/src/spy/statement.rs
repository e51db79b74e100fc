use super::{SpyContext, SpyResultSet};
use crate::driver::Statement;
use crate::error::DriverResult;
use crate::event::{Category, StatementKind};

/// A spied plain statement. The SQL text is the template and the rendering.
pub struct SpyStatement<S> {
    inner: S,
    ctx: SpyContext,
    batch: Vec<String>,
    last_sql: Option<String>,
}

impl<S: Statement> SpyStatement<S> {
    pub(crate) fn new(inner: S, ctx: SpyContext) -> Self {
        Self {
            inner,
            ctx,
            batch: Vec::new(),
            last_sql: None,
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.ctx.connection_id
    }

    /// SQL queued for the next batch.
    pub fn batch(&self) -> &[String] {
        &self.batch
    }

    /// Get a reference to the inner statement.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn observe<T>(&mut self, sql: &str, probe: Option<super::Probe>, result: &DriverResult<T>) {
        self.last_sql = Some(sql.to_string());
        if let Some(probe) = probe {
            self.ctx.finish(probe, result, |_| {
                self.ctx
                    .event(Category::Statement, StatementKind::Plain, sql)
            });
        }
    }
}

impl<S: Statement> Statement for SpyStatement<S> {
    type ResultSet = SpyResultSet<S::ResultSet>;

    async fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        let probe = self.ctx.probe(Category::Statement);
        let result = self.inner.execute(sql).await;
        self.observe(sql, probe, &result);
        result
    }

    async fn execute_query(&mut self, sql: &str) -> DriverResult<Self::ResultSet> {
        let probe = self.ctx.probe(Category::Statement);
        let result = self.inner.execute_query(sql).await;
        self.observe(sql, probe, &result);
        result.map(|rs| SpyResultSet::new(rs, self.ctx.clone(), sql, StatementKind::Plain))
    }

    async fn execute_update(&mut self, sql: &str) -> DriverResult<u64> {
        let probe = self.ctx.probe(Category::Statement);
        let result = self.inner.execute_update(sql).await;
        self.observe(sql, probe, &result);
        result
    }

    fn add_batch(&mut self, sql: &str) -> DriverResult<()> {
        self.inner.add_batch(sql)?;
        if let Some(probe) = self.ctx.probe(Category::Batch) {
            self.ctx.emit(probe, |_| {
                self.ctx.event(Category::Batch, StatementKind::Plain, sql)
            });
        }
        self.batch.push(sql.to_string());
        Ok(())
    }

    fn clear_batch(&mut self) -> DriverResult<()> {
        self.inner.clear_batch()?;
        self.batch.clear();
        Ok(())
    }

    async fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        let probe = self.ctx.probe(Category::Statement);
        let result = self.inner.execute_batch().await;
        let entries = std::mem::take(&mut self.batch);
        if let Some(probe) = probe {
            self.ctx.finish(probe, &result, |_| {
                self.ctx
                    .event(Category::Statement, StatementKind::Batch, entries.join("; "))
                    .with_batch(entries)
            });
        }
        result
    }

    fn result_set(&mut self) -> DriverResult<Option<Self::ResultSet>> {
        let rs = self.inner.result_set()?;
        let sql = self.last_sql.as_deref().unwrap_or_default();
        Ok(rs.map(|rs| SpyResultSet::new(rs, self.ctx.clone(), sql, StatementKind::Plain)))
    }

    fn update_count(&self) -> DriverResult<Option<u64>> {
        self.inner.update_count()
    }

    fn close(&mut self) -> DriverResult<()> {
        self.inner.close()?;
        self.batch.clear();
        self.last_sql = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
