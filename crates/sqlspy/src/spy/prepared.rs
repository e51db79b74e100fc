use super::{Probe, SpyContext, SpyResultSet};
use crate::bind::{BindingSnapshot, Bindings};
use crate::config::SpyConfig;
use crate::driver::{CallableStatement, PreparedStatement};
use crate::error::DriverResult;
use crate::event::{Category, ExecutionEvent, StatementKind};
use crate::render::{render, render_batch};
use crate::value::{SqlType, SqlValue};
use std::sync::Arc;

/// A spied prepared or callable statement.
///
/// Every bind is forwarded first; the binding is recorded only when the
/// delegate accepted it. Each execution renders the template against the
/// bindings current at that moment.
pub struct SpyPreparedStatement<P> {
    inner: P,
    ctx: SpyContext,
    template: Arc<str>,
    kind: StatementKind,
    bindings: Bindings,
    batch: Vec<BindingSnapshot>,
}

impl<P: PreparedStatement> SpyPreparedStatement<P> {
    pub(crate) fn new(inner: P, ctx: SpyContext, template: &str, kind: StatementKind) -> Self {
        Self {
            inner,
            ctx,
            template: Arc::from(template),
            kind,
            bindings: Bindings::new(),
            batch: Vec::new(),
        }
    }

    /// SQL as supplied when the statement was prepared.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn connection_id(&self) -> u64 {
        self.ctx.connection_id
    }

    /// Current bindings.
    pub fn bindings(&self) -> BindingSnapshot {
        self.bindings.snapshot()
    }

    /// Number of parameter sets queued for the next batch.
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// Get a reference to the inner statement.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// The template rendered with the current bindings under the current config.
    pub fn rendered_sql(&self) -> String {
        let config = self.ctx.dispatcher.config();
        render(&self.template, &self.bindings.snapshot(), &config.render).sql
    }

    fn statement_event(&self, config: &SpyConfig) -> ExecutionEvent {
        let rendered = render(&self.template, &self.bindings.snapshot(), &config.render);
        self.ctx
            .event(Category::Statement, self.kind, &*self.template)
            .with_rendered(rendered)
    }

    fn observe<T>(&self, probe: Option<Probe>, result: &DriverResult<T>) {
        if let Some(probe) = probe {
            self.ctx
                .finish(probe, result, |config| self.statement_event(config));
        }
    }
}

impl<P: PreparedStatement> PreparedStatement for SpyPreparedStatement<P> {
    type ResultSet = SpyResultSet<P::ResultSet>;

    fn set_value(&mut self, index: usize, value: SqlValue) -> DriverResult<()> {
        self.inner.set_value(index, value.clone())?;
        self.bindings.set_positional(index, value);
        Ok(())
    }

    fn clear_parameters(&mut self) -> DriverResult<()> {
        self.inner.clear_parameters()?;
        self.bindings.clear();
        Ok(())
    }

    async fn execute(&mut self) -> DriverResult<bool> {
        let probe = self.ctx.probe(Category::Statement);
        let result = self.inner.execute().await;
        self.observe(probe, &result);
        result
    }

    async fn execute_query(&mut self) -> DriverResult<Self::ResultSet> {
        let probe = self.ctx.probe(Category::Statement);
        let result = self.inner.execute_query().await;
        self.observe(probe, &result);
        result.map(|rs| SpyResultSet::new(rs, self.ctx.clone(), &self.template, self.kind))
    }

    async fn execute_update(&mut self) -> DriverResult<u64> {
        let probe = self.ctx.probe(Category::Statement);
        let result = self.inner.execute_update().await;
        self.observe(probe, &result);
        result
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        self.inner.add_batch()?;
        let entry = self.bindings.snapshot();
        if let Some(probe) = self.ctx.probe(Category::Batch) {
            self.ctx.emit(probe, |config| {
                let rendered = render(&self.template, &entry, &config.render);
                self.ctx
                    .event(Category::Batch, self.kind, &*self.template)
                    .with_rendered(rendered)
            });
        }
        self.batch.push(entry);
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
            self.ctx.finish(probe, &result, |config| {
                let rendered = render_batch(&self.template, &entries, &config.render)
                    .into_iter()
                    .map(|r| r.sql)
                    .collect();
                self.ctx
                    .event(Category::Statement, StatementKind::Batch, &*self.template)
                    .with_batch(rendered)
            });
        }
        result
    }

    fn result_set(&mut self) -> DriverResult<Option<Self::ResultSet>> {
        let rs = self.inner.result_set()?;
        Ok(rs.map(|rs| SpyResultSet::new(rs, self.ctx.clone(), &self.template, self.kind)))
    }

    fn update_count(&self) -> DriverResult<Option<u64>> {
        self.inner.update_count()
    }

    fn close(&mut self) -> DriverResult<()> {
        self.inner.close()?;
        self.bindings.clear();
        self.batch.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<P: CallableStatement> CallableStatement for SpyPreparedStatement<P> {
    fn set_named_value(&mut self, name: &str, value: SqlValue) -> DriverResult<()> {
        self.inner.set_named_value(name, value.clone())?;
        self.bindings.set_named(name, value);
        Ok(())
    }

    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType) -> DriverResult<()> {
        self.inner.register_out_parameter(index, sql_type)?;
        self.bindings.register_out(index, sql_type);
        Ok(())
    }

    fn register_named_out_parameter(
        &mut self,
        name: &str,
        sql_type: SqlType,
    ) -> DriverResult<()> {
        self.inner.register_named_out_parameter(name, sql_type)?;
        self.bindings.register_named_out(name, sql_type);
        Ok(())
    }

    fn get_value(&mut self, index: usize) -> DriverResult<SqlValue> {
        self.inner.get_value(index)
    }

    fn get_named_value(&mut self, name: &str) -> DriverResult<SqlValue> {
        self.inner.get_named_value(name)
    }

    fn was_null(&self) -> DriverResult<bool> {
        self.inner.was_null()
    }
}
