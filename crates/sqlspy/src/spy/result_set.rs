use super::SpyContext;
use crate::driver::ResultSet;
use crate::error::DriverResult;
use crate::event::{Category, StatementKind};
use crate::render::literal;
use crate::value::SqlValue;
use std::sync::Arc;

/// A spied result set.
///
/// Each `next` is timed as a [`Category::Result`] event. Column values read
/// from a row are collected as `label = literal` and published as one
/// [`Category::ResultSet`] event when the cursor moves on, the result set is
/// closed or dropped.
pub struct SpyResultSet<R> {
    inner: R,
    ctx: SpyContext,
    template: Arc<str>,
    kind: StatementKind,
    row: Vec<(String, String)>,
    // Whether values of the current row are collected; decided on first read.
    row_enabled: Option<bool>,
}

impl<R> SpyResultSet<R> {
    pub(crate) fn new(inner: R, ctx: SpyContext, template: &str, kind: StatementKind) -> Self {
        Self {
            inner,
            ctx,
            template: Arc::from(template),
            kind,
            row: Vec::new(),
            row_enabled: None,
        }
    }

    /// SQL of the statement that produced this result set.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Get a reference to the inner result set.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn collecting(&mut self) -> bool {
        *self.row_enabled.get_or_insert_with(|| {
            let config = self.ctx.dispatcher.config();
            self.ctx.dispatcher.wants(&config, Category::ResultSet)
        })
    }

    fn record(&mut self, label: String, value: &SqlValue) {
        let config = self.ctx.dispatcher.config();
        self.row.push((label, literal(value, &config.render)));
    }

    fn flush_row(&mut self) {
        self.row_enabled = None;
        if self.row.is_empty() {
            return;
        }
        let row = std::mem::take(&mut self.row);
        if let Some(probe) = self.ctx.probe(Category::ResultSet) {
            self.ctx.emit(probe, |_| {
                let values = row
                    .iter()
                    .map(|(label, value)| format!("{label} = {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.ctx
                    .event(Category::ResultSet, self.kind, &*self.template)
                    .with_rendered_sql(values)
            });
        }
    }
}

impl<R: ResultSet> ResultSet for SpyResultSet<R> {
    fn next(&mut self) -> DriverResult<bool> {
        self.flush_row();
        let probe = self.ctx.probe(Category::Result);
        let result = self.inner.next();
        if let Some(probe) = probe {
            self.ctx.finish(probe, &result, |_| {
                self.ctx
                    .event(Category::Result, self.kind, &*self.template)
            });
        }
        result
    }

    fn get_value(&mut self, column: usize) -> DriverResult<SqlValue> {
        let value = self.inner.get_value(column)?;
        if self.collecting() {
            let label = self
                .inner
                .column_label(column)
                .unwrap_or_else(|_| column.to_string());
            self.record(label, &value);
        }
        Ok(value)
    }

    fn get_value_by_label(&mut self, label: &str) -> DriverResult<SqlValue> {
        let value = self.inner.get_value_by_label(label)?;
        if self.collecting() {
            self.record(label.to_string(), &value);
        }
        Ok(value)
    }

    fn column_count(&self) -> DriverResult<usize> {
        self.inner.column_count()
    }

    fn column_label(&self, column: usize) -> DriverResult<String> {
        self.inner.column_label(column)
    }

    fn was_null(&self) -> DriverResult<bool> {
        self.inner.was_null()
    }

    fn close(&mut self) -> DriverResult<()> {
        self.flush_row();
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<R> Drop for SpyResultSet<R> {
    fn drop(&mut self) {
        self.flush_row();
    }
}
