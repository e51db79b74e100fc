use super::Shared;
use super::result_set::PgResultSet;
use super::translate::{Translated, translate, translate_plain};
use super::types::decode;
use crate::driver::{CallableStatement, PreparedStatement, Statement};
use crate::error::{DriverError, DriverResult};
use crate::value::{SqlType, SqlValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// What the last execution produced.
enum LastResult {
    Rows(PgResultSet),
    Count(u64),
}

fn labels(stmt: &tokio_postgres::Statement) -> Vec<String> {
    stmt.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Run a prepared server statement, buffering rows when it returns any.
async fn run(
    shared: &Shared,
    stmt: &tokio_postgres::Statement,
    values: &[SqlValue],
) -> DriverResult<(LastResult, Option<Row>)> {
    let params: Vec<&(dyn ToSql + Sync)> =
        values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
    if stmt.columns().is_empty() {
        let count = shared.client.execute(stmt, &params).await?;
        return Ok((LastResult::Count(count), None));
    }
    let rows = shared.client.query(stmt, &params).await?;
    let first = rows.first().cloned();
    Ok((LastResult::Rows(PgResultSet::new(labels(stmt), rows)), first))
}

fn no_result_set() -> DriverError {
    DriverError::Other("statement did not return a result set".to_string())
}

/// A postgres plain statement.
pub struct PgStatement {
    shared: Arc<Shared>,
    batch: Vec<String>,
    last: Option<LastResult>,
    closed: bool,
}

impl PgStatement {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            batch: Vec::new(),
            last: None,
            closed: false,
        }
    }

    fn check_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("statement"));
        }
        self.shared.check_open()
    }

    async fn run_sql(&mut self, sql: &str) -> DriverResult<bool> {
        self.check_open()?;
        self.last = None;
        self.shared.begin_if_needed().await?;
        let stmt = self.shared.client.prepare(&translate_plain(sql)).await?;
        let (last, _) = run(&self.shared, &stmt, &[]).await?;
        let has_rows = matches!(last, LastResult::Rows(_));
        self.last = Some(last);
        Ok(has_rows)
    }
}

impl Statement for PgStatement {
    type ResultSet = PgResultSet;

    async fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        self.run_sql(sql).await
    }

    async fn execute_query(&mut self, sql: &str) -> DriverResult<PgResultSet> {
        self.run_sql(sql).await?;
        match self.last.take() {
            Some(LastResult::Rows(rs)) => Ok(rs),
            _ => Err(no_result_set()),
        }
    }

    async fn execute_update(&mut self, sql: &str) -> DriverResult<u64> {
        self.run_sql(sql).await?;
        Ok(match &self.last {
            Some(LastResult::Count(n)) => *n,
            Some(LastResult::Rows(rs)) => rs.len() as u64,
            None => 0,
        })
    }

    fn add_batch(&mut self, sql: &str) -> DriverResult<()> {
        self.check_open()?;
        self.batch.push(sql.to_string());
        Ok(())
    }

    fn clear_batch(&mut self) -> DriverResult<()> {
        self.check_open()?;
        self.batch.clear();
        Ok(())
    }

    async fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        self.check_open()?;
        let entries = std::mem::take(&mut self.batch);
        self.shared.begin_if_needed().await?;
        let mut counts = Vec::with_capacity(entries.len());
        for sql in &entries {
            counts.push(
                self.shared
                    .client
                    .execute(translate_plain(sql).as_str(), &[])
                    .await?,
            );
        }
        Ok(counts)
    }

    fn result_set(&mut self) -> DriverResult<Option<PgResultSet>> {
        self.check_open()?;
        match self.last.take() {
            Some(LastResult::Rows(rs)) => Ok(Some(rs)),
            other => {
                self.last = other;
                Ok(None)
            }
        }
    }

    fn update_count(&self) -> DriverResult<Option<u64>> {
        self.check_open()?;
        Ok(match self.last {
            Some(LastResult::Count(n)) => Some(n),
            _ => None,
        })
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.batch.clear();
        self.last = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A named procedure argument, kept in binding order.
struct NamedParam {
    name: String,
    value: Option<SqlValue>,
    out: Option<SqlType>,
}

/// A postgres prepared statement, also used for callable statements.
pub struct PgPreparedStatement {
    shared: Arc<Shared>,
    translated: Translated,
    prepared: Option<(String, tokio_postgres::Statement)>,
    params: Vec<Option<SqlValue>>,
    out: BTreeMap<usize, SqlType>,
    named: Vec<NamedParam>,
    batch: Vec<Vec<Option<SqlValue>>>,
    last: Option<LastResult>,
    out_values: BTreeMap<usize, SqlValue>,
    named_out_values: BTreeMap<String, SqlValue>,
    last_was_null: bool,
    closed: bool,
}

impl PgPreparedStatement {
    pub(crate) fn new(shared: Arc<Shared>, sql: &str) -> Self {
        let translated = translate(sql);
        Self {
            shared,
            params: vec![None; translated.params],
            translated,
            prepared: None,
            out: BTreeMap::new(),
            named: Vec::new(),
            batch: Vec::new(),
            last: None,
            out_values: BTreeMap::new(),
            named_out_values: BTreeMap::new(),
            last_was_null: false,
            closed: false,
        }
    }

    /// SQL as sent to the server.
    pub fn server_sql(&self) -> &str {
        &self.translated.sql
    }

    fn check_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("statement"));
        }
        self.shared.check_open()
    }

    fn check_index(&self, index: usize) -> DriverResult<()> {
        if index == 0 || index > self.translated.params {
            return Err(DriverError::invalid_parameter(format!(
                "parameter index {index} out of range (1..={})",
                self.translated.params
            )));
        }
        Ok(())
    }

    fn named_slot(&mut self, name: &str) -> &mut NamedParam {
        let pos = match self.named.iter().position(|p| p.name == name) {
            Some(pos) => pos,
            None => {
                self.named.push(NamedParam {
                    name: name.to_string(),
                    value: None,
                    out: None,
                });
                self.named.len() - 1
            }
        };
        &mut self.named[pos]
    }

    /// Server SQL and `$1..$n` values for one execution.
    fn bind(&self, params: &[Option<SqlValue>]) -> DriverResult<(String, Vec<SqlValue>)> {
        if !self.named.is_empty() {
            return self.bind_named();
        }

        let offset = self.translated.offset;
        let mut values = Vec::with_capacity(self.translated.server_params());
        for jdbc in offset + 1..=self.translated.params {
            let value = match (params.get(jdbc - 1).cloned().flatten(), self.out.get(&jdbc)) {
                (Some(value), _) => value,
                // OUT-only arguments are passed as NULL.
                (None, Some(ty)) => SqlValue::Null(*ty),
                (None, None) => {
                    return Err(DriverError::invalid_parameter(format!(
                        "no value specified for parameter {jdbc}"
                    )));
                }
            };
            values.push(value);
        }
        Ok((self.translated.sql.clone(), values))
    }

    /// `CALL p(a => $1, b => $2)` from named arguments.
    fn bind_named(&self) -> DriverResult<(String, Vec<SqlValue>)> {
        let routine = self.translated.routine.as_ref().ok_or_else(|| {
            DriverError::unsupported("named parameters need a {call ...} escape")
        })?;

        let mut args = Vec::with_capacity(self.named.len());
        let mut values = Vec::with_capacity(self.named.len());
        for param in &self.named {
            let value = match (&param.value, param.out) {
                (Some(value), _) => value.clone(),
                (None, Some(ty)) if !routine.returns => SqlValue::Null(ty),
                (None, Some(_)) => continue,
                (None, None) => {
                    return Err(DriverError::invalid_parameter(format!(
                        "no value specified for parameter {}",
                        param.name
                    )));
                }
            };
            values.push(value);
            args.push(format!("{} => ${}", param.name, values.len()));
        }

        let keyword = if routine.returns { "SELECT" } else { "CALL" };
        let sql = format!("{keyword} {}({})", routine.name, args.join(", "));
        Ok((sql, values))
    }

    async fn statement(&mut self, sql: &str) -> DriverResult<tokio_postgres::Statement> {
        if let Some((cached, stmt)) = &self.prepared {
            if cached == sql {
                return Ok(stmt.clone());
            }
        }
        let stmt = self.shared.client.prepare(sql).await?;
        self.prepared = Some((sql.to_string(), stmt.clone()));
        Ok(stmt)
    }

    /// Pick OUT values from the row a routine returned.
    fn capture_out(&mut self, row: &Row) -> DriverResult<()> {
        let Some(routine) = &self.translated.routine else {
            return Ok(());
        };
        if routine.returns {
            if !row.is_empty() {
                self.out_values.insert(1, decode(row, 0)?);
            }
            return Ok(());
        }

        let indices: Vec<usize> = self.out.keys().copied().collect();
        for (col, index) in indices.into_iter().enumerate() {
            if col < row.len() {
                self.out_values.insert(index, decode(row, col)?);
            }
        }
        for param in self.named.iter().filter(|p| p.out.is_some()) {
            if let Some(col) = row.columns().iter().position(|c| c.name() == param.name) {
                self.named_out_values
                    .insert(param.name.clone(), decode(row, col)?);
            }
        }
        Ok(())
    }

    async fn run_current(&mut self) -> DriverResult<bool> {
        self.check_open()?;
        self.last = None;
        self.out_values.clear();
        self.named_out_values.clear();

        let (sql, values) = self.bind(&self.params)?;
        self.shared.begin_if_needed().await?;
        let stmt = self.statement(&sql).await?;
        let (last, first_row) = run(&self.shared, &stmt, &values).await?;
        if let Some(row) = first_row {
            self.capture_out(&row)?;
        }
        let has_rows = matches!(last, LastResult::Rows(_));
        self.last = Some(last);
        Ok(has_rows)
    }

    fn out_value(&mut self, value: Option<SqlValue>, what: String) -> DriverResult<SqlValue> {
        self.check_open()?;
        let value = value.ok_or_else(|| {
            DriverError::invalid_parameter(format!("{what} has no OUT value"))
        })?;
        self.last_was_null = value.is_null();
        Ok(value)
    }
}

impl PreparedStatement for PgPreparedStatement {
    type ResultSet = PgResultSet;

    fn set_value(&mut self, index: usize, value: SqlValue) -> DriverResult<()> {
        self.check_open()?;
        self.check_index(index)?;
        if let SqlValue::Stream(_) = value {
            return Err(DriverError::unsupported("stream parameters"));
        }
        self.params[index - 1] = Some(value);
        Ok(())
    }

    fn clear_parameters(&mut self) -> DriverResult<()> {
        self.check_open()?;
        self.params.iter_mut().for_each(|p| *p = None);
        self.named.iter_mut().for_each(|p| p.value = None);
        Ok(())
    }

    async fn execute(&mut self) -> DriverResult<bool> {
        self.run_current().await
    }

    async fn execute_query(&mut self) -> DriverResult<PgResultSet> {
        self.run_current().await?;
        match self.last.take() {
            Some(LastResult::Rows(rs)) => Ok(rs),
            _ => Err(no_result_set()),
        }
    }

    async fn execute_update(&mut self) -> DriverResult<u64> {
        self.run_current().await?;
        Ok(match &self.last {
            Some(LastResult::Count(n)) => *n,
            Some(LastResult::Rows(rs)) => rs.len() as u64,
            None => 0,
        })
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        self.check_open()?;
        if !self.named.is_empty() {
            return Err(DriverError::unsupported("batches of named parameters"));
        }
        self.batch.push(self.params.clone());
        Ok(())
    }

    fn clear_batch(&mut self) -> DriverResult<()> {
        self.check_open()?;
        self.batch.clear();
        Ok(())
    }

    async fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        self.check_open()?;
        let entries = std::mem::take(&mut self.batch);
        let mut bound = Vec::with_capacity(entries.len());
        for entry in &entries {
            bound.push(self.bind(entry)?);
        }

        self.shared.begin_if_needed().await?;
        let mut counts = Vec::with_capacity(bound.len());
        for (sql, values) in bound {
            let stmt = self.statement(&sql).await?;
            let params: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            counts.push(self.shared.client.execute(&stmt, &params).await?);
        }
        Ok(counts)
    }

    fn result_set(&mut self) -> DriverResult<Option<PgResultSet>> {
        self.check_open()?;
        match self.last.take() {
            Some(LastResult::Rows(rs)) => Ok(Some(rs)),
            other => {
                self.last = other;
                Ok(None)
            }
        }
    }

    fn update_count(&self) -> DriverResult<Option<u64>> {
        self.check_open()?;
        Ok(match self.last {
            Some(LastResult::Count(n)) => Some(n),
            _ => None,
        })
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.prepared = None;
        self.batch.clear();
        self.last = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl CallableStatement for PgPreparedStatement {
    fn set_named_value(&mut self, name: &str, value: SqlValue) -> DriverResult<()> {
        self.check_open()?;
        if let SqlValue::Stream(_) = value {
            return Err(DriverError::unsupported("stream parameters"));
        }
        self.named_slot(name).value = Some(value);
        Ok(())
    }

    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType) -> DriverResult<()> {
        self.check_open()?;
        self.check_index(index)?;
        self.out.insert(index, sql_type);
        Ok(())
    }

    fn register_named_out_parameter(
        &mut self,
        name: &str,
        sql_type: SqlType,
    ) -> DriverResult<()> {
        self.check_open()?;
        self.named_slot(name).out = Some(sql_type);
        Ok(())
    }

    fn get_value(&mut self, index: usize) -> DriverResult<SqlValue> {
        let value = self.out_values.get(&index).cloned();
        self.out_value(value, format!("parameter {index}"))
    }

    fn get_named_value(&mut self, name: &str) -> DriverResult<SqlValue> {
        let value = self.named_out_values.get(name).cloned();
        self.out_value(value, format!("parameter {name}"))
    }

    fn was_null(&self) -> DriverResult<bool> {
        self.check_open()?;
        Ok(self.last_was_null)
    }
}
