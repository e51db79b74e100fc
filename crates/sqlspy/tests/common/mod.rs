//! A scripted in-memory driver for exercising the spy layer.
#![allow(dead_code)]

use sqlspy::render::parameter_count;
use sqlspy::sink::MemorySink;
use sqlspy::{
    CallableStatement, Connection, DriverError, DriverResult, ExecutionEvent, PreparedStatement,
    ResultSet, SqlType, SqlValue, Statement,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// One call that reached the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub params: Vec<Option<SqlValue>>,
}

#[derive(Default)]
struct DbState {
    executed: Vec<Executed>,
    failures: Vec<(String, String, String)>,
    labels: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    out_value: Option<SqlValue>,
    commits: usize,
    rollbacks: usize,
    fail_close: bool,
}

/// Shared script and call log.
#[derive(Clone, Default)]
pub struct MockDb {
    state: Arc<Mutex<DbState>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executions whose SQL contains `pattern` fail with a database error.
    pub fn fail_when(&self, pattern: &str, code: &str, message: &str) -> &Self {
        self.state.lock().unwrap().failures.push((
            pattern.to_string(),
            code.to_string(),
            message.to_string(),
        ));
        self
    }

    /// Rows returned by every query.
    pub fn with_rows(&self, labels: &[&str], rows: Vec<Vec<SqlValue>>) -> &Self {
        let mut state = self.state.lock().unwrap();
        state.labels = labels.iter().map(|l| l.to_string()).collect();
        state.rows = rows;
        self
    }

    /// Statement `close` calls fail and leave the statement open.
    pub fn fail_close(&self) -> &Self {
        self.state.lock().unwrap().fail_close = true;
        self
    }

    fn close_statement(&self) -> DriverResult<()> {
        if self.state.lock().unwrap().fail_close {
            return Err(DriverError::database("57014", "close refused"));
        }
        Ok(())
    }

    /// Value reported for every registered OUT parameter.
    pub fn with_out_value(&self, value: SqlValue) -> &Self {
        self.state.lock().unwrap().out_value = Some(value);
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    pub fn connect(&self) -> MockConnection {
        MockConnection {
            db: self.clone(),
            auto_commit: true,
            closed: false,
        }
    }

    fn run(&self, sql: &str, params: Vec<Option<SqlValue>>) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some((_, code, message)) = state.failures.iter().find(|(p, _, _)| sql.contains(p)) {
            return Err(DriverError::database(code.clone(), message.clone()));
        }
        state.executed.push(Executed {
            sql: sql.to_string(),
            params,
        });
        Ok(())
    }

    fn result_set(&self) -> MockResultSet {
        let state = self.state.lock().unwrap();
        MockResultSet {
            labels: state.labels.clone(),
            rows: state.rows.clone(),
            cursor: None,
            was_null: false,
            closed: false,
        }
    }

    fn out_value(&self) -> SqlValue {
        self.state
            .lock()
            .unwrap()
            .out_value
            .clone()
            .unwrap_or(SqlValue::Int(42))
    }
}

pub struct MockConnection {
    db: MockDb,
    auto_commit: bool,
    closed: bool,
}

impl MockConnection {
    fn check_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("connection"));
        }
        Ok(())
    }
}

impl Connection for MockConnection {
    type Statement = MockStatement;
    type Prepared = MockPrepared;
    type Callable = MockPrepared;

    fn create_statement(&mut self) -> DriverResult<MockStatement> {
        self.check_open()?;
        Ok(MockStatement {
            db: self.db.clone(),
            batch: Vec::new(),
            last_query: false,
            closed: false,
        })
    }

    fn prepare_statement(&mut self, sql: &str) -> DriverResult<MockPrepared> {
        self.check_open()?;
        Ok(MockPrepared::new(self.db.clone(), sql))
    }

    fn prepare_call(&mut self, sql: &str) -> DriverResult<MockPrepared> {
        self.check_open()?;
        Ok(MockPrepared::new(self.db.clone(), sql))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        self.check_open()?;
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> DriverResult<bool> {
        self.check_open()?;
        Ok(self.auto_commit)
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.check_open()?;
        if self.auto_commit {
            return Err(DriverError::unsupported("commit with auto-commit on"));
        }
        self.db.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.check_open()?;
        if self.auto_commit {
            return Err(DriverError::unsupported("rollback with auto-commit on"));
        }
        self.db.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub struct MockStatement {
    db: MockDb,
    batch: Vec<String>,
    last_query: bool,
    closed: bool,
}

impl MockStatement {
    fn check_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("statement"));
        }
        Ok(())
    }

    fn run(&mut self, sql: &str) -> DriverResult<bool> {
        self.check_open()?;
        self.db.run(sql, Vec::new())?;
        self.last_query = sql.trim_start().to_ascii_uppercase().starts_with("SELECT");
        Ok(self.last_query)
    }
}

impl Statement for MockStatement {
    type ResultSet = MockResultSet;

    async fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        self.run(sql)
    }

    async fn execute_query(&mut self, sql: &str) -> DriverResult<MockResultSet> {
        self.run(sql)?;
        Ok(self.db.result_set())
    }

    async fn execute_update(&mut self, sql: &str) -> DriverResult<u64> {
        self.run(sql)?;
        Ok(1)
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
        let batch = std::mem::take(&mut self.batch);
        for sql in &batch {
            self.db.run(sql, Vec::new())?;
        }
        Ok(vec![1; batch.len()])
    }

    fn result_set(&mut self) -> DriverResult<Option<MockResultSet>> {
        self.check_open()?;
        Ok(self.last_query.then(|| self.db.result_set()))
    }

    fn update_count(&self) -> DriverResult<Option<u64>> {
        self.check_open()?;
        Ok((!self.last_query).then_some(1))
    }

    fn close(&mut self) -> DriverResult<()> {
        self.db.close_statement()?;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub struct MockPrepared {
    db: MockDb,
    sql: String,
    count: usize,
    params: BTreeMap<usize, SqlValue>,
    named: BTreeMap<String, SqlValue>,
    outs: BTreeMap<usize, SqlType>,
    named_outs: BTreeMap<String, SqlType>,
    batch: Vec<Vec<Option<SqlValue>>>,
    executed: bool,
    was_null: bool,
    closed: bool,
}

impl MockPrepared {
    fn new(db: MockDb, sql: &str) -> Self {
        Self {
            db,
            sql: sql.to_string(),
            count: parameter_count(sql),
            params: BTreeMap::new(),
            named: BTreeMap::new(),
            outs: BTreeMap::new(),
            named_outs: BTreeMap::new(),
            batch: Vec::new(),
            executed: false,
            was_null: false,
            closed: false,
        }
    }

    fn check_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("statement"));
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> DriverResult<()> {
        if index == 0 || index > self.count {
            return Err(DriverError::invalid_parameter(format!(
                "parameter index {index} out of range (1..={})",
                self.count
            )));
        }
        Ok(())
    }

    fn current(&self) -> Vec<Option<SqlValue>> {
        (1..=self.count).map(|i| self.params.get(&i).cloned()).collect()
    }

    fn run(&mut self) -> DriverResult<()> {
        self.check_open()?;
        self.db.run(&self.sql, self.current())?;
        self.executed = true;
        Ok(())
    }

    fn out(&mut self, registered: bool) -> DriverResult<SqlValue> {
        self.check_open()?;
        if !registered || !self.executed {
            return Err(DriverError::invalid_parameter("no OUT value"));
        }
        let value = self.db.out_value();
        self.was_null = value.is_null();
        Ok(value)
    }
}

impl PreparedStatement for MockPrepared {
    type ResultSet = MockResultSet;

    fn set_value(&mut self, index: usize, value: SqlValue) -> DriverResult<()> {
        self.check_open()?;
        self.check_index(index)?;
        self.params.insert(index, value);
        Ok(())
    }

    fn clear_parameters(&mut self) -> DriverResult<()> {
        self.check_open()?;
        self.params.clear();
        self.named.clear();
        Ok(())
    }

    async fn execute(&mut self) -> DriverResult<bool> {
        self.run()?;
        Ok(false)
    }

    async fn execute_query(&mut self) -> DriverResult<MockResultSet> {
        self.run()?;
        Ok(self.db.result_set())
    }

    async fn execute_update(&mut self) -> DriverResult<u64> {
        self.run()?;
        Ok(1)
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        self.check_open()?;
        let entry = self.current();
        self.batch.push(entry);
        Ok(())
    }

    fn clear_batch(&mut self) -> DriverResult<()> {
        self.check_open()?;
        self.batch.clear();
        Ok(())
    }

    async fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        self.check_open()?;
        let batch = std::mem::take(&mut self.batch);
        for entry in &batch {
            self.db.run(&self.sql, entry.clone())?;
        }
        Ok(vec![1; batch.len()])
    }

    fn result_set(&mut self) -> DriverResult<Option<MockResultSet>> {
        self.check_open()?;
        Ok(None)
    }

    fn update_count(&self) -> DriverResult<Option<u64>> {
        self.check_open()?;
        Ok(self.executed.then_some(1))
    }

    fn close(&mut self) -> DriverResult<()> {
        self.db.close_statement()?;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl CallableStatement for MockPrepared {
    fn set_named_value(&mut self, name: &str, value: SqlValue) -> DriverResult<()> {
        self.check_open()?;
        self.named.insert(name.to_string(), value);
        Ok(())
    }

    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType) -> DriverResult<()> {
        self.check_open()?;
        self.check_index(index)?;
        self.outs.insert(index, sql_type);
        Ok(())
    }

    fn register_named_out_parameter(
        &mut self,
        name: &str,
        sql_type: SqlType,
    ) -> DriverResult<()> {
        self.check_open()?;
        self.named_outs.insert(name.to_string(), sql_type);
        Ok(())
    }

    fn get_value(&mut self, index: usize) -> DriverResult<SqlValue> {
        let registered = self.outs.contains_key(&index);
        self.out(registered)
    }

    fn get_named_value(&mut self, name: &str) -> DriverResult<SqlValue> {
        let registered = self.named_outs.contains_key(name);
        self.out(registered)
    }

    fn was_null(&self) -> DriverResult<bool> {
        self.check_open()?;
        Ok(self.was_null)
    }
}

pub struct MockResultSet {
    labels: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    cursor: Option<usize>,
    was_null: bool,
    closed: bool,
}

impl MockResultSet {
    fn cell(&mut self, idx: usize) -> DriverResult<SqlValue> {
        if self.closed {
            return Err(DriverError::Closed("result set"));
        }
        let row = self
            .cursor
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| DriverError::Other("no current row".to_string()))?;
        let value = row
            .get(idx)
            .cloned()
            .ok_or_else(|| DriverError::invalid_parameter("column out of range"))?;
        self.was_null = value.is_null();
        Ok(value)
    }
}

impl ResultSet for MockResultSet {
    fn next(&mut self) -> DriverResult<bool> {
        if self.closed {
            return Err(DriverError::Closed("result set"));
        }
        let next = self.cursor.map_or(0, |i| i + 1);
        self.cursor = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn get_value(&mut self, column: usize) -> DriverResult<SqlValue> {
        if column == 0 {
            return Err(DriverError::invalid_parameter("column out of range"));
        }
        self.cell(column - 1)
    }

    fn get_value_by_label(&mut self, label: &str) -> DriverResult<SqlValue> {
        let idx = self
            .labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| DriverError::invalid_parameter(format!("no column {label}")))?;
        self.cell(idx)
    }

    fn column_count(&self) -> DriverResult<usize> {
        Ok(self.labels.len())
    }

    fn column_label(&self, column: usize) -> DriverResult<String> {
        column
            .checked_sub(1)
            .and_then(|i| self.labels.get(i))
            .cloned()
            .ok_or_else(|| DriverError::invalid_parameter("column out of range"))
    }

    fn was_null(&self) -> DriverResult<bool> {
        Ok(self.was_null)
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ── Spy setup ──

/// A spied mock connection publishing inline to a memory sink.
pub fn spied(
    db: &MockDb,
    config: sqlspy::SpyConfig,
) -> (sqlspy::SpyConnection<MockConnection>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let dispatcher = sqlspy::Dispatcher::inline_arc(sink.clone()).with_config(config);
    (
        sqlspy::SpyConnection::new(db.connect(), Arc::new(dispatcher)),
        sink,
    )
}

/// Events of one category.
pub fn events_of(sink: &MemorySink, category: sqlspy::Category) -> Vec<ExecutionEvent> {
    sink.events()
        .into_iter()
        .filter(|e| e.category == category)
        .collect()
}
