use super::types::decode;
use crate::driver::ResultSet;
use crate::error::{DriverError, DriverResult};
use crate::value::SqlValue;
use tokio_postgres::Row;

/// Rows of one query, fully buffered.
pub struct PgResultSet {
    labels: Vec<String>,
    rows: Vec<Row>,
    // Index of the current row; `None` before the first `next`.
    cursor: Option<usize>,
    last_was_null: bool,
    closed: bool,
}

impl PgResultSet {
    pub(crate) fn new(labels: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            labels,
            rows,
            cursor: None,
            last_was_null: false,
            closed: false,
        }
    }

    /// Number of buffered rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("result set"));
        }
        Ok(())
    }

    fn current(&self) -> DriverResult<&Row> {
        self.check_open()?;
        self.cursor
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| DriverError::Other("result set is not positioned on a row".to_string()))
    }

    fn read(&mut self, idx: usize) -> DriverResult<SqlValue> {
        let value = decode(self.current()?, idx)?;
        self.last_was_null = value.is_null();
        Ok(value)
    }
}

impl ResultSet for PgResultSet {
    fn next(&mut self) -> DriverResult<bool> {
        self.check_open()?;
        let next = self.cursor.map_or(0, |i| i + 1);
        // Past the end the cursor stays one beyond the last row.
        self.cursor = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn get_value(&mut self, column: usize) -> DriverResult<SqlValue> {
        if column == 0 || column > self.labels.len() {
            return Err(DriverError::invalid_parameter(format!(
                "column index {column} out of range (1..={})",
                self.labels.len()
            )));
        }
        self.read(column - 1)
    }

    fn get_value_by_label(&mut self, label: &str) -> DriverResult<SqlValue> {
        let idx = self
            .labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label))
            .ok_or_else(|| DriverError::invalid_parameter(format!("no column labelled {label}")))?;
        self.read(idx)
    }

    fn column_count(&self) -> DriverResult<usize> {
        self.check_open()?;
        Ok(self.labels.len())
    }

    fn column_label(&self, column: usize) -> DriverResult<String> {
        self.check_open()?;
        column
            .checked_sub(1)
            .and_then(|i| self.labels.get(i))
            .cloned()
            .ok_or_else(|| DriverError::invalid_parameter(format!("column index {column} out of range")))
    }

    fn was_null(&self) -> DriverResult<bool> {
        self.check_open()?;
        Ok(self.last_was_null)
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
