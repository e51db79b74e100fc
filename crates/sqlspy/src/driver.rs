//! The driver contract that spy wrappers mirror.
//!
//! A delegate driver implements these traits; [`crate::spy`] implements them
//! again on top of any delegate, so code written against the traits cannot
//! tell a spied connection from a plain one.
//!
//! Typed setters and getters are provided methods that funnel into a single
//! required method per abstraction (`set_value`, `set_named_value`,
//! `get_value`). Implementors only write those.

use crate::error::DriverResult;
use crate::value::{FromSqlValue, SqlType, SqlValue};
use std::future::Future;

/// A database connection.
pub trait Connection: Send {
    type Statement: Statement;
    type Prepared: PreparedStatement;
    type Callable: CallableStatement;

    /// Create a plain statement for one-off SQL.
    fn create_statement(&mut self) -> DriverResult<Self::Statement>;

    /// Create a prepared statement for `sql` with `?` markers.
    fn prepare_statement(&mut self, sql: &str) -> DriverResult<Self::Prepared>;

    /// Create a callable statement, e.g. `{call proc(?, ?)}`.
    fn prepare_call(&mut self, sql: &str) -> DriverResult<Self::Callable>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()>;

    fn auto_commit(&self) -> DriverResult<bool>;

    /// Commit the current transaction.
    fn commit(&mut self) -> impl Future<Output = DriverResult<()>> + Send;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> impl Future<Output = DriverResult<()>> + Send;

    fn close(&mut self) -> DriverResult<()>;

    fn is_closed(&self) -> bool;
}

/// A plain statement executing caller-supplied SQL text.
pub trait Statement: Send {
    type ResultSet: ResultSet;

    /// Execute any SQL. Returns `true` if the first result is a result set.
    fn execute(&mut self, sql: &str) -> impl Future<Output = DriverResult<bool>> + Send;

    /// Execute a query and return its result set.
    fn execute_query(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = DriverResult<Self::ResultSet>> + Send;

    /// Execute a mutation and return the number of affected rows.
    fn execute_update(&mut self, sql: &str) -> impl Future<Output = DriverResult<u64>> + Send;

    /// Queue `sql` for the next [`Statement::execute_batch`].
    fn add_batch(&mut self, sql: &str) -> DriverResult<()>;

    fn clear_batch(&mut self) -> DriverResult<()>;

    /// Execute all queued SQL. Returns one update count per entry.
    fn execute_batch(&mut self) -> impl Future<Output = DriverResult<Vec<u64>>> + Send;

    /// Result set produced by the last `execute`, if any.
    fn result_set(&mut self) -> DriverResult<Option<Self::ResultSet>>;

    /// Update count of the last `execute`, if it produced one.
    fn update_count(&self) -> DriverResult<Option<u64>>;

    fn close(&mut self) -> DriverResult<()>;

    fn is_closed(&self) -> bool;
}

/// A statement with a fixed SQL template and positional parameters.
pub trait PreparedStatement: Send {
    type ResultSet: ResultSet;

    /// Bind `value` to the 1-based parameter `index`.
    fn set_value(&mut self, index: usize, value: SqlValue) -> DriverResult<()>;

    fn set_null(&mut self, index: usize, sql_type: SqlType) -> DriverResult<()> {
        self.set_value(index, SqlValue::Null(sql_type))
    }

    fn set_bool(&mut self, index: usize, value: bool) -> DriverResult<()> {
        self.set_value(index, SqlValue::Bool(value))
    }

    fn set_i32(&mut self, index: usize, value: i32) -> DriverResult<()> {
        self.set_value(index, SqlValue::Int(value))
    }

    fn set_i64(&mut self, index: usize, value: i64) -> DriverResult<()> {
        self.set_value(index, SqlValue::BigInt(value))
    }

    fn set_f64(&mut self, index: usize, value: f64) -> DriverResult<()> {
        self.set_value(index, SqlValue::Double(value))
    }

    fn set_string(&mut self, index: usize, value: &str) -> DriverResult<()> {
        self.set_value(index, SqlValue::Text(value.to_string()))
    }

    fn set_bytes(&mut self, index: usize, value: &[u8]) -> DriverResult<()> {
        self.set_value(index, SqlValue::Bytes(value.to_vec()))
    }

    /// Unbind every parameter.
    fn clear_parameters(&mut self) -> DriverResult<()>;

    fn execute(&mut self) -> impl Future<Output = DriverResult<bool>> + Send;

    fn execute_query(&mut self) -> impl Future<Output = DriverResult<Self::ResultSet>> + Send;

    fn execute_update(&mut self) -> impl Future<Output = DriverResult<u64>> + Send;

    /// Queue the current parameter set for the next batch.
    fn add_batch(&mut self) -> DriverResult<()>;

    fn clear_batch(&mut self) -> DriverResult<()>;

    fn execute_batch(&mut self) -> impl Future<Output = DriverResult<Vec<u64>>> + Send;

    fn result_set(&mut self) -> DriverResult<Option<Self::ResultSet>>;

    fn update_count(&self) -> DriverResult<Option<u64>>;

    fn close(&mut self) -> DriverResult<()>;

    fn is_closed(&self) -> bool;
}

/// A prepared statement invoking a stored procedure.
pub trait CallableStatement: PreparedStatement {
    /// Bind `value` to the procedure parameter called `name`.
    fn set_named_value(&mut self, name: &str, value: SqlValue) -> DriverResult<()>;

    fn set_named_null(&mut self, name: &str, sql_type: SqlType) -> DriverResult<()> {
        self.set_named_value(name, SqlValue::Null(sql_type))
    }

    fn set_named_i32(&mut self, name: &str, value: i32) -> DriverResult<()> {
        self.set_named_value(name, SqlValue::Int(value))
    }

    fn set_named_string(&mut self, name: &str, value: &str) -> DriverResult<()> {
        self.set_named_value(name, SqlValue::Text(value.to_string()))
    }

    /// Declare parameter `index` as OUT (or INOUT if also bound).
    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType) -> DriverResult<()>;

    fn register_named_out_parameter(&mut self, name: &str, sql_type: SqlType)
    -> DriverResult<()>;

    /// Value of OUT parameter `index` after execution.
    fn get_value(&mut self, index: usize) -> DriverResult<SqlValue>;

    fn get_named_value(&mut self, name: &str) -> DriverResult<SqlValue>;

    fn get<T: FromSqlValue>(&mut self, index: usize) -> DriverResult<T> {
        T::from_sql_value(self.get_value(index)?)
    }

    fn get_named<T: FromSqlValue>(&mut self, name: &str) -> DriverResult<T> {
        T::from_sql_value(self.get_named_value(name)?)
    }

    /// Whether the last OUT value read was NULL.
    fn was_null(&self) -> DriverResult<bool>;
}

/// A forward-only cursor over query results.
pub trait ResultSet: Send {
    /// Advance to the next row. Returns `false` past the last row.
    fn next(&mut self) -> DriverResult<bool>;

    /// Value of 1-based `column` in the current row.
    fn get_value(&mut self, column: usize) -> DriverResult<SqlValue>;

    fn get_value_by_label(&mut self, label: &str) -> DriverResult<SqlValue>;

    fn get<T: FromSqlValue>(&mut self, column: usize) -> DriverResult<T> {
        T::from_sql_value(self.get_value(column)?)
    }

    fn get_by_label<T: FromSqlValue>(&mut self, label: &str) -> DriverResult<T> {
        T::from_sql_value(self.get_value_by_label(label)?)
    }

    fn column_count(&self) -> DriverResult<usize>;

    /// Label of 1-based `column`.
    fn column_label(&self, column: usize) -> DriverResult<String>;

    fn was_null(&self) -> DriverResult<bool>;

    fn close(&mut self) -> DriverResult<()>;

    fn is_closed(&self) -> bool;
}
