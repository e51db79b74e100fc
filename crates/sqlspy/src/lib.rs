//! # sqlspy
//!
//! A transparent statement spy for database drivers.
//!
//! Wrap a connection in [`SpyConnection`] and use it exactly as before. Every
//! statement, prepared statement, callable statement and result set obtained
//! from it forwards to the real driver while recording:
//!
//! - the values bound to each parameter (last write wins),
//! - the SQL with those values substituted as literals,
//! - how long each call took and whether it failed.
//!
//! Each observed call becomes one [`ExecutionEvent`] handed to a
//! [`Dispatcher`], which filters it against the current [`SpyConfig`] and
//! delivers it to an [`EventSink`]. Nothing in the observability path can fail
//! a statement: delegate results and errors reach the caller unchanged.
//!
//! ## Example
//!
//! ```ignore
//! use sqlspy::prelude::*;
//! use sqlspy::sink::TracingSink;
//!
//! let dispatcher = Arc::new(Dispatcher::inline(TracingSink::new()));
//! let mut conn = SpyConnection::new(PgConnection::new(client), dispatcher);
//!
//! let mut stmt = conn.prepare_statement("SELECT * FROM users WHERE id = ? AND status = ?")?;
//! stmt.set_i64(1, 42)?;
//! stmt.set_string(2, "active")?;
//! let mut rows = stmt.execute_query().await?;
//! // sql executed ... sql=SELECT * FROM users WHERE id = 42 AND status = 'active'
//! ```
//!
//! ## Rendering rules
//!
//! Strings are single-quoted with embedded quotes doubled, NULL is bare,
//! numbers are unquoted, dates use the configured strftime formats, binary
//! values and streams are replaced by a placeholder. Templates using named
//! parameters are logged verbatim with the bound values listed after them.

pub mod bind;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod event;
pub mod render;
pub mod sink;
pub mod spy;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

pub use bind::{Binding, BindingSnapshot, Bindings, ParamId};
pub use config::{ConfigHandle, LogFormat, SpyConfig};
pub use dispatch::{DEFAULT_QUEUE_CAPACITY, DispatchStats, Dispatcher};
pub use driver::{CallableStatement, Connection, PreparedStatement, ResultSet, Statement};
pub use error::{ConfigError, DriverError, DriverResult, SinkError};
pub use event::{Category, ExecutionEvent, Outcome, StatementKind};
pub use render::{BinaryFormat, BooleanFormat, RenderOptions, Rendered, Resolution, render};
pub use sink::{
    CompositeSink, EventSink, FileSink, LoggingSink, MemorySink, NoopSink, SpyStats, StatsSink,
    TracingSink,
};
pub use spy::{SpyConnection, SpyPreparedStatement, SpyResultSet, SpyStatement};
pub use value::{FromSqlValue, SqlType, SqlValue, StreamKind, StreamRef};

#[cfg(feature = "postgres")]
pub use pg::PgConnection;

/// Everything needed to wrap a connection and use the driver traits.
pub mod prelude {
    pub use crate::driver::{CallableStatement, Connection, PreparedStatement, ResultSet, Statement};
    pub use crate::{
        Dispatcher, DriverError, DriverResult, SpyConfig, SpyConnection, SqlType, SqlValue,
    };
    pub use std::sync::Arc;

    #[cfg(feature = "postgres")]
    pub use crate::PgConnection;
}

/// Truncate `s` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::truncate_bytes;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_bytes("SELECT 1", 20), "SELECT 1");
        assert_eq!(truncate_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(truncate_bytes("café", 4), "caf");
    }
}
