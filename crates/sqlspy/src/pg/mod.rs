//! Reference delegate: the driver traits over `tokio-postgres`.
//!
//! ```ignore
//! let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
//! tokio::spawn(async move {
//!     if let Err(e) = connection.await {
//!         eprintln!("connection error: {e}");
//!     }
//! });
//!
//! let mut conn = PgConnection::new(client);
//! let mut stmt = conn.prepare_call("{call add_user(?, ?)}")?;
//! ```
//!
//! Markers are rewritten for the server (`?` to `$n`, call escapes to
//! `CALL`/`SELECT`); statements are prepared on first execution and bound
//! values are converted to each parameter's inferred type. With auto-commit
//! off, a transaction is opened lazily before the first statement and ended
//! by `commit`/`rollback`.

mod numeric;
mod result_set;
mod statement;
mod translate;
mod types;

pub use result_set::PgResultSet;
pub use statement::{PgPreparedStatement, PgStatement};

use crate::driver::Connection;
use crate::error::{DriverError, DriverResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::Client;

/// Connection state shared with the statements it created.
pub(crate) struct Shared {
    pub(crate) client: Arc<Client>,
    auto_commit: AtomicBool,
    in_transaction: AtomicBool,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn check_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::Acquire) || self.client.is_closed() {
            return Err(DriverError::Closed("connection"));
        }
        Ok(())
    }

    /// Open a transaction if auto-commit is off and none is active.
    pub(crate) async fn begin_if_needed(&self) -> DriverResult<()> {
        if self.auto_commit.load(Ordering::Acquire)
            || self.in_transaction.swap(true, Ordering::AcqRel)
        {
            return Ok(());
        }
        if let Err(e) = self.client.batch_execute("BEGIN").await {
            self.in_transaction.store(false, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }

    async fn end_transaction(&self, sql: &str) -> DriverResult<()> {
        self.check_open()?;
        if self.auto_commit.load(Ordering::Acquire) {
            return Err(DriverError::unsupported(format!(
                "cannot {} when auto-commit is enabled",
                sql.to_ascii_lowercase()
            )));
        }
        if !self.in_transaction.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.client.batch_execute(sql).await?;
        Ok(())
    }
}

/// A postgres connection implementing [`Connection`].
pub struct PgConnection {
    shared: Arc<Shared>,
}

impl PgConnection {
    /// Wrap a connected client. Auto-commit starts enabled.
    pub fn new(client: Client) -> Self {
        Self::from_arc(Arc::new(client))
    }

    /// Wrap a shared client.
    pub fn from_arc(client: Arc<Client>) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                auto_commit: AtomicBool::new(true),
                in_transaction: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.shared.client
    }

    /// Whether a transaction opened by this connection is active.
    pub fn in_transaction(&self) -> bool {
        self.shared.in_transaction.load(Ordering::Acquire)
    }
}

impl Connection for PgConnection {
    type Statement = PgStatement;
    type Prepared = PgPreparedStatement;
    type Callable = PgPreparedStatement;

    fn create_statement(&mut self) -> DriverResult<Self::Statement> {
        self.shared.check_open()?;
        Ok(PgStatement::new(Arc::clone(&self.shared)))
    }

    fn prepare_statement(&mut self, sql: &str) -> DriverResult<Self::Prepared> {
        self.shared.check_open()?;
        Ok(PgPreparedStatement::new(Arc::clone(&self.shared), sql))
    }

    fn prepare_call(&mut self, sql: &str) -> DriverResult<Self::Callable> {
        self.shared.check_open()?;
        Ok(PgPreparedStatement::new(Arc::clone(&self.shared), sql))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        self.shared.check_open()?;
        if auto_commit && self.shared.in_transaction.load(Ordering::Acquire) {
            return Err(DriverError::unsupported(
                "commit or roll back before enabling auto-commit",
            ));
        }
        self.shared.auto_commit.store(auto_commit, Ordering::Release);
        Ok(())
    }

    fn auto_commit(&self) -> DriverResult<bool> {
        self.shared.check_open()?;
        Ok(self.shared.auto_commit.load(Ordering::Acquire))
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.shared.end_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.shared.end_transaction("ROLLBACK").await
    }

    fn close(&mut self) -> DriverResult<()> {
        self.shared.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire) || self.shared.client.is_closed()
    }
}
