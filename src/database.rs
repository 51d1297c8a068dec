//! Database connection management and core functionality.

pub mod helpers;
pub mod schema;

use crate::errors::AppResult;
use rusqlite::Connection;
use tracing::info;

/// Core database connection wrapper. The parser task holds the only
/// write-capable instance; readers open their own connections.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Open (and if necessary initialise) a ledger database.
    pub fn new(database_path: &str) -> AppResult<Self> {
        let connection = Connection::open(database_path)?;
        Self::setup(connection, database_path)
    }

    /// In-memory ledger, used by tests and mempool previews.
    pub fn in_memory() -> AppResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::setup(connection, ":memory:")
    }

    fn setup(connection: Connection, database_path: &str) -> AppResult<Self> {
        connection.pragma_update(None, "journal_mode", "WAL")?;
        connection.pragma_update(None, "foreign_keys", "ON")?;
        schema::setup_schema(&connection)?;

        info!("Database connection established: {}", database_path);
        Ok(Self { connection })
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Mutable access, needed for transaction and savepoint scopes
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Execute a function within a database transaction
    pub fn execute_transaction<F, R>(&mut self, f: F) -> AppResult<R>
    where
        F: FnOnce(&rusqlite::Transaction) -> AppResult<R>,
    {
        let tx = self.connection.transaction()?;

        let result = f(&tx)?;

        tx.commit()?;

        Ok(result)
    }
}
