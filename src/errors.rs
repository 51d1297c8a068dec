use thiserror::Error;

/// Application-wide error type - single point of truth
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operations
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration issues
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation/parsing
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Ledger bookkeeping failures (propagated only for infrastructure
    /// errors; balance errors are demoted to validation reasons)
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Transaction composition rejected by validation
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
}

/// Errors raised by the balance engine and asset name handling.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A debit would push a balance below zero
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Credits and debits of negative quantities are never valid
    #[error("negative quantity")]
    NegativeQuantity,

    /// A balance would exceed the largest storable quantity
    #[error("integer overflow")]
    IntegerOverflow,

    /// Asset name outside the alphabetic/numeric namespaces
    #[error("invalid asset name: {0}")]
    AssetName(String),

    /// Asset ID outside the alphabetic/numeric namespaces
    #[error("invalid asset id: {0}")]
    AssetId(u64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<AppError> for LedgerError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Database(e) => LedgerError::Database(e),
            AppError::Ledger(e) => e,
            other => LedgerError::Internal(other.to_string()),
        }
    }
}

/// Raised only on the compose (transaction authoring) path. The replay
/// path never surfaces this: validation problems there become invalid
/// status tags on the recorded transaction.
#[derive(Error, Debug)]
#[error("invalid transaction: {}", .reasons.join("; "))]
pub struct ComposeError {
    pub reasons: Vec<String>,
}

impl ComposeError {
    pub fn new(reasons: Vec<String>) -> Self {
        Self { reasons }
    }

    pub fn single(reason: &str) -> Self {
        Self {
            reasons: vec![reason.to_string()],
        }
    }
}

/// Options-string parsing failures; the messages double as validation
/// reason strings, so their exact wording is part of the ledger contract.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OptionsError {
    #[error("options not an integer")]
    NotAnInteger,

    #[error("options integer overflow")]
    IntegerOverflow,

    #[error("options out of range")]
    OutOfRange,

    #[error("options not possible")]
    NotPossible,
}

/// Application-wide result type - single point of truth
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidData(format!("JSON error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
