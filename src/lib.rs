//! Bugtrack - a bug tracking library for the `bt` CLI and web dashboard.
//!
//! Bugs live in a MongoDB collection. Every shell asks the
//! [`connection::ConnectionSupervisor`] for the current mode before touching
//! the store; when the store is unreachable the shells degrade to a
//! read-only demo backed by [`models::sample`].

pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod export;
pub mod git;
pub mod gui;
pub mod models;
pub mod storage;


/// Library-level error type for bugtrack operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("BSON error: {0}")]
    Bson(#[from] bson::ser::Error),

    /// The store could not be reached within the probe budget.
    #[error("Could not connect to the bug database at {uri} ({reason})")]
    StoreUnreachable { uri: String, reason: String },

    /// A live handle was requested while the supervisor is not `Live`.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// A write was requested while running against demo data.
    #[error("Demo mode is read-only: connect a database to make changes")]
    ReadOnly,

    #[error("No bug found with ID {0}")]
    NotFound(String),

    #[error("Invalid bug ID: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for bugtrack operations.
pub type Result<T> = std::result::Result<T, Error>;
