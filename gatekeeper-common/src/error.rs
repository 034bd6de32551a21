//! Common error types shared across the gatekeeper crates.

use thiserror::Error;

/// Common result type for gatekeeper operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Internal error taxonomy. HTTP-facing error mapping lives in
/// `gatekeeper::api::error` instead, since that conversion is specific to
/// the control-plane transport and not every caller of this type is HTTP.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}
