//! Error types shared by the ORM and the role inheritance layer.

use thiserror::Error;

/// Errors raised by Cobalto records.
#[derive(Debug, Error)]
pub enum Error {
    /// The model is misconfigured (missing role relation name, unknown relation, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No model in the forwarding chain declares the method.
    #[error("call to undefined method `{method}` on `{table}`")]
    UnknownMethod { table: &'static str, method: String },

    /// A write needed a key value that is not set yet.
    #[error("missing key `{key}` on `{table}`")]
    MissingKey { table: &'static str, key: String },

    /// Table or column name rejected before being interpolated into SQL.
    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
