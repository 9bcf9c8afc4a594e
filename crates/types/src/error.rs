//! Errors for shared types.

use thiserror::Error;

/// Return an error if the condition is false.
#[macro_export(local_inner_macros)]
macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            return Err($e);
        }
    };
}

/// Result alias for [TypesError].
pub type TypesResult<T> = Result<T, TypesError>;

#[derive(Debug, Error)]
pub enum TypesError {
    /// The identifier was not the expected length.
    #[error("invalid identifier length: expected {expected} bytes, got {actual}")]
    InvalidIdentifierLength { expected: usize, actual: usize },
    /// The identifier was not valid hex.
    #[error("invalid identifier hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// A node version string could not be parsed.
    #[error("invalid node version {0}: {1}")]
    InvalidVersion(String, String),
    /// The remote node version is not compatible with the local one.
    #[error("incompatible node version: local {local}, remote {remote}")]
    IncompatibleVersion { local: String, remote: String },
    /// bcs failure.
    #[error("codec error: {0}")]
    Codec(#[from] bcs::Error),
}
