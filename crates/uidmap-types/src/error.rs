use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("identifier {0} is outside the legal range [1024, 65534]")]
    IdOutOfRange(i64),

    #[error("key must not be empty")]
    EmptyKey,
}
