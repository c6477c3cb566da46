use crate::Locator;
use thiserror::Error;

/// Errors raised while computing or parsing node addresses
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AddressError {
    #[error("Malformed address: {0}")]
    Malformed(String),

    #[error("Locator {0} does not reach a node")]
    Detached(Locator),

    #[error("Element <{name}> has no address in this schema")]
    UnknownElement { name: String },

    #[error("Root element <{found}> does not match schema root <{expected}>")]
    RootMismatch { expected: String, found: String },

    #[error("Invalid schema: {0}")]
    Schema(String),
}

impl From<serde_json::Error> for AddressError {
    fn from(e: serde_json::Error) -> Self {
        AddressError::Schema(e.to_string())
    }
}

/// Result alias for address computations
pub type DomResult<T> = Result<T, AddressError>;
