// Errors that are not compile diagnostics: reading payloads back, CLI I/O.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Cap'n Proto error: {0}")]
    Capnp(#[from] capnp::Error),

    #[error("unknown enum or union value: {0}")]
    NotInSchema(#[from] capnp::NotInSchema),

    #[error("invalid UTF-8 in message text: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid base64url payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid compiler version '{0}', expected MAJOR.MINOR.MICRO")]
    InvalidVersion(String),

    #[error("malformed bridge output: {0}")]
    MalformedOutput(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
