use thiserror::Error;

/// Failure taxonomy shared across the workspace.
///
/// `Authorization` is deliberately opaque about which leg of a guard
/// predicate failed, so callers cannot probe rosters they are not on.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input. Never reaches the store.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A protected mutation or read matched zero rows.
    #[error("not authorized")]
    Authorization,

    /// The referenced entity is absent or inactive.
    #[error("{0} not found or inactive")]
    NotFound(&'static str),

    /// Duplicate name or duplicate active membership.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Client-side wrap/unwrap/derive failure. Isolated per message.
    #[error("crypto failure: {0}")]
    Crypto(String),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
