use std::io;
use std::path::PathBuf;

/// Failures reading or writing the catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read catalog {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed catalog {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to write catalog {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures talking to the remote price source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("price source unreachable: {0}")]
    Unreachable(String),

    #[error("price source returned HTTP {0}")]
    Status(u16),

    #[error("price source returned an unreadable body: {0}")]
    InvalidBody(String),
}

/// Outcome of a sync run that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The fetch failed; the catalog was left exactly as loaded.
    #[error("sync aborted: {0}")]
    Aborted(#[from] FetchError),
}

/// Validation failures on the manual entry path.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IngredientError {
    #[error("ingredient name must not be empty")]
    EmptyName,

    #[error("package price must be a non-negative number (got {0})")]
    InvalidPrice(f64),

    #[error("package size must be greater than 0 (got '{0}')")]
    InvalidSize(String),

    #[error("external ingredients need an external id")]
    MissingExternalId,

    #[error("ingredient '{0}' not found")]
    NotFound(String),
}
