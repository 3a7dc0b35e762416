//! Error types

use std::path::PathBuf;

use thiserror::Error;

/// Failures reading the item catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid item JSON in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog database error")]
    Database(#[from] rusqlite::Error),
}

/// Failures of the persistent key-value store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error")]
    Backend(#[from] rusqlite::Error),
}

/// Errors surfaced by recipe engine commands
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("catalog unavailable")]
    CatalogUnavailable(#[source] CatalogError),

    #[error("unknown recipe: {0}")]
    UnknownRecipe(String),

    #[error("hot item slot must be 1 or 2, got {0}")]
    InvalidHotSlot(u8),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
