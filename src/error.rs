use thiserror::Error;

use crate::model::{CatalogId, Language};

/// The id path and name path reported for a leaf cannot be zipped into a row.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedPathError {
    #[error("category path is empty")]
    Empty,
    #[error("category path length mismatch: {ids} ids vs {names} names")]
    LengthMismatch { ids: usize, names: usize },
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or timeout before a response was read.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("non-success status {0}")]
    Status(u16),
    /// Body is not JSON or is missing an expected key.
    #[error("malformed payload: {0}")]
    Decode(String),
}

impl FetchError {
    /// Transport and decode failures abort a property attempt; a bad status only skips one category.
    pub fn aborts_attempt(&self) -> bool {
        !matches!(self, FetchError::Status(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("malformed path for leaf {leaf} in language {language}: {source}")]
    MalformedPath {
        language: Language,
        leaf: CatalogId,
        #[source]
        source: MalformedPathError,
    },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("parquet error: {0}")]
    Parquet(#[from] arrow2::error::Error),
    #[error("object store error: {0}")]
    ObjectStore(#[from] ::object_store::Error),
    #[error("column {0} not found in {1}")]
    MissingColumn(String, String),
    #[error("column {0} in {1} is not a text column")]
    ColumnType(String, String),
}
