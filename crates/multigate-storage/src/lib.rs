//! Flat-file persistence for the provider pool (spec.md §3, §4.E, §6).
//!
//! There is no database here: the pool document at
//! `PROVIDER_POOLS_FILE_PATH` already carries each entry's credential
//! inline, so persisting a refreshed OAuth token is just persisting the
//! document again — there is no separate credential store to keep in
//! sync.

pub mod pool_file;

pub use pool_file::PoolFileStore;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    Serde(#[from] serde_json::Error),
}
