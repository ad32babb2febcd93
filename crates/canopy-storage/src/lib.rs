//! canopy-storage
//!
//! State Store: the last-known mapping from resource identity to remote ID
//! and observed attributes. One trait, three backends:
//! - `MemoryStore`: process-local map
//! - `FileStore`: single JSON document on local disk
//! - `S3Store`: single JSON document in an S3 bucket, ETag-guarded writes

pub mod client;
pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod objects;
pub mod record;
pub mod s3;
pub mod store;

pub use crate::error::StorageError;
pub use crate::file::FileStore;
pub use crate::memory::MemoryStore;
pub use crate::record::{KeyId, ResourceState, StateKey};
pub use crate::s3::S3Store;
pub use crate::store::{BoxFuture, StateStore};
