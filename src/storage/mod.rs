//! Contains the [`StorageBackend`] trait that can be implemented to create
//! custom virtual file systems, along with the local-disk [`Filesystem`]
//! implementation used by [`Server::with_fs`](crate::Server::with_fs).

mod error;
mod filesystem;
mod storage_backend;

pub use error::{Error, ErrorKind};
pub use filesystem::Filesystem;
pub use storage_backend::{FEATURE_RESTART, Fileinfo, Metadata, Permissions, Result, StorageBackend, mlsx_facts};
