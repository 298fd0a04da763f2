#![deny(clippy::all)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! An embeddable FTP(S) server engine.
//!
//! ftpforge implements the RFC 959 control channel with the extensions real
//! clients expect (`PASV`/`EPSV`, `PORT`/`EPRT`, `REST`, `MLSD`/`MLST`,
//! `TYPE A`/`TYPE I`, and explicit TLS via `AUTH`/`PBSZ`/`PROT`), together
//! with the data-channel transfer mechanics: chunked streaming with abort
//! checks, establish and stall timeouts, ASCII newline translation and an
//! optional throttle hook.
//!
//! The engine is generic over two collaborator ports:
//!
//! - [`auth::Authenticator`] verifies credentials and yields a
//!   [`auth::UserDetail`] carrying the user's home directory and permission
//!   capabilities.
//! - [`storage::StorageBackend`] is the virtual filesystem the session
//!   operates on. A local-disk implementation ([`storage::Filesystem`]) ships
//!   with the crate.
//!
//! Session concurrency is a construction-time choice ([`options::Backend`]):
//! all sessions multiplexed on the caller's async runtime, one OS thread per
//! session, or one helper process per session. The observable protocol
//! behavior is identical in all three modes.
//!
//! Quick start, serving a directory tree to anonymous users:
//!
//! ```no_run
//! use ftpforge::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::with_fs("/srv/ftp").build().unwrap();
//!     server.listen("127.0.0.1:2121").await.unwrap();
//! }
//! ```

pub mod auth;
pub mod options;
pub(crate) mod server;
pub mod storage;

pub use crate::server::ftpserver::{Server, ServerBuilder, ShutdownHandle, error::ServerError};
pub use crate::server::tls::FtpsConfig;

/// A boxed error type often used as an error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
