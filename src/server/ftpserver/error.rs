//! Errors that can be returned when building or running a [`Server`](super::Server).

use thiserror::Error;

/// The error type for server construction and the accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// An I/O error on the listening socket or while handing off a session.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The passive port environment override could not be parsed.
    #[error("cannot parse passive port range from {var}={value}, expected low-high")]
    InvalidPassivePortsEnv {
        /// The environment variable that was set.
        var: &'static str,
        /// Its unparseable contents.
        value: String,
    },
    /// No contiguous block of passive ports was free for a new worker.
    #[error("passive port range exhausted, cannot lease a block for a worker")]
    PassivePortsExhausted,
    /// Descriptor flags on the session socket could not be changed.
    #[cfg(unix)]
    #[error("fcntl on the session socket failed: {0}")]
    Fcntl(#[from] nix::errno::Errno),
    /// The process-per-session backend was requested on a platform without
    /// file descriptor inheritance.
    #[cfg(not(unix))]
    #[error("the process-per-session backend requires unix")]
    ProcessBackendUnsupported,
    /// A control channel failed in a way that was not handled in-session.
    #[error(transparent)]
    ControlChannel(#[from] crate::server::controlchan::error::ControlChanError),
    /// A dedicated session thread could not be spawned.
    #[error("could not spawn a session thread: {0}")]
    ThreadSpawn(std::io::Error),
}
