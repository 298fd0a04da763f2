use bitflags::bitflags;
use std::fmt::{self, Debug, Display, Formatter};
use std::path::Path;

bitflags! {
    /// The filesystem capabilities granted to an authenticated user.
    ///
    /// Handlers that mutate the storage check the matching capability and
    /// answer 550 when it is missing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Perms: u32 {
        /// Download files (`RETR`).
        const READ = 0b0000_0001;
        /// Upload files (`STOR`, `APPE`).
        const WRITE = 0b0000_0010;
        /// Remove files (`DELE`).
        const DELETE = 0b0000_0100;
        /// Rename files and directories (`RNFR`/`RNTO`).
        const RENAME = 0b0000_1000;
        /// Create directories (`MKD`).
        const MKDIR = 0b0001_0000;
        /// Remove directories (`RMD`).
        const RMDIR = 0b0010_0000;
        /// List directories (`LIST`, `NLST`, `MLSD`).
        const LIST = 0b0100_0000;
    }
}

impl Default for Perms {
    fn default() -> Self {
        Perms::all()
    }
}

/// Defines the requirements for the user type that an
/// [`Authenticator`](super::Authenticator) yields on success.
pub trait UserDetail: Send + Sync + Display + Debug {
    /// The user's home directory as a path inside the storage back-end.
    /// When set, the session starts there instead of at the root.
    fn home(&self) -> Option<&Path> {
        None
    }

    /// The capabilities granted to this user. Everything by default.
    fn perms(&self) -> Perms {
        Perms::all()
    }
}

/// DefaultUser is a default implementation of the `UserDetail` trait that
/// carries no details at all. Used by [`AnonymousAuthenticator`](super::AnonymousAuthenticator).
#[derive(Debug, PartialEq, Eq)]
pub struct DefaultUser;

impl UserDetail for DefaultUser {}

impl Display for DefaultUser {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "DefaultUser")
    }
}
