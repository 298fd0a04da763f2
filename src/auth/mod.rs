//! Contains the [`Authenticator`] and [`UserDetail`] traits that you can
//! implement to integrate the server with your authentication mechanism, plus
//! an [`AnonymousAuthenticator`] that accepts everybody.

mod anonymous;
mod authenticator;
mod user;

pub use anonymous::AnonymousAuthenticator;
pub use authenticator::{AuthenticationError, Authenticator, Credentials};
pub use user::{DefaultUser, Perms, UserDetail};
