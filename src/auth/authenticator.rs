use super::user::UserDetail;
use async_trait::async_trait;
use std::fmt::Debug;
use std::net::IpAddr;
use thiserror::Error;

/// The credentials sent by the client along a `USER`/`PASS` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// The password from the `PASS` command, if one was given.
    pub password: Option<String>,
    /// The IP the control connection originates from, for authenticators
    /// that filter on source address.
    pub source_ip: IpAddr,
}

/// Defines the requirements for an authentication back-end.
///
/// The engine calls [`authenticate`](Authenticator::authenticate) when it has
/// collected a username and password; a successful result carries the
/// [`UserDetail`] that scopes the rest of the session (home directory,
/// permission capabilities).
#[async_trait]
pub trait Authenticator<User>: Sync + Send + Debug
where
    User: UserDetail,
{
    /// Authenticate the given user with the given credentials.
    async fn authenticate(&self, username: &str, creds: &Credentials) -> Result<User, AuthenticationError>;

    /// Implementation name, used in logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The error returned by [`Authenticator::authenticate`].
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The username is not known.
    #[error("unknown user")]
    BadUser,

    /// The password does not match.
    #[error("bad password")]
    BadPassword,

    /// The account exists but may not log in.
    #[error("account disabled")]
    AccountDisabled,

    /// Any other failure inside the authenticator.
    #[error("authentication error: {0}")]
    ImplPropagated(String, #[source] Option<crate::BoxError>),
}

impl AuthenticationError {
    /// Creates an implementation-specific error with a source.
    pub fn with_source<S, E>(msg: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<crate::BoxError>,
    {
        AuthenticationError::ImplPropagated(msg.into(), Some(source.into()))
    }

    /// Creates an implementation-specific error from a message only.
    pub fn new<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        AuthenticationError::ImplPropagated(msg.into(), None)
    }
}
