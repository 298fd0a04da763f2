use super::authenticator::{AuthenticationError, Authenticator, Credentials};
use super::user::DefaultUser;
use async_trait::async_trait;

/// [`Authenticator`] implementation that authenticates all users regardless
/// of username or password.
///
/// ```rust
/// use ftpforge::auth::{AnonymousAuthenticator, Authenticator, Credentials, DefaultUser};
///
/// # #[tokio::main]
/// # async fn main() {
/// let creds = Credentials {
///     password: Some("pass".into()),
///     source_ip: "127.0.0.1".parse().unwrap(),
/// };
/// let user: DefaultUser = AnonymousAuthenticator.authenticate("anonymous", &creds).await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct AnonymousAuthenticator;

#[async_trait]
impl Authenticator<DefaultUser> for AnonymousAuthenticator {
    async fn authenticate(&self, _username: &str, _creds: &Credentials) -> Result<DefaultUser, AuthenticationError> {
        Ok(DefaultUser {})
    }

    fn name(&self) -> &str {
        "AnonymousAuthenticator"
    }
}
