//! The RFC 959 Password (`PASS`) command

use crate::{
    auth::{Credentials, UserDetail},
    server::{
        controlchan::{
            Reply, ReplyCode,
            command::Password,
            error::ControlChanError,
            handler::{CommandContext, CommandHandler},
        },
        session::SessionState,
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;
use slog::{info, warn};
use std::sync::Arc;

#[derive(Debug)]
pub struct Pass {
    password: Password,
}

impl Pass {
    pub fn new(password: Password) -> Self {
        Pass { password }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Pass
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        match session.state {
            SessionState::WaitPass => {
                let username = match session.username.clone() {
                    Some(u) => u,
                    None => return Ok(Reply::new(ReplyCode::BadCommandSequence, "Please supply a username first")),
                };
                let creds = Credentials {
                    password: Some(String::from_utf8_lossy(self.password.as_bytes()).to_string()),
                    source_ip: session.source.ip(),
                };
                match args.authenticator.authenticate(&username, &creds).await {
                    Ok(details) => {
                        info!(args.logger, "User logged in"; "username" => &username);
                        if let Some(home) = details.home() {
                            session.cwd = home.to_path_buf();
                        }
                        session.user = Arc::new(Some(details));
                        session.state = SessionState::WaitCmd;
                        session.login_attempts = 0;
                        Ok(Reply::new(ReplyCode::UserLoggedIn, "User logged in, proceed"))
                    }
                    Err(err) => {
                        warn!(args.logger, "Failed login attempt"; "username" => &username, "error" => %err);
                        session.state = SessionState::New;
                        session.login_attempts += 1;
                        if session.login_attempts >= args.max_login_attempts {
                            // The control loop closes the connection after
                            // any 421 reply.
                            Ok(Reply::new(ReplyCode::ServiceNotAvailable, "Too many failed login attempts, closing control connection"))
                        } else {
                            Ok(Reply::new(ReplyCode::NotLoggedIn, "Authentication failed"))
                        }
                    }
                }
            }
            SessionState::New => Ok(Reply::new(ReplyCode::BadCommandSequence, "Please supply a username first")),
            SessionState::WaitCmd => Ok(Reply::new(ReplyCode::BadCommandSequence, "Already logged in")),
        }
    }
}
