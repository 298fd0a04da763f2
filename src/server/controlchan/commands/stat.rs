//! The RFC 959 Status (`STAT`) command

use crate::{
    auth::UserDetail,
    server::{
        controlchan::{
            Reply, ReplyCode,
            error::ControlChanError,
            handler::{CommandContext, CommandHandler},
            reply_for_storage_error,
        },
        session::SessionState,
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug)]
pub struct Stat {
    path: Option<Bytes>,
}

impl Stat {
    pub fn new(path: Option<Bytes>) -> Self {
        Stat { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Stat
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        match &self.path {
            // Without a path STAT reports on the session itself.
            None => {
                let logged_in = match session.state {
                    SessionState::WaitCmd => match &session.username {
                        Some(username) => format!("Logged in as {}", username),
                        None => "Logged in".to_string(),
                    },
                    _ => "Not logged in".to_string(),
                };
                let lines = vec![
                    "server status:".to_string(),
                    format!("Connected from {}", session.source),
                    logged_in,
                    format!("TYPE: {:?}, STRUcture: File, MODE: Stream", session.data_type),
                    "End of status".to_string(),
                ];
                Ok(Reply::new_multiline(ReplyCode::SystemStatus, lines))
            }
            // With a path it is a directory listing over the control channel.
            Some(path) => {
                let path = String::from_utf8_lossy(path).to_string();
                let path = session.resolve_path(path);
                let storage = session.storage.clone();
                let user_arc = session.user.clone();
                let user = match &*user_arc {
                    Some(user) => user,
                    None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
                };
                match storage.list_vec(user, &path).await {
                    Ok(mut lines) => {
                        lines.insert(0, format!("Status of {}:", path.display()));
                        lines.push("End of status".to_string());
                        Ok(Reply::new_multiline(ReplyCode::FileStatus, lines))
                    }
                    Err(err) => Ok(reply_for_storage_error(&err)),
                }
            }
        }
    }
}
