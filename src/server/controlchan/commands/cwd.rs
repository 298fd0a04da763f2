//! The RFC 959 Change Working Directory (`CWD`) command

use crate::{
    auth::UserDetail,
    server::controlchan::{
        Reply, ReplyCode,
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        reply_for_storage_error,
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Cwd {
    path: PathBuf,
}

impl Cwd {
    pub fn new(path: PathBuf) -> Self {
        Cwd { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Cwd
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        let path = session.resolve_path(&self.path);
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        match storage.cwd(user, &path).await {
            Ok(()) => {
                session.cwd = path;
                Ok(Reply::new(ReplyCode::FileActionOkay, "Okay."))
            }
            Err(err) => Ok(reply_for_storage_error(&err)),
        }
    }
}
