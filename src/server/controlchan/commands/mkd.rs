//! The RFC 959 Make Directory (`MKD`) command

use crate::{
    auth::{Perms, UserDetail},
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
pub struct Mkd {
    path: PathBuf,
}

impl Mkd {
    pub fn new(path: PathBuf) -> Self {
        Mkd { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Mkd
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        if !session.user_perms().contains(Perms::MKDIR) {
            return Ok(Reply::new(ReplyCode::FileError, "Permission denied"));
        }
        let path = session.resolve_path(&self.path);
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        match storage.mkd(user, &path).await {
            Ok(()) => Ok(Reply::new_with_string(
                ReplyCode::DirCreated,
                format!("\"{}\" directory created", path.display()),
            )),
            Err(err) => Ok(reply_for_storage_error(&err)),
        }
    }
}
