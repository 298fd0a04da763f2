//! The RFC 959 Rename To (`RNTO`) command

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
pub struct Rnto {
    file: PathBuf,
}

impl Rnto {
    pub fn new(file: PathBuf) -> Self {
        Rnto { file }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Rnto
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        if !session.user_perms().contains(Perms::RENAME) {
            return Ok(Reply::new(ReplyCode::FileError, "Permission denied"));
        }
        let from = match session.rename_from.take() {
            Some(from) => from,
            None => return Ok(Reply::new(ReplyCode::BadCommandSequence, "Please tell me what file you want to rename first")),
        };
        let to = session.resolve_path(&self.file);
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        match storage.rename(user, &from, &to).await {
            Ok(()) => Ok(Reply::new(ReplyCode::FileActionOkay, "Renamed")),
            Err(err) => Ok(reply_for_storage_error(&err)),
        }
    }
}
