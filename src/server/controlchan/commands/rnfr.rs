//! The RFC 959 Rename From (`RNFR`) command

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
pub struct Rnfr {
    file: PathBuf,
}

impl Rnfr {
    pub fn new(file: PathBuf) -> Self {
        Rnfr { file }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Rnfr
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
        let path = session.resolve_path(&self.file);
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        // The source must exist before we promise a rename.
        match storage.metadata(user, &path).await {
            Ok(_) => {
                session.rename_from = Some(path);
                Ok(Reply::new(ReplyCode::FileActionPending, "Ready for destination name"))
            }
            Err(err) => Ok(reply_for_storage_error(&err)),
        }
    }
}
