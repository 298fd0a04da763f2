//! The RFC 959 Delete File (`DELE`) command

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

#[derive(Debug)]
pub struct Dele {
    path: String,
}

impl Dele {
    pub fn new(path: String) -> Self {
        Dele { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Dele
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        if !session.user_perms().contains(Perms::DELETE) {
            return Ok(Reply::new(ReplyCode::FileError, "Permission denied"));
        }
        let path = session.resolve_path(&self.path);
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        match storage.del(user, &path).await {
            Ok(()) => Ok(Reply::new(ReplyCode::FileActionOkay, "File deleted")),
            Err(err) => Ok(reply_for_storage_error(&err)),
        }
    }
}
