//! The RFC 3659 Modification Time (`MDTM`) command

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
use chrono::{DateTime, Utc};
use std::path::PathBuf;

#[derive(Debug)]
pub struct Mdtm {
    file: PathBuf,
}

impl Mdtm {
    pub fn new(file: PathBuf) -> Self {
        Mdtm { file }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Mdtm
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        let path = session.resolve_path(&self.file);
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        match storage.metadata(user, &path).await {
            Ok(meta) => match meta.modified() {
                Ok(modified) => Ok(Reply::new_with_string(
                    ReplyCode::FileStatus,
                    DateTime::<Utc>::from(modified).format("%Y%m%d%H%M%S").to_string(),
                )),
                Err(err) => Ok(reply_for_storage_error(&err)),
            },
            Err(err) => Ok(reply_for_storage_error(&err)),
        }
    }
}
