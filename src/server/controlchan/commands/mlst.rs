//! The RFC 3659 machine listing of a single object (`MLST`) command

use crate::{
    auth::UserDetail,
    server::controlchan::{
        Reply, ReplyCode,
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        reply_for_storage_error,
    },
    storage::{Metadata, StorageBackend, mlsx_facts},
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Mlst {
    path: Option<String>,
}

impl Mlst {
    pub fn new(path: Option<String>) -> Self {
        Mlst { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Mlst
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        let path = match &self.path {
            Some(path) => session.resolve_path(path),
            None => session.cwd.clone(),
        };
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        match storage.metadata(user, &path).await {
            Ok(meta) => {
                let lines = vec![
                    "Listing:".to_string(),
                    // MLST facts name the full path, unlike MLSD entries.
                    format!(" {}", mlsx_facts(&path.display().to_string(), &meta)),
                    "End".to_string(),
                ];
                Ok(Reply::new_multiline(ReplyCode::FileActionOkay, lines))
            }
            Err(err) => Ok(reply_for_storage_error(&err)),
        }
    }
}
