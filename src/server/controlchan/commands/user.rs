//! The RFC 959 User Name (`USER`) command

use crate::{
    auth::UserDetail,
    server::{
        controlchan::{
            Reply, ReplyCode,
            error::ControlChanError,
            handler::{CommandContext, CommandHandler},
        },
        session::SessionState,
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug)]
pub struct User {
    username: Bytes,
}

impl User {
    pub fn new(username: Bytes) -> Self {
        User { username }
    }
}

#[async_trait]
impl<Storage, UserDetails> CommandHandler<Storage, UserDetails> for User
where
    UserDetails: UserDetail + 'static,
    Storage: StorageBackend<UserDetails> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, UserDetails>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        // USER always restarts authentication, also mid-session.
        session.username = Some(String::from_utf8_lossy(&self.username).to_string());
        session.user = Arc::new(None);
        session.state = SessionState::WaitPass;
        Ok(Reply::new(ReplyCode::NeedPassword, "Password Required"))
    }
}
