//! The RFC 2228 Authentication/Security Mechanism (`AUTH`) command

use crate::{
    auth::UserDetail,
    server::{
        chancomms::ControlChanMsg,
        controlchan::{
            Reply, ReplyCode,
            commands::AuthParam,
            error::{ControlChanError, ControlChanErrorKind},
            handler::{CommandContext, CommandHandler},
        },
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Auth {
    protocol: AuthParam,
}

impl Auth {
    pub fn new(protocol: AuthParam) -> Self {
        Auth { protocol }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Auth
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        match (args.tls_configured, &self.protocol) {
            (true, AuthParam::Tls) => {
                // The 234 goes out first, then the loop performs the
                // handshake on the raw connection underneath.
                args.tx_control_chan
                    .send(ControlChanMsg::SecureControlChannel)
                    .await
                    .map_err(|_| ControlChanError::new(ControlChanErrorKind::InternalServerError))?;
                Ok(Reply::new(ReplyCode::AuthOkayNoDataNeeded, "Upgrading to TLS"))
            }
            (true, AuthParam::Ssl) => Ok(Reply::new(
                ReplyCode::CommandNotImplementedForParameter,
                "Only AUTH TLS is supported",
            )),
            (false, _) => Ok(Reply::new(ReplyCode::CommandNotImplemented, "TLS is not configured")),
        }
    }
}
