use crate::auth::{Authenticator, UserDetail};
use crate::options::PassiveHost;
use crate::server::chancomms::ControlChanMsg;
use crate::server::controlchan::Reply;
use crate::server::controlchan::command::Command;
use crate::server::controlchan::error::ControlChanError;
use crate::server::portpool::PortPool;
use crate::server::session::SharedSession;
use crate::storage::StorageBackend;
use async_trait::async_trait;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

// One implementation per FTP command. The control loop dispatches parsed
// commands to these; the returned reply is written to the client.
#[async_trait]
pub(crate) trait CommandHandler<Storage, User>: Send + Sync + Debug
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError>;
}

// Everything a command handler may need to do its job.
#[derive(Debug)]
pub(crate) struct CommandContext<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    pub cmd: Command,
    pub session: SharedSession<Storage, User>,
    pub authenticator: Arc<dyn Authenticator<User>>,
    pub tls_configured: bool,
    pub passive_host: PassiveHost,
    pub port_pool: Arc<PortPool>,
    pub tx_control_chan: Sender<ControlChanMsg>,
    pub local_addr: SocketAddr,
    pub storage_features: u32,
    pub permit_foreign_data_peers: bool,
    pub establish_timeout: Duration,
    pub max_login_attempts: u32,
    pub logger: slog::Logger,
}
