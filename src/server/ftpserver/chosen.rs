//! The per-server option set and its conversion into per-session loop
//! configuration.

use crate::auth::{Authenticator, UserDetail};
use crate::options::{PassiveHost, ThrottlePolicy};
use crate::server::controlchan::LoopConfig;
use crate::server::tls::FtpsConfig;
use crate::storage::StorageBackend;
use std::sync::Arc;
use std::time::Duration;

// The validated outcome of ServerBuilder::build, shared by all sessions.
pub(crate) struct OptionsHolder<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    pub storage: Arc<Storage>,
    pub greeting: String,
    pub authenticator: Arc<dyn Authenticator<User>>,
    pub passive_host: PassiveHost,
    pub ftps_config: FtpsConfig,
    pub idle_session_timeout: Duration,
    pub establish_timeout: Duration,
    pub stall_timeout: Duration,
    pub throttle: Option<Arc<dyn ThrottlePolicy>>,
    pub permit_foreign_data_peers: bool,
    pub max_login_attempts: u32,
    pub logger: slog::Logger,
}

impl<Storage, User> From<&OptionsHolder<Storage, User>> for LoopConfig<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    fn from(options: &OptionsHolder<Storage, User>) -> Self {
        LoopConfig {
            storage: options.storage.clone(),
            greeting: options.greeting.clone(),
            authenticator: options.authenticator.clone(),
            passive_host: options.passive_host,
            ftps_config: options.ftps_config.clone(),
            idle_session_timeout: options.idle_session_timeout,
            establish_timeout: options.establish_timeout,
            stall_timeout: options.stall_timeout,
            throttle: options.throttle.clone(),
            permit_foreign_data_peers: options.permit_foreign_data_peers,
            max_login_attempts: options.max_login_attempts,
            logger: options.logger.clone(),
        }
    }
}
