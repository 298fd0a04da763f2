//! The public server type, its builder and the shutdown handle.

pub mod error;

pub(crate) mod chosen;
mod listen;

use crate::auth::{AnonymousAuthenticator, Authenticator, DefaultUser, UserDetail};
use crate::options::{
    Backend, DEFAULT_DATA_ESTABLISH_TIMEOUT, DEFAULT_DATA_STALL_TIMEOUT, DEFAULT_GREETING, DEFAULT_IDLE_SESSION_TIMEOUT,
    DEFAULT_MAX_LOGIN_ATTEMPTS, DEFAULT_PASSIVE_PORTS, PASSIVE_PORTS_ENV, PassiveHost, ThrottlePolicy, parse_passive_ports_env,
};
use crate::server::controlchan::{self, LoopConfig};
use crate::server::portpool::PortPool;
use crate::server::shutdown;
use crate::server::tls::FtpsConfig;
use crate::storage::{Filesystem, Metadata, StorageBackend};
use chosen::OptionsHolder;
use error::ServerError;
use slog::Drain;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Configures and creates a [`Server`].
///
/// Obtained through [`Server::with_fs`] or [`ServerBuilder::new`]; every
/// option has a sensible default.
pub struct ServerBuilder<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    storage: Arc<Storage>,
    greeting: String,
    authenticator: Arc<dyn Authenticator<User>>,
    passive_ports: RangeInclusive<u16>,
    passive_host: PassiveHost,
    backend: Backend,
    ftps: FtpsConfig,
    idle_session_timeout: Duration,
    data_establish_timeout: Duration,
    data_stall_timeout: Duration,
    throttle: Option<Arc<dyn ThrottlePolicy>>,
    permit_foreign_data_peers: bool,
    max_login_attempts: u32,
    logger: slog::Logger,
}

impl<Storage, User> ServerBuilder<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
    User: UserDetail + 'static,
{
    /// Creates a builder around the given storage back-end and authenticator.
    pub fn new(storage: Storage, authenticator: Arc<dyn Authenticator<User>>) -> Self {
        ServerBuilder {
            storage: Arc::new(storage),
            greeting: DEFAULT_GREETING.to_string(),
            authenticator,
            passive_ports: DEFAULT_PASSIVE_PORTS,
            passive_host: PassiveHost::default(),
            backend: Backend::Multiplexed,
            ftps: FtpsConfig::Off,
            idle_session_timeout: DEFAULT_IDLE_SESSION_TIMEOUT,
            data_establish_timeout: DEFAULT_DATA_ESTABLISH_TIMEOUT,
            data_stall_timeout: DEFAULT_DATA_STALL_TIMEOUT,
            throttle: None,
            permit_foreign_data_peers: false,
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            logger: slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()),
        }
    }

    /// Sets the greeting sent in the 220 welcome reply.
    pub fn greeting<S: Into<String>>(mut self, greeting: S) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the range from which passive data ports are leased.
    pub fn passive_ports(mut self, ports: RangeInclusive<u16>) -> Self {
        self.passive_ports = ports;
        self
    }

    /// Sets the host/IP advertised in `PASV` replies.
    pub fn passive_host<H: Into<PassiveHost>>(mut self, host: H) -> Self {
        self.passive_host = host.into();
        self
    }

    /// Chooses the session concurrency backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Enables explicit FTPS with the given TLS configuration.
    pub fn ftps(mut self, tls_config: Arc<rustls::ServerConfig>) -> Self {
        self.ftps = FtpsConfig::On { tls_config };
        self
    }

    /// Sets how long an idle control connection is kept before a 421 close.
    pub fn idle_session_timeout(mut self, timeout: Duration) -> Self {
        self.idle_session_timeout = timeout;
        self
    }

    /// Sets how long a data connection may take to establish.
    pub fn data_establish_timeout(mut self, timeout: Duration) -> Self {
        self.data_establish_timeout = timeout;
        self
    }

    /// Sets how long a transfer may go without moving any bytes.
    pub fn data_stall_timeout(mut self, timeout: Duration) -> Self {
        self.data_stall_timeout = timeout;
        self
    }

    /// Installs a pacing hook awaited before every transferred chunk.
    pub fn throttle(mut self, throttle: Arc<dyn ThrottlePolicy>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Allows data connections from addresses other than the control peer.
    /// Off by default to prevent FTP bounce scans.
    pub fn permit_foreign_data_peers(mut self, permit: bool) -> Self {
        self.permit_foreign_data_peers = permit;
        self
    }

    /// Sets how many failed logins are tolerated before a 421 close.
    pub fn max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = attempts;
        self
    }

    /// Sets the root logger for the server and its sessions.
    pub fn logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Finalizes the configuration.
    ///
    /// When [`PASSIVE_PORTS_ENV`] is set it overrides the configured passive
    /// port range; a parent running the process-per-session backend uses this
    /// to hand each worker a disjoint slice.
    pub fn build(self) -> Result<Server<Storage, User>, ServerError> {
        let passive_ports = match std::env::var(PASSIVE_PORTS_ENV) {
            Ok(value) => parse_passive_ports_env(&value).ok_or(ServerError::InvalidPassivePortsEnv {
                var: PASSIVE_PORTS_ENV,
                value,
            })?,
            Err(_) => self.passive_ports,
        };
        Ok(Server {
            options: OptionsHolder {
                storage: self.storage,
                greeting: self.greeting,
                authenticator: self.authenticator,
                passive_host: self.passive_host,
                ftps_config: self.ftps,
                idle_session_timeout: self.idle_session_timeout,
                establish_timeout: self.data_establish_timeout,
                stall_timeout: self.data_stall_timeout,
                throttle: self.throttle,
                permit_foreign_data_peers: self.permit_foreign_data_peers,
                max_login_attempts: self.max_login_attempts,
                logger: self.logger,
            },
            backend: self.backend,
            port_pool: Arc::new(PortPool::new(passive_ports)),
            shutdown: Arc::new(shutdown::Notifier::new()),
        })
    }
}

/// An FTP(S) server engine ready to accept control connections.
pub struct Server<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    pub(crate) options: OptionsHolder<Storage, User>,
    pub(crate) backend: Backend,
    pub(crate) port_pool: Arc<PortPool>,
    pub(crate) shutdown: Arc<shutdown::Notifier>,
}

impl Server<Filesystem, DefaultUser> {
    /// A builder for a server that serves the given directory tree to
    /// anonymous users.
    pub fn with_fs<P: Into<PathBuf>>(path: P) -> ServerBuilder<Filesystem, DefaultUser> {
        ServerBuilder::new(Filesystem::new(path), Arc::new(AnonymousAuthenticator))
    }
}

impl<Storage, User> Server<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
    User: UserDetail + 'static,
{
    /// Serves a single, already accepted control connection on the calling
    /// runtime. This is what a process-per-session worker calls on its
    /// inherited socket.
    pub async fn service(&self, tcp: TcpStream) -> Result<(), ServerError> {
        let config = LoopConfig::from(&self.options);
        let shutdown = self.shutdown.subscribe().await;
        controlchan::control_loop::run(config, self.port_pool.clone(), tcp, shutdown).await?;
        Ok(())
    }

    /// Returns a handle with which the server can be stopped gracefully.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notifier: self.shutdown.clone(),
        }
    }
}

/// Stops a running [`Server`].
#[derive(Clone)]
pub struct ShutdownHandle {
    notifier: Arc<shutdown::Notifier>,
}

impl ShutdownHandle {
    /// Tells every session to close with a 421 reply and waits until all of
    /// them have wound down.
    pub async fn stop(self) {
        self.notifier.notify().await;
        self.notifier.linger().await;
    }
}
