use crate::auth::{Perms, UserDetail};
use crate::options::ThrottlePolicy;
use crate::server::chancomms::DataChanCmd;
use crate::server::controlchan::command::DataType;
use crate::server::tls::FtpsConfig;
use crate::storage::StorageBackend;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub(crate) type SharedSession<S, U> = Arc<tokio::sync::Mutex<Session<S, U>>>;

// The authentication progress of a control connection.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionState {
    New,
    WaitPass,
    WaitCmd,
}

// All state for a single control connection. Lives behind an async mutex
// shared between the control loop and the data channel tasks it spawns.
#[derive(Debug)]
pub(crate) struct Session<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    pub user: Arc<Option<User>>,
    pub username: Option<String>,
    pub storage: Arc<Storage>,
    pub cwd: PathBuf,
    pub state: SessionState,
    pub data_type: DataType,
    // Offset set by REST, consumed by exactly the next transfer command.
    pub start_pos: u64,
    // Path set by RNFR, consumed by RNTO, dropped by anything else.
    pub rename_from: Option<PathBuf>,
    pub login_attempts: u32,
    pub data_cmd_tx: Option<mpsc::Sender<DataChanCmd>>,
    pub data_cmd_rx: Option<mpsc::Receiver<DataChanCmd>>,
    pub data_abort_tx: Option<mpsc::Sender<()>>,
    pub data_abort_rx: Option<mpsc::Receiver<()>>,
    // True while the data loop is actually moving bytes. Decides between the
    // 225 and 426/226 shapes of the ABOR reply.
    pub data_busy: Arc<AtomicBool>,
    pub source: SocketAddr,
    pub ftps_config: FtpsConfig,
    pub cmd_tls: bool,
    pub data_tls: bool,
    pub stall_timeout: Duration,
    pub throttle: Option<Arc<dyn ThrottlePolicy>>,
    pub trace_id: Uuid,
}

impl<Storage, User> Session<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    pub(super) fn new(storage: Arc<Storage>, source: SocketAddr) -> Self {
        Session {
            user: Arc::new(None),
            username: None,
            storage,
            cwd: "/".into(),
            state: SessionState::New,
            data_type: DataType::default(),
            start_pos: 0,
            rename_from: None,
            login_attempts: 0,
            data_cmd_tx: None,
            data_cmd_rx: None,
            data_abort_tx: None,
            data_abort_rx: None,
            data_busy: Arc::new(AtomicBool::new(false)),
            source,
            ftps_config: FtpsConfig::Off,
            cmd_tls: false,
            data_tls: false,
            stall_timeout: crate::options::DEFAULT_DATA_STALL_TIMEOUT,
            throttle: None,
            trace_id: Uuid::new_v4(),
        }
    }

    pub(super) fn ftps(mut self, config: FtpsConfig) -> Self {
        self.ftps_config = config;
        self
    }

    pub(super) fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub(super) fn throttle(mut self, throttle: Option<Arc<dyn ThrottlePolicy>>) -> Self {
        self.throttle = throttle;
        self
    }

    // Prepares fresh command/abort channels for a newly negotiated data
    // connection, invalidating whatever was negotiated before.
    pub(crate) fn setup_data_channels(&mut self) {
        self.reset_data_channel();
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (abort_tx, abort_rx) = mpsc::channel(1);
        self.data_cmd_tx = Some(cmd_tx);
        self.data_cmd_rx = Some(cmd_rx);
        self.data_abort_tx = Some(abort_tx);
        self.data_abort_rx = Some(abort_rx);
        self.data_busy = Arc::new(AtomicBool::new(false));
    }

    // Tears down the negotiated data channel, aborting a transfer in flight.
    pub(crate) fn reset_data_channel(&mut self) {
        if let Some(tx) = self.data_abort_tx.take() {
            let _ = tx.try_send(());
        }
        self.data_cmd_tx = None;
        self.data_cmd_rx = None;
        self.data_abort_rx = None;
    }

    pub(crate) fn user_perms(&self) -> Perms {
        match &*self.user {
            Some(user) => user.perms(),
            None => Perms::all(),
        }
    }

    // Resolves a client-supplied path against the current working directory
    // into a normalized virtual absolute path. `.` and `..` components are
    // folded here so storage back-ends never see them.
    pub(crate) fn resolve_path<P: AsRef<Path>>(&self, given: P) -> PathBuf {
        let given = given.as_ref();
        let mut resolved = if given.is_absolute() { PathBuf::from("/") } else { self.cwd.clone() };
        for component in given.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    resolved.pop();
                    if resolved.as_os_str().is_empty() {
                        resolved.push("/");
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DefaultUser;
    use crate::storage::Filesystem;
    use pretty_assertions::assert_eq;

    fn session_at(cwd: &str) -> Session<Filesystem, DefaultUser> {
        let mut session = Session::new(Arc::new(Filesystem::new("/tmp")), "127.0.0.1:12345".parse().unwrap());
        session.cwd = cwd.into();
        session
    }

    #[test]
    fn resolves_relative_against_cwd() {
        let session = session_at("/docs");
        assert_eq!(session.resolve_path("letters"), PathBuf::from("/docs/letters"));
    }

    #[test]
    fn resolves_absolute_from_root() {
        let session = session_at("/docs");
        assert_eq!(session.resolve_path("/pub/file.txt"), PathBuf::from("/pub/file.txt"));
    }

    #[test]
    fn folds_dot_and_dotdot() {
        let session = session_at("/docs/letters");
        assert_eq!(session.resolve_path("../../pub/./x"), PathBuf::from("/pub/x"));
    }

    #[test]
    fn cannot_escape_the_root() {
        let session = session_at("/");
        assert_eq!(session.resolve_path("../../../etc/passwd"), PathBuf::from("/etc/passwd"));
    }
}
