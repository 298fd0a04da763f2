//! Types used when constructing a [`Server`](crate::Server).

use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt::Debug;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// The greeting that the server will show when a client connects.
pub const DEFAULT_GREETING: &str = "Welcome to the ftpforge FTP server";

/// The default idle time of the control channel, after which the session is
/// closed with a 421 reply.
pub const DEFAULT_IDLE_SESSION_TIMEOUT: Duration = Duration::from_secs(600);

/// The default time allowed for a data connection to be established, both
/// for a passive accept and an active connect.
pub const DEFAULT_DATA_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(15);

/// The default time a running transfer may go without moving any bytes.
pub const DEFAULT_DATA_STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// The default range from which passive data ports are leased.
pub const DEFAULT_PASSIVE_PORTS: RangeInclusive<u16> = 49152..=65535;

/// The default number of failed login attempts after which the control
/// connection is closed with a 421 reply.
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 3;

/// Environment variable through which a parent process hands a worker its
/// slice of the passive port range (format: `low-high`, inclusive).
///
/// [`ServerBuilder::build`](crate::ServerBuilder::build) picks this up
/// automatically, which is how per-session worker processes stay out of each
/// other's way when leasing passive ports.
pub const PASSIVE_PORTS_ENV: &str = "FTPFORGE_PASSIVE_PORTS";

/// The session concurrency model, chosen at construction time through
/// [`ServerBuilder::backend`](crate::ServerBuilder::backend).
///
/// All three backends run the exact same session logic and are
/// indistinguishable on the wire.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Every session is a task on the async runtime that called
    /// [`Server::listen`](crate::Server::listen). The default.
    Multiplexed,
    /// Every session gets a dedicated OS thread driving its own
    /// single-threaded runtime.
    ThreadPerSession,
    /// Every session is served by a freshly spawned helper process. The
    /// connected control socket is passed to the helper as an inherited file
    /// descriptor, with the descriptor number appended as the final argument.
    ///
    /// The helper is expected to call
    /// [`Server::service`](crate::Server::service) on that socket; the
    /// shipped `ftpforge-worker` binary does exactly that. The parent leases
    /// each worker a disjoint block of passive ports and exports it through
    /// [`PASSIVE_PORTS_ENV`].
    ProcessPerSession {
        /// Path of the helper executable to spawn per session.
        helper: PathBuf,
        /// Arguments passed to the helper before the file descriptor number.
        args: Vec<OsString>,
        /// Size of the passive port block leased to each worker.
        ports_per_worker: u16,
    },
}

/// The host/IP advertised in `PASV` replies.
///
/// Clients behind NAT need the server's public address here rather than the
/// address the control connection happens to be bound to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PassiveHost {
    /// Use the IP of the local interface the control connection arrived on.
    /// The default.
    FromConnection,
    /// Advertise this fixed IP.
    Ip(Ipv4Addr),
}

impl Default for PassiveHost {
    fn default() -> Self {
        PassiveHost::FromConnection
    }
}

impl From<Ipv4Addr> for PassiveHost {
    fn from(ip: Ipv4Addr) -> Self {
        PassiveHost::Ip(ip)
    }
}

/// A hook that paces data transfers.
///
/// The data channel awaits [`pace`](ThrottlePolicy::pace) before moving each
/// chunk, passing the size of the chunk about to be transferred. An
/// implementation that sleeps proportionally implements a bandwidth cap; one
/// that returns immediately is a no-op.
#[async_trait]
pub trait ThrottlePolicy: Send + Sync + Debug {
    /// Called before each chunk of `bytes` bytes is moved.
    async fn pace(&self, bytes: usize);
}

/// Parses the contents of [`PASSIVE_PORTS_ENV`].
pub(crate) fn parse_passive_ports_env(value: &str) -> Option<RangeInclusive<u16>> {
    let (low, high) = value.split_once('-')?;
    let low: u16 = low.trim().parse().ok()?;
    let high: u16 = high.trim().parse().ok()?;
    if low > high {
        return None;
    }
    Some(low..=high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_passive_ports_env() {
        assert_eq!(parse_passive_ports_env("50000-50100"), Some(50000..=50100));
        assert_eq!(parse_passive_ports_env(" 50000 - 50100 "), Some(50000..=50100));
        assert_eq!(parse_passive_ports_env("50100-50000"), None);
        assert_eq!(parse_passive_ports_env("50000"), None);
        assert_eq!(parse_passive_ports_env("x-y"), None);
    }
}
