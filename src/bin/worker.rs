//! The helper executable for the process-per-session backend.
//!
//! The parent server spawns one of these per control connection, passing the
//! directory to serve and the inherited socket's file descriptor number:
//!
//! ```text
//! ftpforge-worker <root> <fd>
//! ```
//!
//! The passive port slice leased to this worker arrives through the
//! `FTPFORGE_PASSIVE_PORTS` environment variable and is picked up by
//! `ServerBuilder::build`.

use ftpforge::Server;
use std::os::fd::{FromRawFd, RawFd};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ftpforge::BoxError> {
    let mut args = std::env::args().skip(1);
    let (root, fd) = match (args.next(), args.next()) {
        (Some(root), Some(fd)) => (root, fd),
        _ => return Err("usage: ftpforge-worker <root> <fd>".into()),
    };
    let fd: RawFd = fd.parse().map_err(|_| format!("{} is not a file descriptor number", fd))?;

    // SAFETY: the parent spawned us with this descriptor referring to a
    // connected TCP socket and transferred ownership of it to this process.
    let std_tcp = unsafe { std::net::TcpStream::from_raw_fd(fd) };
    std_tcp.set_nonblocking(true)?;
    let tcp = tokio::net::TcpStream::from_std(std_tcp)?;

    let server = Server::with_fs(root).build()?;
    server.service(tcp).await?;
    Ok(())
}
