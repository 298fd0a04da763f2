//! The data channel: one task per negotiated data connection, driving a
//! single transfer with abort checks, stall timeouts, ASCII translation and
//! the optional throttle hook applied per chunk.

use crate::auth::UserDetail;
use crate::options::ThrottlePolicy;
use crate::server::chancomms::{ControlChanMsg, DataChanCmd};
use crate::server::controlchan::command::DataType;
use crate::server::portpool::PortLease;
use crate::server::session::SharedSession;
use crate::storage::StorageBackend;
use slog::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{sleep, timeout};

// The unit of streaming. Abort, stall and throttle all apply per chunk.
const CHUNK_SIZE: usize = 8 * 1024;

// How long a connected data channel waits for its transfer command.
const COMMAND_WAIT: Duration = Duration::from_secs(5 * 60);

pub(crate) trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

enum TransferError {
    Aborted,
    Stalled,
    Io(std::io::Error),
}

// Takes over an established passive data connection: waits for the transfer
// command from the control loop and executes it.
pub(crate) async fn spawn_processing<Storage, User>(
    logger: slog::Logger,
    session: SharedSession<Storage, User>,
    socket: TcpStream,
    lease: Option<PortLease>,
    tx_control: Sender<ControlChanMsg>,
) where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    let (parts, tls) = match take_channel_parts(&session, &tx_control, &logger).await {
        Some(x) => x,
        None => return,
    };
    let (mut cmd_rx, mut abort_rx, executor) = parts;

    tokio::spawn(async move {
        let socket: Box<dyn AsyncStream> = match tls {
            Some(acceptor) => match acceptor.accept(socket).await {
                Ok(stream) => Box::new(stream),
                Err(err) => {
                    warn!(executor.logger, "TLS handshake on data connection failed: {}", err);
                    return;
                }
            },
            None => Box::new(socket),
        };
        tokio::select! {
            biased;
            _ = abort_rx.recv() => {
                info!(executor.logger, "Data channel aborted before a command arrived");
            }
            cmd = cmd_rx.recv() => {
                if let Some(cmd) = cmd {
                    executor.execute(cmd, socket, &mut abort_rx).await;
                }
            }
            _ = sleep(COMMAND_WAIT) => {
                warn!(executor.logger, "Data channel closed: no command within {:?}", COMMAND_WAIT);
            }
        }
        drop(lease);
    });
}

// Active mode counterpart: waits for the transfer command first, then
// connects out to the address from PORT/EPRT.
pub(crate) async fn spawn_active<Storage, User>(
    logger: slog::Logger,
    session: SharedSession<Storage, User>,
    target: std::net::SocketAddr,
    establish_timeout: Duration,
    tx_control: Sender<ControlChanMsg>,
) where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    let (parts, tls) = match take_channel_parts(&session, &tx_control, &logger).await {
        Some(x) => x,
        None => return,
    };
    let (mut cmd_rx, mut abort_rx, executor) = parts;

    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = abort_rx.recv() => {
                info!(executor.logger, "Active data channel aborted before a command arrived");
            }
            cmd = cmd_rx.recv() => {
                if let Some(cmd) = cmd {
                    match timeout(establish_timeout, TcpStream::connect(target)).await {
                        Ok(Ok(socket)) => {
                            let socket: Box<dyn AsyncStream> = match tls {
                                Some(acceptor) => match acceptor.accept(socket).await {
                                    Ok(stream) => Box::new(stream),
                                    Err(err) => {
                                        warn!(executor.logger, "TLS handshake on data connection failed: {}", err);
                                        return;
                                    }
                                },
                                None => Box::new(socket),
                            };
                            executor.execute(cmd, socket, &mut abort_rx).await;
                        }
                        _ => {
                            warn!(executor.logger, "Could not connect to {} for active data transfer", target);
                            let _ = executor.tx_control.send(ControlChanMsg::DataConnectionFailed).await;
                        }
                    }
                }
            }
            _ = sleep(COMMAND_WAIT) => {
                warn!(executor.logger, "Active data channel closed: no command within {:?}", COMMAND_WAIT);
            }
        }
    });
}

type ChannelParts<Storage, User> = (Receiver<DataChanCmd>, Receiver<()>, DataCommandExecutor<Storage, User>);

async fn take_channel_parts<Storage, User>(
    session: &SharedSession<Storage, User>,
    tx_control: &Sender<ControlChanMsg>,
    logger: &slog::Logger,
) -> Option<(ChannelParts<Storage, User>, Option<tokio_rustls::TlsAcceptor>)>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    let mut session = session.lock().await;
    let cmd_rx = session.data_cmd_rx.take();
    let abort_rx = session.data_abort_rx.take();
    let (cmd_rx, abort_rx) = match (cmd_rx, abort_rx) {
        (Some(c), Some(a)) => (c, a),
        // A newer PASV/PORT already invalidated this channel.
        _ => return None,
    };
    let tls = if session.data_tls { session.ftps_config.acceptor() } else { None };
    let executor = DataCommandExecutor {
        user: session.user.clone(),
        storage: session.storage.clone(),
        tx_control: tx_control.clone(),
        stall_timeout: session.stall_timeout,
        throttle: session.throttle.clone(),
        busy: session.data_busy.clone(),
        logger: logger.clone(),
    };
    Some(((cmd_rx, abort_rx, executor), tls))
}

struct DataCommandExecutor<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    user: Arc<Option<User>>,
    storage: Arc<Storage>,
    tx_control: Sender<ControlChanMsg>,
    stall_timeout: Duration,
    throttle: Option<Arc<dyn ThrottlePolicy>>,
    busy: Arc<AtomicBool>,
    logger: slog::Logger,
}

impl<Storage, User> DataCommandExecutor<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    async fn execute(&self, cmd: DataChanCmd, mut socket: Box<dyn AsyncStream>, abort_rx: &mut Receiver<()>) {
        match cmd {
            DataChanCmd::Retr { path, offset, data_type } => {
                self.exec_retr(path, offset, data_type, &mut socket, abort_rx).await;
            }
            DataChanCmd::Stor { path, offset, data_type } => {
                self.exec_stor(path, offset, data_type, &mut socket, abort_rx).await;
            }
            DataChanCmd::List { path } => {
                let listing = {
                    let user = match self.user() {
                        Some(user) => user,
                        None => return,
                    };
                    self.storage.list_fmt(user, &path).await
                };
                self.exec_listing(listing, &mut socket, abort_rx).await;
            }
            DataChanCmd::Nlst { path } => {
                let listing = {
                    let user = match self.user() {
                        Some(user) => user,
                        None => return,
                    };
                    self.storage.nlst(user, &path).await
                };
                self.exec_listing(listing, &mut socket, abort_rx).await;
            }
            DataChanCmd::Mlsd { path } => {
                let listing = {
                    let user = match self.user() {
                        Some(user) => user,
                        None => return,
                    };
                    self.storage.mlsd_fmt(user, &path).await
                };
                self.exec_listing(listing, &mut socket, abort_rx).await;
            }
        }
    }

    fn user(&self) -> Option<&User> {
        (*self.user).as_ref()
    }

    async fn exec_retr(&self, path: PathBuf, offset: u64, data_type: DataType, socket: &mut Box<dyn AsyncStream>, abort_rx: &mut Receiver<()>) {
        let user = match self.user() {
            Some(user) => user,
            None => return,
        };
        let mut reader = match self.storage.get(user, &path, offset).await {
            Ok(reader) => reader,
            Err(err) => {
                let _ = self.tx_control.send(ControlChanMsg::StorageError(err)).await;
                return;
            }
        };
        let _ = self.tx_control.send(ControlChanMsg::SendingData).await;
        self.busy.store(true, Ordering::SeqCst);
        let result = self.stream_out(&mut reader, socket, data_type == DataType::Ascii, abort_rx).await;
        self.busy.store(false, Ordering::SeqCst);
        match result {
            Ok(bytes) => {
                let _ = socket.shutdown().await;
                info!(self.logger, "Sent {} bytes", bytes);
                let _ = self.tx_control.send(ControlChanMsg::SentData { bytes }).await;
            }
            Err(TransferError::Aborted) => {
                info!(self.logger, "Retrieve aborted");
            }
            Err(_) => {
                let _ = self.tx_control.send(ControlChanMsg::ConnectionReset).await;
            }
        }
    }

    async fn exec_stor(&self, path: PathBuf, offset: u64, data_type: DataType, socket: &mut Box<dyn AsyncStream>, abort_rx: &mut Receiver<()>) {
        let user = match self.user() {
            Some(user) => user,
            None => return,
        };
        let _ = self.tx_control.send(ControlChanMsg::SendingData).await;
        self.busy.store(true, Ordering::SeqCst);

        // The inbound socket is pumped chunk-wise into one end of an
        // in-process pipe while the storage back-end consumes the other end,
        // keeping abort/stall/throttle checks between every chunk.
        let (pipe_reader, mut pipe_writer) = tokio::io::duplex(2 * CHUNK_SIZE);
        let put_fut = self.storage.put(user, pipe_reader, &path, offset);
        let pump_fut = async {
            let mut buf = vec![0_u8; CHUNK_SIZE];
            let mut decoder = if data_type == DataType::Ascii { Some(CrlfToLf::new()) } else { None };
            let mut out = Vec::with_capacity(CHUNK_SIZE);
            loop {
                let n = tokio::select! {
                    biased;
                    _ = abort_rx.recv() => return Err(TransferError::Aborted),
                    r = socket.read(&mut buf) => r.map_err(TransferError::Io)?,
                    _ = sleep(self.stall_timeout) => return Err(TransferError::Stalled),
                };
                if n == 0 {
                    break;
                }
                if let Some(throttle) = &self.throttle {
                    throttle.pace(n).await;
                }
                let chunk: &[u8] = match decoder.as_mut() {
                    Some(decoder) => {
                        decoder.translate(&buf[..n], &mut out);
                        &out
                    }
                    None => &buf[..n],
                };
                pipe_writer.write_all(chunk).await.map_err(TransferError::Io)?;
            }
            if let Some(mut decoder) = decoder {
                out.clear();
                decoder.finish(&mut out);
                if !out.is_empty() {
                    pipe_writer.write_all(&out).await.map_err(TransferError::Io)?;
                }
            }
            // Dropping the writer signals EOF to the storage side.
            drop(pipe_writer);
            Ok(())
        };
        let (outcome, put_res) = tokio::join!(pump_fut, put_fut);
        self.busy.store(false, Ordering::SeqCst);

        match (outcome, put_res) {
            (Err(TransferError::Aborted), _) => {
                info!(self.logger, "Store aborted");
            }
            (_, Err(err)) => {
                let _ = self.tx_control.send(ControlChanMsg::StorageError(err)).await;
            }
            (Err(_), _) => {
                let _ = self.tx_control.send(ControlChanMsg::ConnectionReset).await;
            }
            (Ok(()), Ok(bytes)) => {
                info!(self.logger, "Stored {} bytes", bytes);
                let _ = self.tx_control.send(ControlChanMsg::WrittenData { bytes }).await;
            }
        }
    }

    async fn exec_listing(
        &self,
        listing: Result<std::io::Cursor<Vec<u8>>, crate::storage::Error>,
        socket: &mut Box<dyn AsyncStream>,
        abort_rx: &mut Receiver<()>,
    ) {
        let mut cursor = match listing {
            Ok(cursor) => cursor,
            Err(err) => {
                let _ = self.tx_control.send(ControlChanMsg::StorageError(err)).await;
                return;
            }
        };
        let _ = self.tx_control.send(ControlChanMsg::SendingData).await;
        self.busy.store(true, Ordering::SeqCst);
        // Listings are produced with CRLF line endings already.
        let result = self.stream_out(&mut cursor, socket, false, abort_rx).await;
        self.busy.store(false, Ordering::SeqCst);
        match result {
            Ok(_) => {
                let _ = socket.shutdown().await;
                let _ = self.tx_control.send(ControlChanMsg::DirectorySuccessfullyListed).await;
            }
            Err(TransferError::Aborted) => {}
            Err(_) => {
                let _ = self.tx_control.send(ControlChanMsg::ConnectionReset).await;
            }
        }
    }

    // The outbound streaming loop shared by retrieves and listings.
    async fn stream_out<R>(&self, reader: &mut R, socket: &mut Box<dyn AsyncStream>, ascii: bool, abort_rx: &mut Receiver<()>) -> Result<u64, TransferError>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
    {
        let mut buf = vec![0_u8; CHUNK_SIZE];
        let mut encoder = if ascii { Some(LfToCrlf::new()) } else { None };
        let mut out = Vec::with_capacity(2 * CHUNK_SIZE);
        let mut total: u64 = 0;
        loop {
            let n = tokio::select! {
                biased;
                _ = abort_rx.recv() => return Err(TransferError::Aborted),
                r = reader.read(&mut buf) => r.map_err(TransferError::Io)?,
                _ = sleep(self.stall_timeout) => return Err(TransferError::Stalled),
            };
            if n == 0 {
                break;
            }
            if let Some(throttle) = &self.throttle {
                throttle.pace(n).await;
            }
            let chunk: &[u8] = match encoder.as_mut() {
                Some(encoder) => {
                    encoder.translate(&buf[..n], &mut out);
                    &out
                }
                None => &buf[..n],
            };
            match timeout(self.stall_timeout, socket.write_all(chunk)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(TransferError::Io(err)),
                Err(_) => return Err(TransferError::Stalled),
            }
            total += n as u64;
        }
        Ok(total)
    }
}

// Outbound ASCII translation: every bare LF becomes CRLF. Carries a flag
// across chunk boundaries so a CRLF split over two chunks is not doubled.
struct LfToCrlf {
    last_was_cr: bool,
}

impl LfToCrlf {
    fn new() -> Self {
        LfToCrlf { last_was_cr: false }
    }

    fn translate(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.clear();
        for &b in input {
            if b == b'\n' && !self.last_was_cr {
                out.push(b'\r');
            }
            out.push(b);
            self.last_was_cr = b == b'\r';
        }
    }
}

// Inbound ASCII translation: every CRLF becomes LF, lone CRs pass through.
// A CR at a chunk boundary is held back until the next chunk decides.
struct CrlfToLf {
    pending_cr: bool,
}

impl CrlfToLf {
    fn new() -> Self {
        CrlfToLf { pending_cr: false }
    }

    fn translate(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.clear();
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    out.push(b'\n');
                    continue;
                }
                out.push(b'\r');
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }
    }

    fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            out.push(b'\r');
            self.pending_cr = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lf_to_crlf_chunks(chunks: &[&[u8]]) -> Vec<u8> {
        let mut enc = LfToCrlf::new();
        let mut result = Vec::new();
        let mut out = Vec::new();
        for chunk in chunks {
            enc.translate(chunk, &mut out);
            result.extend_from_slice(&out);
        }
        result
    }

    fn crlf_to_lf_chunks(chunks: &[&[u8]]) -> Vec<u8> {
        let mut dec = CrlfToLf::new();
        let mut result = Vec::new();
        let mut out = Vec::new();
        for chunk in chunks {
            dec.translate(chunk, &mut out);
            result.extend_from_slice(&out);
        }
        out.clear();
        dec.finish(&mut out);
        result.extend_from_slice(&out);
        result
    }

    #[test]
    fn lf_becomes_crlf() {
        assert_eq!(lf_to_crlf_chunks(&[b"a\nb\n"]), b"a\r\nb\r\n".to_vec());
    }

    #[test]
    fn existing_crlf_is_not_doubled() {
        assert_eq!(lf_to_crlf_chunks(&[b"a\r\nb"]), b"a\r\nb".to_vec());
    }

    #[test]
    fn crlf_split_across_chunks_is_not_doubled() {
        assert_eq!(lf_to_crlf_chunks(&[b"a\r", b"\nb"]), b"a\r\nb".to_vec());
    }

    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(crlf_to_lf_chunks(&[b"a\r\nb\r\n"]), b"a\nb\n".to_vec());
    }

    #[test]
    fn crlf_split_across_chunks_becomes_lf() {
        assert_eq!(crlf_to_lf_chunks(&[b"a\r", b"\nb"]), b"a\nb".to_vec());
    }

    #[test]
    fn lone_cr_passes_through() {
        assert_eq!(crlf_to_lf_chunks(&[b"a\rb"]), b"a\rb".to_vec());
        assert_eq!(crlf_to_lf_chunks(&[b"a\r"]), b"a\r".to_vec());
    }
}
