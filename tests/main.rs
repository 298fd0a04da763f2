#![allow(missing_docs)]

use async_ftp::FtpStream;
use ftpforge::auth::{AuthenticationError, Authenticator, Credentials, DefaultUser};
use ftpforge::options::{Backend, ThrottlePolicy};
use ftpforge::storage::Filesystem;
use ftpforge::{Server, ServerBuilder};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

static TESTPORT: AtomicU16 = AtomicU16::new(0);

#[derive(Clone, Copy, Debug)]
enum BackendKind {
    Multiplexed,
    ThreadPerSession,
    ProcessPerSession,
}

struct Harness {
    root: PathBuf,
    _tempdir: tempfile::TempDir,
    addr: String,
    shutdown: Option<ftpforge::ShutdownHandle>,
}

fn backend_for(kind: BackendKind, root: &std::path::Path) -> Backend {
    match kind {
        BackendKind::Multiplexed => Backend::Multiplexed,
        BackendKind::ThreadPerSession => Backend::ThreadPerSession,
        BackendKind::ProcessPerSession => Backend::ProcessPerSession {
            helper: env!("CARGO_BIN_EXE_ftpforge-worker").into(),
            args: vec![root.as_os_str().to_os_string()],
            ports_per_worker: 8,
        },
    }
}

async fn custom_server_harness<S>(s: S) -> Harness
where
    S: FnOnce(PathBuf) -> ServerBuilder<Filesystem, DefaultUser>,
{
    let seq = TESTPORT.fetch_add(1, Ordering::Relaxed);
    let port = 2200 + seq;
    let passive_low = 50000 + seq * 20;
    let addr = format!("127.0.0.1:{}", port);
    let tempdir = tempfile::TempDir::new().unwrap();
    let root = tempdir.path().to_path_buf();

    let server = s(root.clone()).passive_ports(passive_low..=passive_low + 19).build().unwrap();
    let shutdown = server.shutdown_handle();
    let listen_addr = addr.clone();
    tokio::spawn(async move {
        let _ = server.listen(listen_addr).await;
    });
    while FtpStream::connect(&addr).await.is_err() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Harness {
        root,
        addr,
        _tempdir: tempdir,
        shutdown: Some(shutdown),
    }
}

async fn backend_harness(kind: BackendKind) -> Harness {
    custom_server_harness(|root| {
        let backend = backend_for(kind, &root);
        Server::with_fs(root).backend(backend)
    })
    .await
}

#[fixture]
async fn harness() -> Harness {
    custom_server_harness(Server::with_fs).await
}

fn ensure_login_required<T: Debug>(r: async_ftp::types::Result<T>) {
    let err = r.unwrap_err().to_string();
    if !err.contains("530 Please authenticate") {
        panic!("Could execute command without logging in: {}", err);
    }
}

// A scripted control channel client for the protocol details async_ftp does
// not expose.
struct RawClient {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl RawClient {
    async fn connect(addr: &str) -> RawClient {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = RawClient { stream, buf: Vec::new() };
        let greeting = client.read_reply().await;
        assert!(greeting.starts_with("220"), "unexpected greeting: {}", greeting);
        client
    }

    async fn login(addr: &str) -> RawClient {
        let mut client = RawClient::connect(addr).await;
        assert!(client.cmd("USER test").await.starts_with("331"));
        assert!(client.cmd("PASS test").await.starts_with("230"));
        client
    }

    async fn send(&mut self, line: &str) {
        self.stream.write_all(format!("{}\r\n", line).as_bytes()).await.unwrap();
    }

    async fn cmd(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_reply().await
    }

    // Reads exactly one reply, single or multi line. Replies sent back to
    // back, like the 426/226 pair after ABOR, are read with two calls.
    async fn read_reply(&mut self) -> String {
        loop {
            if let Some(reply) = Self::take_reply(&mut self.buf) {
                return reply;
            }
            let mut chunk = [0_u8; 1024];
            let n = self.stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed while waiting for a reply");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn take_reply(buf: &mut Vec<u8>) -> Option<String> {
        let text = String::from_utf8_lossy(buf).to_string();
        let mut consumed = 0;
        let mut lines: Vec<&str> = Vec::new();
        for line in text.split_inclusive("\r\n") {
            if !line.ends_with("\r\n") {
                return None;
            }
            consumed += line.len();
            let line = &line[..line.len() - 2];
            lines.push(line);
            let bytes = line.as_bytes();
            let is_final = bytes.len() >= 4 && bytes[..3].iter().all(u8::is_ascii_digit) && bytes[3] == b' ';
            let is_bare_code = bytes.len() == 3 && bytes.iter().all(u8::is_ascii_digit);
            if is_final || is_bare_code {
                let reply = lines.join("\r\n");
                buf.drain(..consumed);
                return Some(reply);
            }
        }
        None
    }

    // Waits for the server to close the connection.
    async fn expect_eof(&mut self) {
        let mut chunk = [0_u8; 1024];
        loop {
            match self.stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    }
}

fn parse_pasv_port(reply: &str) -> u16 {
    // 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)
    let start = reply.find('(').unwrap() + 1;
    let end = reply.find(')').unwrap();
    let parts: Vec<&str> = reply[start..end].split(',').collect();
    let p1: u16 = parts[4].parse().unwrap();
    let p2: u16 = parts[5].parse().unwrap();
    p1 * 256 + p2
}

fn parse_epsv_port(reply: &str) -> u16 {
    // 229 Entering Extended Passive Mode (|||port|)
    let start = reply.find("(|||").unwrap() + 4;
    let end = reply.rfind("|)").unwrap();
    reply[start..end].parse().unwrap()
}

async fn read_to_end(mut stream: TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    stream.read_to_end(&mut data).await.unwrap();
    data
}

// The core flows must behave identically on every session backend.

#[rstest]
#[case::multiplexed(BackendKind::Multiplexed)]
#[case::thread_per_session(BackendKind::ThreadPerSession)]
#[case::process_per_session(BackendKind::ProcessPerSession)]
#[tokio::test(flavor = "multi_thread")]
async fn stores_and_retrieves_a_file(#[case] kind: BackendKind) {
    let harness = backend_harness(kind).await;
    let mut data = vec![0_u8; 64 * 1024];
    getrandom::fill(&mut data).unwrap();

    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    ftp_stream.login("test", "test").await.unwrap();
    let mut reader = std::io::Cursor::new(data.clone());
    ftp_stream.put("data.bin", &mut reader).await.unwrap();

    let remote = ftp_stream.simple_retr("data.bin").await.unwrap().into_inner();
    assert_eq!(remote, data);
    assert_eq!(std::fs::read(harness.root.join("data.bin")).unwrap(), data);
}

#[rstest]
#[case::multiplexed(BackendKind::Multiplexed)]
#[case::thread_per_session(BackendKind::ThreadPerSession)]
#[case::process_per_session(BackendKind::ProcessPerSession)]
#[tokio::test(flavor = "multi_thread")]
async fn lists_and_manages_directories(#[case] kind: BackendKind) {
    let harness = backend_harness(kind).await;
    std::fs::write(harness.root.join("test.txt"), b"hello").unwrap();

    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    ftp_stream.login("test", "test").await.unwrap();

    let list = ftp_stream.list(None).await.unwrap();
    assert!(list.iter().any(|entry| entry.contains("test.txt")), "LIST did not show test.txt: {:?}", list);

    ftp_stream.mkdir("subdir").await.unwrap();
    assert!(std::fs::metadata(harness.root.join("subdir")).unwrap().is_dir());

    let mut names = ftp_stream.nlst(None).await.unwrap();
    names.sort();
    assert_eq!(names, vec!["subdir", "test.txt"]);

    ftp_stream.rename("test.txt", "renamed.txt").await.unwrap();
    assert!(harness.root.join("renamed.txt").is_file());

    ftp_stream.rm("renamed.txt").await.unwrap();
    ftp_stream.rmdir("subdir").await.unwrap();
    assert_eq!(ftp_stream.nlst(None).await.unwrap(), Vec::<String>::new());
}

#[rstest]
#[case::multiplexed(BackendKind::Multiplexed)]
#[case::thread_per_session(BackendKind::ThreadPerSession)]
#[case::process_per_session(BackendKind::ProcessPerSession)]
#[tokio::test(flavor = "multi_thread")]
async fn extended_passive_mode_works(#[case] kind: BackendKind) {
    let harness = backend_harness(kind).await;
    std::fs::write(harness.root.join("a.txt"), b"x").unwrap();

    let mut client = RawClient::login(&harness.addr).await;
    let reply = client.cmd("EPSV").await;
    assert!(reply.starts_with("229"), "unexpected EPSV reply: {}", reply);
    let port = parse_epsv_port(&reply);

    let data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    let reply = client.cmd("NLST").await;
    assert!(reply.starts_with("150"), "unexpected NLST reply: {}", reply);
    let data = read_to_end(data_stream).await;
    assert_eq!(String::from_utf8(data).unwrap(), "a.txt\r\n");
    assert!(client.read_reply().await.starts_with("226"));
}

#[rstest]
#[case::multiplexed(BackendKind::Multiplexed)]
#[case::thread_per_session(BackendKind::ThreadPerSession)]
#[case::process_per_session(BackendKind::ProcessPerSession)]
#[tokio::test(flavor = "multi_thread")]
async fn ascii_mode_translates_line_endings(#[case] kind: BackendKind) {
    let harness = backend_harness(kind).await;
    let mut client = RawClient::login(&harness.addr).await;
    assert!(client.cmd("TYPE A").await.starts_with("200"));

    // Inbound: CRLF on the wire becomes LF in storage.
    let port = parse_pasv_port(&client.cmd("PASV").await);
    let mut data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("STOR lines.txt").await.starts_with("150"));
    data_stream.write_all(b"one\r\ntwo\r\n").await.unwrap();
    drop(data_stream);
    assert!(client.read_reply().await.starts_with("226"));
    assert_eq!(std::fs::read(harness.root.join("lines.txt")).unwrap(), b"one\ntwo\n");

    // Outbound: LF in storage becomes CRLF on the wire.
    let port = parse_pasv_port(&client.cmd("PASV").await);
    let data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("RETR lines.txt").await.starts_with("150"));
    let data = read_to_end(data_stream).await;
    assert_eq!(data, b"one\r\ntwo\r\n");
    assert!(client.read_reply().await.starts_with("226"));
}

// The remaining tests exercise protocol details on the default backend.

#[rstest]
#[awt]
#[tokio::test]
async fn login_is_required_for_file_commands(#[future] harness: Harness) {
    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    ensure_login_required(ftp_stream.list(None).await);
    ensure_login_required(ftp_stream.pwd().await);
    ensure_login_required(ftp_stream.mkdir("nope").await);
    ftp_stream.login("hoi", "jij").await.unwrap();
    assert_eq!(ftp_stream.pwd().await.unwrap(), "/");
}

#[rstest]
#[awt]
#[tokio::test]
async fn feat_syst_and_unknown_commands(#[future] harness: Harness) {
    let mut client = RawClient::connect(&harness.addr).await;
    let feat = client.cmd("FEAT").await;
    assert!(feat.starts_with("211-"), "unexpected FEAT reply: {}", feat);
    for feature in ["SIZE", "MDTM", "MLSD", "EPSV", "REST STREAM"] {
        assert!(feat.contains(feature), "FEAT misses {}: {}", feature, feat);
    }
    assert!(client.cmd("BOGUS").await.starts_with("500"));
    let mut client = RawClient::login(&harness.addr).await;
    assert!(client.cmd("SYST").await.starts_with("215"));
    assert!(client.cmd("STRU F").await.starts_with("200"));
    assert!(client.cmd("STRU R").await.starts_with("504"));
    assert!(client.cmd("MODE S").await.starts_with("200"));
    assert!(client.cmd("MODE B").await.starts_with("504"));
}

#[rstest]
#[awt]
#[tokio::test]
async fn blank_command_lines_are_ignored(#[future] harness: Harness) {
    let mut client = RawClient::login(&harness.addr).await;
    // The blank line must produce no reply at all; NOOP answers first.
    client.stream.write_all(b"\r\nNOOP\r\n").await.unwrap();
    let reply = client.read_reply().await;
    assert!(reply.starts_with("200"), "unexpected reply: {}", reply);
}

#[rstest]
#[awt]
#[tokio::test]
async fn transfers_need_a_negotiated_data_channel(#[future] harness: Harness) {
    std::fs::write(harness.root.join("f.txt"), b"x").unwrap();
    let mut client = RawClient::login(&harness.addr).await;
    let reply = client.cmd("RETR f.txt").await;
    assert_eq!(reply, "425 Use PORT or PASV first.");
}

#[rstest]
#[awt]
#[tokio::test]
async fn active_mode_connects_back_to_the_client(#[future] harness: Harness) {
    std::fs::write(harness.root.join("a.txt"), b"x").unwrap();
    let mut client = RawClient::login(&harness.addr).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reply = client.cmd(&format!("PORT 127,0,0,1,{},{}", port >> 8, port & 0xff)).await;
    assert!(reply.starts_with("200"), "unexpected PORT reply: {}", reply);

    client.send("NLST").await;
    let (data_stream, _) = listener.accept().await.unwrap();
    assert!(client.read_reply().await.starts_with("150"));
    let data = read_to_end(data_stream).await;
    assert_eq!(String::from_utf8(data).unwrap(), "a.txt\r\n");
    assert!(client.read_reply().await.starts_with("226"));
}

#[rstest]
#[awt]
#[tokio::test]
async fn rest_offset_applies_to_exactly_one_transfer(#[future] harness: Harness) {
    std::fs::write(harness.root.join("greeting.txt"), b"hello world").unwrap();
    let mut client = RawClient::login(&harness.addr).await;

    let port = parse_pasv_port(&client.cmd("PASV").await);
    let data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("REST 6").await.starts_with("350"));
    assert!(client.cmd("RETR greeting.txt").await.starts_with("150"));
    assert_eq!(read_to_end(data_stream).await, b"world");
    assert!(client.read_reply().await.starts_with("226"));

    // The offset was consumed; the next transfer starts at zero.
    let port = parse_pasv_port(&client.cmd("PASV").await);
    let data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("RETR greeting.txt").await.starts_with("150"));
    assert_eq!(read_to_end(data_stream).await, b"hello world");
    assert!(client.read_reply().await.starts_with("226"));
}

#[rstest]
#[awt]
#[tokio::test]
async fn rest_offset_is_dropped_by_an_intervening_command(#[future] harness: Harness) {
    std::fs::write(harness.root.join("greeting.txt"), b"hello world").unwrap();
    let mut client = RawClient::login(&harness.addr).await;
    assert!(client.cmd("REST 6").await.starts_with("350"));
    assert!(client.cmd("NOOP").await.starts_with("200"));

    let port = parse_pasv_port(&client.cmd("PASV").await);
    let data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("RETR greeting.txt").await.starts_with("150"));
    assert_eq!(read_to_end(data_stream).await, b"hello world");
    assert!(client.read_reply().await.starts_with("226"));
}

#[rstest]
#[awt]
#[tokio::test]
async fn rename_source_is_dropped_by_an_intervening_command(#[future] harness: Harness) {
    std::fs::write(harness.root.join("from.txt"), b"x").unwrap();
    let mut client = RawClient::login(&harness.addr).await;
    assert!(client.cmd("RNFR from.txt").await.starts_with("350"));
    assert!(client.cmd("NOOP").await.starts_with("200"));
    let reply = client.cmd("RNTO to.txt").await;
    assert!(reply.starts_with("503"), "unexpected RNTO reply: {}", reply);
    assert!(harness.root.join("from.txt").is_file());
}

#[rstest]
#[awt]
#[tokio::test]
async fn appe_appends_to_an_existing_file(#[future] harness: Harness) {
    std::fs::write(harness.root.join("log.txt"), b"hello ").unwrap();
    let mut client = RawClient::login(&harness.addr).await;

    let port = parse_pasv_port(&client.cmd("PASV").await);
    let mut data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("APPE log.txt").await.starts_with("150"));
    data_stream.write_all(b"world").await.unwrap();
    drop(data_stream);
    assert!(client.read_reply().await.starts_with("226"));
    assert_eq!(std::fs::read(harness.root.join("log.txt")).unwrap(), b"hello world");
}

#[rstest]
#[awt]
#[tokio::test]
async fn rest_is_refused_by_appe(#[future] harness: Harness) {
    std::fs::write(harness.root.join("log.txt"), b"hello ").unwrap();
    let mut client = RawClient::login(&harness.addr).await;
    assert!(client.cmd("REST 3").await.starts_with("350"));
    let reply = client.cmd("APPE log.txt").await;
    assert!(reply.starts_with("450"), "unexpected APPE reply: {}", reply);

    // The refusal consumed the offset; APPE now just wants a data channel.
    let reply = client.cmd("APPE log.txt").await;
    assert_eq!(reply, "425 Use PORT or PASV first.");
    assert_eq!(std::fs::read(harness.root.join("log.txt")).unwrap(), b"hello ");
}

#[rstest]
#[awt]
#[tokio::test]
async fn size_and_mdtm(#[future] harness: Harness) {
    std::fs::write(harness.root.join("f.txt"), b"hello ftpforge").unwrap();
    let modified = std::fs::metadata(harness.root.join("f.txt")).unwrap().modified().unwrap();

    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    ftp_stream.login("hoi", "jij").await.unwrap();
    assert_eq!(ftp_stream.size("f.txt").await.unwrap(), Some(14));
    let mdtm = ftp_stream.mdtm("f.txt").await.unwrap().unwrap();
    assert_eq!(mdtm.to_rfc2822(), chrono::DateTime::<chrono::Utc>::from(modified).to_rfc2822());
}

#[rstest]
#[awt]
#[tokio::test]
async fn mlsd_and_mlst_report_facts(#[future] harness: Harness) {
    std::fs::write(harness.root.join("file.txt"), b"twelve bytes").unwrap();
    std::fs::create_dir(harness.root.join("dir")).unwrap();

    let mut client = RawClient::login(&harness.addr).await;
    let port = parse_pasv_port(&client.cmd("PASV").await);
    let data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("MLSD").await.starts_with("150"));
    let listing = String::from_utf8(read_to_end(data_stream).await).unwrap();
    assert!(client.read_reply().await.starts_with("226"));

    let file_line = listing.lines().find(|l| l.ends_with(" file.txt")).expect("no file.txt entry");
    assert!(file_line.contains("type=file;"), "bad facts: {}", file_line);
    assert!(file_line.contains("size=12;"), "bad facts: {}", file_line);
    let dir_line = listing.lines().find(|l| l.ends_with(" dir")).expect("no dir entry");
    assert!(dir_line.contains("type=dir;"), "bad facts: {}", dir_line);

    let reply = client.cmd("MLST file.txt").await;
    assert!(reply.starts_with("250-Listing"), "unexpected MLST reply: {}", reply);
    assert!(reply.contains("type=file;"), "bad MLST facts: {}", reply);
    assert!(reply.contains(" /file.txt"), "MLST should name the full path: {}", reply);
}

#[rstest]
#[awt]
#[tokio::test]
async fn foreign_passive_peers_are_rejected(#[future] harness: Harness) {
    std::fs::write(harness.root.join("f.txt"), b"x").unwrap();
    let mut client = RawClient::login(&harness.addr).await;
    let port = parse_pasv_port(&client.cmd("PASV").await);

    // Connect to the data port from an address other than the control peer.
    let socket = tokio::net::TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.2:0".parse().unwrap()).unwrap();
    let _data_stream = socket.connect(format!("127.0.0.1:{}", port).parse().unwrap()).await.unwrap();

    let reply = client.read_reply().await;
    assert!(reply.starts_with("425"), "unexpected reply: {}", reply);

    // The channel was torn down; a transfer command cannot use it.
    let reply = client.cmd("RETR f.txt").await;
    assert_eq!(reply, "425 Use PORT or PASV first.");
}

#[tokio::test]
async fn unclaimed_passive_listener_times_out() {
    let harness = custom_server_harness(|root| Server::with_fs(root).data_establish_timeout(Duration::from_millis(200))).await;
    let mut client = RawClient::login(&harness.addr).await;
    let reply = client.cmd("PASV").await;
    assert!(reply.starts_with("227"));
    // Nobody connects; the establish timeout fires.
    let reply = client.read_reply().await;
    assert!(reply.starts_with("425"), "unexpected reply: {}", reply);
}

#[tokio::test]
async fn abort_mid_transfer_gives_426_then_226() {
    #[derive(Debug)]
    struct SlowDown;

    #[async_trait::async_trait]
    impl ThrottlePolicy for SlowDown {
        async fn pace(&self, _bytes: usize) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    let harness = custom_server_harness(|root| Server::with_fs(root).throttle(Arc::new(SlowDown))).await;
    std::fs::write(harness.root.join("big.bin"), vec![0_u8; 1024 * 1024]).unwrap();

    let mut client = RawClient::login(&harness.addr).await;
    let port = parse_pasv_port(&client.cmd("PASV").await);
    let _data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("RETR big.bin").await.starts_with("150"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.send("ABOR").await;
    let first = client.read_reply().await;
    let second = client.read_reply().await;
    assert!(first.starts_with("426"), "expected 426, got: {}", first);
    assert!(second.starts_with("226"), "expected 226, got: {}", second);

    // The session is still usable.
    assert!(client.cmd("NOOP").await.starts_with("200"));
}

#[tokio::test]
async fn a_slow_transfer_outlives_the_idle_timeout() {
    #[derive(Debug)]
    struct SlowDown;

    #[async_trait::async_trait]
    impl ThrottlePolicy for SlowDown {
        async fn pace(&self, _bytes: usize) {
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
    }

    // Eight throttled chunks take well past the idle timeout; only control
    // channel idleness may end the session, not transfer duration.
    let harness = custom_server_harness(|root| {
        Server::with_fs(root)
            .idle_session_timeout(Duration::from_millis(300))
            .throttle(Arc::new(SlowDown))
    })
    .await;
    std::fs::write(harness.root.join("big.bin"), vec![7_u8; 64 * 1024]).unwrap();

    let mut client = RawClient::login(&harness.addr).await;
    let port = parse_pasv_port(&client.cmd("PASV").await);
    let data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    assert!(client.cmd("RETR big.bin").await.starts_with("150"));
    let data = read_to_end(data_stream).await;
    assert_eq!(data.len(), 64 * 1024);
    let reply = client.read_reply().await;
    assert!(reply.starts_with("226"), "unexpected reply: {}", reply);
}

#[tokio::test]
async fn abort_without_a_transfer_gives_225() {
    let harness = custom_server_harness(Server::with_fs).await;
    let mut client = RawClient::login(&harness.addr).await;
    let reply = client.cmd("ABOR").await;
    assert!(reply.starts_with("225"), "unexpected ABOR reply: {}", reply);
}

#[tokio::test]
async fn too_many_failed_logins_close_the_connection() {
    #[derive(Debug)]
    struct RefuseAll;

    #[async_trait::async_trait]
    impl Authenticator<DefaultUser> for RefuseAll {
        async fn authenticate(&self, _username: &str, _creds: &Credentials) -> Result<DefaultUser, AuthenticationError> {
            Err(AuthenticationError::BadPassword)
        }
    }

    let harness = custom_server_harness(|root| ServerBuilder::new(Filesystem::new(root), Arc::new(RefuseAll))).await;
    let mut client = RawClient::connect(&harness.addr).await;
    for _ in 0..2 {
        assert!(client.cmd("USER someone").await.starts_with("331"));
        assert!(client.cmd("PASS wrong").await.starts_with("530"));
    }
    assert!(client.cmd("USER someone").await.starts_with("331"));
    let reply = client.cmd("PASS wrong").await;
    assert!(reply.starts_with("421"), "unexpected reply: {}", reply);
    client.expect_eof().await;
}

#[tokio::test]
async fn idle_sessions_get_a_421() {
    let harness = custom_server_harness(|root| Server::with_fs(root).idle_session_timeout(Duration::from_millis(300))).await;
    let mut client = RawClient::connect(&harness.addr).await;
    let reply = client.read_reply().await;
    assert!(reply.starts_with("421"), "unexpected reply: {}", reply);
    client.expect_eof().await;
}

#[rstest]
#[awt]
#[tokio::test]
async fn quit_closes_the_connection(#[future] harness: Harness) {
    let mut client = RawClient::connect(&harness.addr).await;
    let reply = client.cmd("QUIT").await;
    assert!(reply.starts_with("221"), "unexpected reply: {}", reply);
    client.expect_eof().await;
}

#[tokio::test]
async fn graceful_shutdown_notifies_sessions() {
    let mut harness = custom_server_harness(Server::with_fs).await;
    let mut client = RawClient::connect(&harness.addr).await;
    let shutdown = harness.shutdown.take().unwrap();
    let stopper = tokio::spawn(shutdown.stop());
    let reply = client.read_reply().await;
    assert!(reply.starts_with("421"), "unexpected reply: {}", reply);
    client.expect_eof().await;
    stopper.await.unwrap();
}

#[tokio::test]
async fn a_failed_session_start_replies_421() {
    let seq = TESTPORT.fetch_add(1, Ordering::Relaxed);
    let addr = format!("127.0.0.1:{}", 2200 + seq);
    let passive_low = 50000 + seq * 20;
    let tempdir = tempfile::TempDir::new().unwrap();

    // A worker helper that does not exist makes every session start fail.
    let server = Server::with_fs(tempdir.path())
        .backend(Backend::ProcessPerSession {
            helper: "/no/such/helper".into(),
            args: vec![],
            ports_per_worker: 8,
        })
        .passive_ports(passive_low..=passive_low + 19)
        .build()
        .unwrap();
    let listen_addr = addr.clone();
    tokio::spawn(async move {
        let _ = server.listen(listen_addr).await;
    });

    let mut stream = loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => break stream,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    };
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    let reply = String::from_utf8(reply).unwrap();
    assert!(reply.starts_with("421"), "unexpected reply: {}", reply);
}

#[tokio::test]
async fn serves_on_a_prebound_listener() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let seq = TESTPORT.fetch_add(1, Ordering::Relaxed);
    let passive_low = 50000 + seq * 20;

    let tempdir = tempfile::TempDir::new().unwrap();
    std::fs::write(tempdir.path().join("f.txt"), b"prebound").unwrap();
    let server = Server::with_fs(tempdir.path())
        .passive_ports(passive_low..=passive_low + 19)
        .build()
        .unwrap();
    tokio::spawn(async move {
        let _ = server.listen_prebound(listener).await;
    });

    let mut ftp_stream = FtpStream::connect(&addr).await.unwrap();
    ftp_stream.login("hoi", "jij").await.unwrap();
    let remote = ftp_stream.simple_retr("f.txt").await.unwrap().into_inner();
    assert_eq!(remote, b"prebound");
}

#[rstest]
#[awt]
#[tokio::test]
async fn cwd_cdup_and_virtual_paths(#[future] harness: Harness) {
    std::fs::create_dir(harness.root.join("inner")).unwrap();
    std::fs::write(harness.root.join("inner/f.txt"), b"deep").unwrap();

    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    ftp_stream.login("hoi", "jij").await.unwrap();
    ftp_stream.cwd("inner").await.unwrap();
    assert_eq!(ftp_stream.pwd().await.unwrap(), "/inner");
    let remote = ftp_stream.simple_retr("f.txt").await.unwrap().into_inner();
    assert_eq!(remote, b"deep");
    ftp_stream.cdup().await.unwrap();
    assert_eq!(ftp_stream.pwd().await.unwrap(), "/");
    // Dotdot cannot escape the virtual root.
    ftp_stream.cwd("../../..").await.unwrap();
    assert_eq!(ftp_stream.pwd().await.unwrap(), "/");
}

#[rstest]
#[awt]
#[tokio::test]
async fn retr_of_a_missing_file_gives_550(#[future] harness: Harness) {
    let mut client = RawClient::login(&harness.addr).await;
    let port = parse_pasv_port(&client.cmd("PASV").await);
    let _data_stream = TcpStream::connect(format!("127.0.0.1:{}", port)).await.unwrap();
    let reply = client.cmd("RETR no-such-file.txt").await;
    assert!(reply.starts_with("550"), "unexpected reply: {}", reply);
}
