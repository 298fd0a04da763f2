use super::commands::{AuthParam, ModeParam, Opt, ProtParam, StruParam};
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// The transfer type negotiated with `TYPE`. In ASCII mode line endings are
/// translated on the wire; in binary (image) mode bytes pass untouched.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataType {
    /// `TYPE A`
    Ascii,
    /// `TYPE I` (and `TYPE L 8`)
    Binary,
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Binary
    }
}

// A password from a PASS command. Kept out of Debug output so that passwords
// never end up in logs.
#[derive(PartialEq, Eq, Clone)]
pub struct Password(Bytes);

impl Password {
    pub fn new(bytes: Bytes) -> Self {
        Password(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"******\"")
    }
}

// The parsed, typed form of a client command line.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    User {
        username: Bytes,
    },
    Pass {
        password: Password,
    },
    Acct,
    Syst,
    Stat {
        path: Option<Bytes>,
    },
    Type {
        data_type: DataType,
    },
    Stru {
        structure: StruParam,
    },
    Mode {
        mode: ModeParam,
    },
    Help,
    Noop,
    Pasv,
    Epsv,
    Port {
        addr: SocketAddr,
    },
    Eprt {
        addr: SocketAddr,
    },
    Retr {
        path: String,
    },
    Stor {
        path: String,
    },
    Appe {
        path: String,
    },
    List {
        options: Option<String>,
        path: Option<String>,
    },
    Nlst {
        path: Option<String>,
    },
    Mlsd {
        path: Option<String>,
    },
    Mlst {
        path: Option<String>,
    },
    Feat,
    Pwd,
    Cwd {
        path: PathBuf,
    },
    Cdup,
    Opts {
        option: Opt,
    },
    Dele {
        path: String,
    },
    Rmd {
        path: String,
    },
    Mkd {
        path: PathBuf,
    },
    Quit,
    Abor,
    Rnfr {
        file: PathBuf,
    },
    Rnto {
        file: PathBuf,
    },
    Auth {
        protocol: AuthParam,
    },
    Pbsz,
    Prot {
        param: ProtParam,
    },
    Size {
        file: PathBuf,
    },
    Rest {
        offset: u64,
    },
    Mdtm {
        file: PathBuf,
    },
}
