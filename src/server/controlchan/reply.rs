/// A reply to the FTP client
#[derive(Debug, Clone)]
pub enum Reply {
    None,
    CodeAndMsg {
        code: ReplyCode,
        msg: String,
    },
    MultiLine {
        code: ReplyCode,
        lines: Vec<String>,
    },
    // Several complete replies sent back to back in order. The protocol
    // mandates this for ABOR during a transfer: first 426 for the torn-down
    // transfer, then 226 for the ABOR itself.
    Sequence(Vec<Reply>),
}

/// The reply codes according to RFC 959.
//
// Codes between 100 and 199 indicate marks; codes between 200 and 399
// indicate acceptance; codes between 400 and 599 indicate rejection. The
// second digit is 0 for syntax, 2 for connections, 3 for authentication and
// 5 for the filesystem. Clients mostly only look at the first digit, except
// for the specially formatted 227 and 257 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
#[allow(dead_code)]
pub enum ReplyCode {
    NoReply = 0,

    RestartMarker = 110,
    InNMinutes = 120,
    ConnectionAlreadyOpen = 125,
    FileStatusOkay = 150,

    CommandOkay = 200,
    CommandOkayNotImplemented = 202,
    SystemStatus = 211,
    DirectoryStatus = 212,
    FileStatus = 213,
    HelpMessage = 214,
    SystemType = 215,
    ServiceReady = 220,
    ClosingControlConnection = 221,
    DataConnectionOpen = 225,
    ClosingDataConnection = 226,
    EnteringPassiveMode = 227,
    EnteringExtendedPassiveMode = 229,
    UserLoggedIn = 230,
    AuthOkayNoDataNeeded = 234,
    FileActionOkay = 250,
    DirCreated = 257,

    NeedPassword = 331,
    NeedAccount = 332,
    FileActionPending = 350,

    ServiceNotAvailable = 421,
    CantOpenDataConnection = 425,
    ConnectionClosed = 426,
    TransientFileError = 450,
    LocalError = 451,
    OutOfSpace = 452,

    CommandSyntaxError = 500,
    ParameterSyntaxError = 501,
    CommandNotImplemented = 502,
    BadCommandSequence = 503,
    CommandNotImplementedForParameter = 504,
    NotLoggedIn = 530,
    NeedAccountToStore = 532,
    FileError = 550,
    PageTypeUnknown = 551,
    ExceededStorageAllocation = 552,
    BadFileName = 553,
}

impl Reply {
    pub fn new(code: ReplyCode, message: &str) -> Self {
        Reply::CodeAndMsg {
            code,
            msg: message.to_string(),
        }
    }

    pub fn new_with_string(code: ReplyCode, msg: String) -> Self {
        Reply::CodeAndMsg { code, msg }
    }

    pub fn new_multiline<I>(code: ReplyCode, lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: std::fmt::Display,
    {
        Reply::MultiLine {
            code,
            lines: lines.into_iter().map(|item| format!("{}", item)).collect(),
        }
    }

    // A no-reply
    pub fn none() -> Self {
        Reply::None
    }

    // The code that decides the fate of the control connection; for a
    // sequence that is the final reply's code.
    pub fn last_code(&self) -> ReplyCode {
        match self {
            Reply::None => ReplyCode::NoReply,
            Reply::CodeAndMsg { code, .. } | Reply::MultiLine { code, .. } => *code,
            Reply::Sequence(replies) => replies.last().map(|r| r.last_code()).unwrap_or(ReplyCode::NoReply),
        }
    }
}
