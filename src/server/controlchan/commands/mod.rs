//! The handler implementations for the individual FTP commands.

mod abor;
mod acct;
mod auth;
mod cdup;
mod cwd;
mod dele;
mod feat;
mod help;
mod list;
mod mdtm;
mod mkd;
mod mlsd;
mod mlst;
mod mode;
mod nlst;
mod noop;
mod opts;
mod pass;
mod pasv;
mod pbsz;
mod port;
mod prot;
mod pwd;
mod quit;
mod rest;
mod retr;
mod rmd;
mod rnfr;
mod rnto;
mod size;
mod stat;
mod stor;
mod stru;
mod syst;
mod type_;
mod user;

pub(crate) use abor::Abor;
pub(crate) use acct::Acct;
pub(crate) use auth::Auth;
pub(crate) use cdup::Cdup;
pub(crate) use cwd::Cwd;
pub(crate) use dele::Dele;
pub(crate) use feat::Feat;
pub(crate) use help::Help;
pub(crate) use list::List;
pub(crate) use mdtm::Mdtm;
pub(crate) use mkd::Mkd;
pub(crate) use mlsd::Mlsd;
pub(crate) use mlst::Mlst;
pub(crate) use mode::Mode;
pub(crate) use nlst::Nlst;
pub(crate) use noop::Noop;
pub(crate) use opts::Opts;
pub(crate) use pass::Pass;
pub(crate) use pasv::{Epsv, Pasv};
pub(crate) use pbsz::Pbsz;
pub(crate) use port::{Eprt, Port};
pub(crate) use prot::Prot;
pub(crate) use pwd::Pwd;
pub(crate) use quit::Quit;
pub(crate) use rest::Rest;
pub(crate) use retr::Retr;
pub(crate) use rmd::Rmd;
pub(crate) use rnfr::Rnfr;
pub(crate) use rnto::Rnto;
pub(crate) use size::Size;
pub(crate) use stat::Stat;
pub(crate) use stor::{Appe, Stor};
pub(crate) use stru::Stru;
pub(crate) use syst::Syst;
pub(crate) use type_::Type;
pub(crate) use user::User;

/// The parameter to the `AUTH` command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AuthParam {
    /// `AUTH SSL`, historic and refused.
    Ssl,
    /// `AUTH TLS`
    Tls,
}

/// The parameter to the `PROT` command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProtParam {
    /// `PROT C`: data channel in the clear.
    Clear,
    /// `PROT S`: integrity protected, not supported.
    Safe,
    /// `PROT E`: confidentiality without integrity, not supported.
    Confidential,
    /// `PROT P`: private, data channel under TLS.
    Private,
}

/// The parameter to the `MODE` command. Only `Stream` is supported.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ModeParam {
    /// MODE S
    Stream,
    /// MODE B
    Block,
    /// MODE C
    Compressed,
}

/// The parameter to the `STRU` command. Only `File` is supported.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StruParam {
    /// STRU F
    File,
    /// STRU R
    Record,
    /// STRU P
    Page,
}

/// The parameter to the `OPTS` command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Opt {
    /// `OPTS UTF8 ON|OFF`. We are always in UTF-8 mode.
    Utf8 {
        /// Whether the client asked to switch it on or off.
        on: bool,
    },
}
