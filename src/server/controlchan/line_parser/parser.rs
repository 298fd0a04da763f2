use super::error::{ParseError, ParseErrorKind};
use crate::server::controlchan::command::{Command, DataType, Password};
use crate::server::controlchan::commands::{AuthParam, ModeParam, Opt, ProtParam, StruParam};
use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str;

/// Parses one complete command line, including its line terminator, into a
/// [`Command`].
pub fn parse<T>(line: T) -> Result<Command, ParseError>
where
    T: Into<Bytes>,
{
    let line: Bytes = line.into();
    let line = strip_eol(line)?;
    if line.is_empty() {
        return Err(ParseErrorKind::InvalidCommand.into());
    }

    let (verb, params) = match line.iter().position(|&b| b == b' ') {
        Some(pos) => (line.slice(0..pos), line.slice(pos + 1..)),
        None => (line.clone(), Bytes::new()),
    };
    if !verb.is_ascii() {
        return Err(ParseErrorKind::InvalidCommand.into());
    }
    let verb = verb.to_ascii_uppercase();

    let command = match &verb[..] {
        b"USER" => Command::User {
            username: required_bytes(&params)?,
        },
        b"PASS" => Command::Pass {
            password: Password::new(params),
        },
        b"ACCT" => Command::Acct,
        b"SYST" => Command::Syst,
        b"STAT" => Command::Stat {
            path: if params.is_empty() { None } else { Some(params) },
        },
        b"TYPE" => Command::Type {
            data_type: parse_type(&required_str(&params)?)?,
        },
        b"STRU" => match required_str(&params)?.to_uppercase().as_str() {
            "F" => Command::Stru { structure: StruParam::File },
            "R" => Command::Stru { structure: StruParam::Record },
            "P" => Command::Stru { structure: StruParam::Page },
            _ => return Err(ParseErrorKind::InvalidArgument.into()),
        },
        b"MODE" => match required_str(&params)?.to_uppercase().as_str() {
            "S" => Command::Mode { mode: ModeParam::Stream },
            "B" => Command::Mode { mode: ModeParam::Block },
            "C" => Command::Mode { mode: ModeParam::Compressed },
            _ => return Err(ParseErrorKind::InvalidArgument.into()),
        },
        b"HELP" => Command::Help,
        b"NOOP" => Command::Noop,
        b"PASV" => Command::Pasv,
        // An `EPSV ALL` argument only restricts the client, we can ignore it.
        b"EPSV" => Command::Epsv,
        b"PORT" => Command::Port {
            addr: parse_port(&required_str(&params)?)?,
        },
        b"EPRT" => Command::Eprt {
            addr: parse_eprt(&required_str(&params)?)?,
        },
        b"RETR" => Command::Retr {
            path: required_string(&params)?,
        },
        b"STOR" => Command::Stor {
            path: required_string(&params)?,
        },
        b"APPE" => Command::Appe {
            path: required_string(&params)?,
        },
        b"LIST" => parse_list(&params)?,
        b"NLST" => Command::Nlst {
            path: optional_string(&params)?,
        },
        b"MLSD" => Command::Mlsd {
            path: optional_string(&params)?,
        },
        b"MLST" => Command::Mlst {
            path: optional_string(&params)?,
        },
        b"FEAT" => Command::Feat,
        b"PWD" | b"XPWD" => Command::Pwd,
        b"CWD" | b"XCWD" => Command::Cwd {
            path: required_string(&params)?.into(),
        },
        b"CDUP" => Command::Cdup,
        b"OPTS" => parse_opts(&required_str(&params)?)?,
        b"DELE" => Command::Dele {
            path: required_string(&params)?,
        },
        b"RMD" => Command::Rmd {
            path: required_string(&params)?,
        },
        b"MKD" | b"XMKD" => Command::Mkd {
            path: PathBuf::from(required_string(&params)?),
        },
        b"QUIT" => Command::Quit,
        b"ABOR" => Command::Abor,
        b"RNFR" => Command::Rnfr {
            file: PathBuf::from(required_string(&params)?),
        },
        b"RNTO" => Command::Rnto {
            file: PathBuf::from(required_string(&params)?),
        },
        b"AUTH" => match required_str(&params)?.to_uppercase().as_str() {
            "TLS" => Command::Auth { protocol: AuthParam::Tls },
            "SSL" => Command::Auth { protocol: AuthParam::Ssl },
            _ => return Err(ParseErrorKind::InvalidArgument.into()),
        },
        b"PBSZ" => Command::Pbsz,
        b"PROT" => match required_str(&params)?.to_uppercase().as_str() {
            "C" => Command::Prot { param: ProtParam::Clear },
            "S" => Command::Prot { param: ProtParam::Safe },
            "E" => Command::Prot {
                param: ProtParam::Confidential,
            },
            "P" => Command::Prot { param: ProtParam::Private },
            _ => return Err(ParseErrorKind::InvalidArgument.into()),
        },
        b"SIZE" => Command::Size {
            file: PathBuf::from(required_string(&params)?),
        },
        b"REST" => {
            let offset = required_str(&params)?.parse::<u64>().map_err(|_| ParseErrorKind::InvalidArgument)?;
            Command::Rest { offset }
        }
        b"MDTM" => Command::Mdtm {
            file: PathBuf::from(required_string(&params)?),
        },
        _ => {
            return Err(ParseErrorKind::UnknownCommand {
                command: String::from_utf8_lossy(&verb).to_string(),
            }
            .into());
        }
    };

    Ok(command)
}

// Chops the (CR)LF off the end of the line.
fn strip_eol(line: Bytes) -> Result<Bytes, ParseError> {
    let len = line.len();
    if len == 0 || line[len - 1] != b'\n' {
        return Err(ParseErrorKind::InvalidEol.into());
    }
    let mut end = len - 1;
    if end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    Ok(line.slice(0..end))
}

fn required_bytes(params: &Bytes) -> Result<Bytes, ParseError> {
    if params.is_empty() {
        return Err(ParseErrorKind::InvalidArgument.into());
    }
    Ok(params.clone())
}

fn required_str(params: &Bytes) -> Result<&str, ParseError> {
    if params.is_empty() {
        return Err(ParseErrorKind::InvalidArgument.into());
    }
    str::from_utf8(params).map_err(|_| ParseErrorKind::InvalidUtf8.into())
}

fn required_string(params: &Bytes) -> Result<String, ParseError> {
    required_str(params).map(String::from)
}

fn optional_string(params: &Bytes) -> Result<Option<String>, ParseError> {
    if params.is_empty() {
        return Ok(None);
    }
    Ok(Some(required_string(params)?))
}

fn parse_type(params: &str) -> Result<DataType, ParseError> {
    match params.to_uppercase().as_str() {
        "A" | "A N" => Ok(DataType::Ascii),
        "I" | "L 8" => Ok(DataType::Binary),
        _ => Err(ParseErrorKind::InvalidArgument.into()),
    }
}

// LIST takes optional `ls` style flags before the optional path. We accept
// and ignore the flags since clients like lftp send them unconditionally.
fn parse_list(params: &Bytes) -> Result<Command, ParseError> {
    let text = match optional_string(params)? {
        None => {
            return Ok(Command::List { options: None, path: None });
        }
        Some(text) => text,
    };
    let mut options = Vec::new();
    let mut path_parts = Vec::new();
    for token in text.split_whitespace() {
        if token.starts_with('-') && path_parts.is_empty() {
            options.push(token.to_string());
        } else {
            path_parts.push(token.to_string());
        }
    }
    Ok(Command::List {
        options: if options.is_empty() { None } else { Some(options.join(" ")) },
        path: if path_parts.is_empty() { None } else { Some(path_parts.join(" ")) },
    })
}

fn parse_opts(params: &str) -> Result<Command, ParseError> {
    match params.to_uppercase().as_str() {
        "UTF8" | "UTF8 ON" => Ok(Command::Opts { option: Opt::Utf8 { on: true } }),
        "UTF8 OFF" => Ok(Command::Opts { option: Opt::Utf8 { on: false } }),
        _ => Err(ParseErrorKind::InvalidArgument.into()),
    }
}

// PORT h1,h2,h3,h4,p1,p2
fn parse_port(params: &str) -> Result<SocketAddr, ParseError> {
    let octets: Vec<u8> = params
        .split(',')
        .map(|s| s.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| ParseErrorKind::InvalidArgument)?;
    if octets.len() != 6 {
        return Err(ParseErrorKind::InvalidArgument.into());
    }
    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = (u16::from(octets[4]) << 8) | u16::from(octets[5]);
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

// EPRT |proto|addr|port| where the delimiter is the first character.
fn parse_eprt(params: &str) -> Result<SocketAddr, ParseError> {
    let delim = params.chars().next().ok_or(ParseErrorKind::InvalidArgument)?;
    let parts: Vec<&str> = params.split(delim).collect();
    // Splitting "|1|ip|port|" yields ["", "1", "ip", "port", ""].
    if parts.len() < 4 {
        return Err(ParseErrorKind::InvalidArgument.into());
    }
    let port: u16 = parts[3].parse().map_err(|_| ParseErrorKind::InvalidArgument)?;
    let ip: IpAddr = match parts[1] {
        "1" => IpAddr::V4(parts[2].parse::<Ipv4Addr>().map_err(|_| ParseErrorKind::InvalidArgument)?),
        "2" => IpAddr::V6(parts[2].parse::<Ipv6Addr>().map_err(|_| ParseErrorKind::InvalidArgument)?),
        _ => return Err(ParseErrorKind::InvalidArgument.into()),
    };
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(line: &str) -> Command {
        parse(Bytes::copy_from_slice(line.as_bytes())).unwrap()
    }

    fn parse_err(line: &str) -> ParseError {
        parse(Bytes::copy_from_slice(line.as_bytes())).unwrap_err()
    }

    #[test]
    fn parse_user_cmd_crnl() {
        assert_eq!(
            parse_ok("USER Dolores\r\n"),
            Command::User {
                username: Bytes::from_static(b"Dolores")
            }
        );
    }

    #[test]
    fn parse_user_lowercase_verb() {
        assert_eq!(
            parse_ok("user Dolores\n"),
            Command::User {
                username: Bytes::from_static(b"Dolores")
            }
        );
    }

    #[test]
    fn parse_user_without_name_is_rejected() {
        assert_eq!(*parse_err("USER\r\n").kind(), ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn parse_line_without_eol_is_rejected() {
        assert_eq!(*parse_err("USER Dolores").kind(), ParseErrorKind::InvalidEol);
    }

    #[test]
    fn parse_pass_preserves_bytes() {
        assert_eq!(
            parse_ok("PASS s3cret\r\n"),
            Command::Pass {
                password: Password::new(Bytes::from_static(b"s3cret"))
            }
        );
    }

    #[test]
    fn parse_unknown_command() {
        assert_eq!(
            *parse_err("MAKECOFFEE\r\n").kind(),
            ParseErrorKind::UnknownCommand {
                command: "MAKECOFFEE".to_string()
            }
        );
    }

    #[test]
    fn parse_type_variants() {
        struct Test {
            input: &'static str,
            expected: DataType,
        }
        let tests = [
            Test {
                input: "TYPE A\r\n",
                expected: DataType::Ascii,
            },
            Test {
                input: "TYPE a n\r\n",
                expected: DataType::Ascii,
            },
            Test {
                input: "TYPE I\r\n",
                expected: DataType::Binary,
            },
            Test {
                input: "TYPE L 8\r\n",
                expected: DataType::Binary,
            },
        ];
        for test in tests {
            assert_eq!(parse_ok(test.input), Command::Type { data_type: test.expected });
        }
        assert_eq!(*parse_err("TYPE E\r\n").kind(), ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn parse_port_argument_into_addr() {
        assert_eq!(
            parse_ok("PORT 127,0,0,1,204,173\r\n"),
            Command::Port {
                addr: "127.0.0.1:52397".parse().unwrap()
            }
        );
        assert_eq!(*parse_err("PORT 127,0,0,1,204\r\n").kind(), ParseErrorKind::InvalidArgument);
        assert_eq!(*parse_err("PORT 300,0,0,1,204,173\r\n").kind(), ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn parse_eprt_v4_and_v6() {
        assert_eq!(
            parse_ok("EPRT |1|132.235.1.2|6275|\r\n"),
            Command::Eprt {
                addr: "132.235.1.2:6275".parse().unwrap()
            }
        );
        assert_eq!(
            parse_ok("EPRT |2|1080::8:800:200C:417A|5282|\r\n"),
            Command::Eprt {
                addr: "[1080::8:800:200C:417A]:5282".parse().unwrap()
            }
        );
        assert_eq!(*parse_err("EPRT |3|1.2.3.4|21|\r\n").kind(), ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn parse_rest_offset() {
        assert_eq!(parse_ok("REST 123\r\n"), Command::Rest { offset: 123 });
        assert_eq!(*parse_err("REST x\r\n").kind(), ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn parse_list_with_options_and_path() {
        assert_eq!(parse_ok("LIST\r\n"), Command::List { options: None, path: None });
        assert_eq!(
            parse_ok("LIST -la\r\n"),
            Command::List {
                options: Some("-la".to_string()),
                path: None
            }
        );
        assert_eq!(
            parse_ok("LIST -la sub dir\r\n"),
            Command::List {
                options: Some("-la".to_string()),
                path: Some("sub dir".to_string())
            }
        );
    }

    #[test]
    fn parse_opts_utf8() {
        assert_eq!(parse_ok("OPTS utf8 on\r\n"), Command::Opts { option: Opt::Utf8 { on: true } });
        assert_eq!(parse_ok("OPTS UTF8 OFF\r\n"), Command::Opts { option: Opt::Utf8 { on: false } });
        assert_eq!(*parse_err("OPTS MLST type\r\n").kind(), ParseErrorKind::InvalidArgument);
    }

    #[test]
    fn parse_auth_and_prot() {
        assert_eq!(parse_ok("AUTH TLS\r\n"), Command::Auth { protocol: AuthParam::Tls });
        assert_eq!(parse_ok("PROT P\r\n"), Command::Prot { param: ProtParam::Private });
        assert_eq!(parse_ok("PROT C\r\n"), Command::Prot { param: ProtParam::Clear });
    }

    #[test]
    fn parse_non_utf8_path_is_rejected() {
        let mut line = b"RETR ".to_vec();
        line.extend_from_slice(&[0xff, 0xfe]);
        line.extend_from_slice(b"\r\n");
        let err = parse(Bytes::from(line)).unwrap_err();
        assert_eq!(*err.kind(), ParseErrorKind::InvalidUtf8);
    }

    #[test]
    fn parse_non_ascii_verb_is_rejected() {
        let err = parse(Bytes::from(vec![0xc3, 0xa9, b'\r', b'\n'])).unwrap_err();
        assert_eq!(*err.kind(), ParseErrorKind::InvalidCommand);
    }
}
