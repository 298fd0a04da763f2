use super::{Reply, command::Command, error::ControlChanError, line_parser};

use bytes::BytesMut;
use std::io::Write;
use tokio_util::codec::{Decoder, Encoder};

// FtpCodec implements tokio's `Decoder` and `Encoder` traits for the control
// channel: inbound bytes become FTP commands, outbound replies become wire
// lines.
pub struct FtpCodec {
    // Stored index of the next index to examine for a '\n' character. This is
    // used to optimize searching. If `decode` was called with `abc`, this
    // holds `3` so the next call with `abcde\n` only scans `de\n`.
    next_index: usize,
}

impl FtpCodec {
    pub fn new() -> Self {
        FtpCodec { next_index: 0 }
    }
}

impl Decoder for FtpCodec {
    type Item = Command;
    type Error = ControlChanError;

    // Splits on newlines and hands complete lines to the command parser.
    // Blank lines are consumed without comment, they are not commands.
    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Command>, Self::Error> {
        while let Some(newline_offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') {
            let newline_index = newline_offset + self.next_index;
            let line = buf.split_to(newline_index + 1);
            self.next_index = 0;
            if line.iter().all(|b| *b == b'\r' || *b == b'\n') {
                continue;
            }
            return Ok(Some(line_parser::parse(line)?));
        }
        self.next_index = buf.len();
        Ok(None)
    }
}

impl Encoder<Reply> for FtpCodec {
    type Error = ControlChanError;

    fn encode(&mut self, reply: Reply, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let mut buffer = vec![];
        match reply {
            Reply::None => {
                return Ok(());
            }
            Reply::CodeAndMsg { code, msg } => {
                if msg.is_empty() {
                    writeln!(buffer, "{}\r", code as u32)?;
                } else {
                    writeln!(buffer, "{} {}\r", code as u32, msg)?;
                }
            }
            Reply::MultiLine { code, mut lines } => {
                // The last line must be preceded by the response code.
                let last_line = lines.pop().unwrap_or_default();

                // Continuation lines starting with a digit must be indented,
                // otherwise clients would mistake them for the final line.
                for it in lines.iter_mut() {
                    if it.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                        it.insert(0, ' ');
                    }
                }
                if lines.is_empty() {
                    writeln!(buffer, "{} {}\r", code as u32, last_line)?;
                } else {
                    write!(buffer, "{}-{}\r\n{} {}\r\n", code as u32, lines.join("\r\n"), code as u32, last_line)?;
                }
            }
            Reply::Sequence(replies) => {
                for reply in replies {
                    self.encode(reply, buf)?;
                }
                return Ok(());
            }
        }
        buf.extend(&buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::controlchan::ReplyCode;
    use pretty_assertions::assert_eq;

    fn encoded(reply: Reply) -> String {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(reply, &mut buf).unwrap();
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn encodes_single_line() {
        assert_eq!(encoded(Reply::new(ReplyCode::CommandOkay, "Okay")), "200 Okay\r\n");
    }

    #[test]
    fn encodes_code_only() {
        assert_eq!(encoded(Reply::new(ReplyCode::CommandOkay, "")), "200\r\n");
    }

    #[test]
    fn encodes_multi_line_with_indented_digits() {
        let reply = Reply::new_multiline(ReplyCode::SystemStatus, vec!["Extensions supported:", "211 fake", "END"]);
        assert_eq!(encoded(reply), "211-Extensions supported:\r\n 211 fake\r\n211 END\r\n");
    }

    #[test]
    fn encodes_sequence_in_order() {
        let reply = Reply::Sequence(vec![
            Reply::new(ReplyCode::ConnectionClosed, "Transfer aborted"),
            Reply::new(ReplyCode::ClosingDataConnection, "Closing data connection"),
        ]);
        assert_eq!(encoded(reply), "426 Transfer aborted\r\n226 Closing data connection\r\n");
    }

    #[test]
    fn decodes_a_command_line() {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::from(&b"NOOP\r\n"[..]);
        let cmd = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(cmd, Command::Noop);
    }

    #[test]
    fn skips_blank_lines() {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::from(&b"\r\nNOOP\r\n"[..]);
        let cmd = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(cmd, Command::Noop);
    }

    #[test]
    fn a_lone_blank_line_yields_nothing() {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::from(&b"\r\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_a_full_line() {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::from(&b"NO"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"OP\r\n");
        let cmd = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(cmd, Command::Noop);
    }
}
