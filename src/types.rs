//! # Types
//!
//! Common types exchanged with the library user: errors, replies and
//! transfer statistics.

use std::fmt;
use std::io::BufRead;
use std::time::Duration;

use thiserror::Error;

use crate::list::ParseError;
use crate::status::Status;

/// A shorthand for a Result whose error type is always a FtpsError.
pub type FtpsResult<T> = std::result::Result<T, FtpsError>;

/// `FtpsError` describes the different kinds of failure that might occur
/// while driving a session.
#[derive(Debug, Error)]
pub enum FtpsError {
    /// Transport-level error, including timeouts, surfaced unchanged
    #[error("connection error: {0}")]
    ConnectionError(std::io::Error),
    /// Operation attempted without an open control channel
    #[error("connection is not established")]
    NotConnected,
    /// Connect attempted while the session is already connected
    #[error("session is already connected")]
    NotDisconnected,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The PASV reply does not carry a `(h1,h2,h3,h4,p1,p2)` tuple
    #[error("malformed PASV reply")]
    PasvFormat,
    /// Short write while uploading over the data channel
    #[error("short write on data channel: wrote {written} of {expected} bytes")]
    IncompleteWrite { expected: usize, written: usize },
    /// A server line (PWD reply, listing line) has an unsupported shape
    #[error("unsupported line format")]
    LineFormat,
    /// The USER/PASS exchange was rejected
    #[error("login rejected by server: {0}")]
    InvalidLogin(Box<FtpsError>),
    /// The initial working directory was rejected
    #[error("initial directory rejected by server: {0}")]
    InvalidDirectory(Box<FtpsError>),
    /// TLS negotiation failed, on the wire or during the handshake
    #[error("secure negotiation failed: {0}")]
    SecureNegotiation(String),
    /// The server answered with a code other than the expected one.
    /// Carries the expected code and the complete observed reply.
    #[error("unexpected reply: expected {}, got {reply}", .expected.code())]
    UnexpectedReply { expected: Status, reply: Reply },
    /// The reply syntax is invalid
    #[error("reply has an invalid syntax")]
    BadReply,
    /// A listing line could not be decoded
    #[error("bad listing entry: {0}")]
    Parse(ParseError),
}

/// One logical reply read from the control channel. Multi-line replies are
/// merged into a single `Reply` with the continuation lines joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The 3-digit reply code as sent by the server
    pub code: u32,
    /// Message text with the code prefix stripped
    pub message: String,
    /// Whether the reply spanned more than one line
    pub multiline: bool,
}

impl Reply {
    /// The typed counterpart of [`Reply::code`]
    pub fn status(&self) -> Status {
        Status::from(self.code)
    }

    /// Read one logical reply.
    ///
    /// The first line must start with a 3-digit code followed by a space
    /// (single-line reply) or a dash (first line of a multi-line reply).
    /// Continuation lines may hold arbitrary text, including digit
    /// sequences; the reply ends at a line starting with the same code
    /// followed by a space.
    pub(crate) fn read_from<R: BufRead>(reader: &mut R) -> FtpsResult<Reply> {
        let first = read_line(reader)?;
        let bytes = first.as_bytes();
        if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(FtpsError::BadReply);
        }
        let code: u32 = first[..3].parse().map_err(|_| FtpsError::BadReply)?;
        let mut message = first[4..].to_string();
        match bytes[3] {
            b' ' => Ok(Reply {
                code,
                message,
                multiline: false,
            }),
            b'-' => {
                let terminator = format!("{} ", &first[..3]);
                loop {
                    let line = read_line(reader)?;
                    message.push('\n');
                    if let Some(text) = line.strip_prefix(terminator.as_str()) {
                        message.push_str(text);
                        break;
                    }
                    message.push_str(&line);
                }
                Ok(Reply {
                    code,
                    message,
                    multiline: true,
                })
            }
            _ => Err(FtpsError::BadReply),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Read bytes until LF or EOF; CR/LF are trimmed. An empty read means the
/// peer closed the control channel.
fn read_line<R: BufRead>(reader: &mut R) -> FtpsResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    reader
        .read_until(0x0A, &mut buf)
        .map_err(FtpsError::ConnectionError)?;
    if buf.is_empty() {
        return Err(FtpsError::ConnectionError(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "control channel closed while reading reply",
        )));
    }
    let mut line = String::from_utf8_lossy(&buf).to_string();
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Timing and volume figures reported by a data-channel read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Gap between the call and the first byte received
    pub wait: Duration,
    /// Gap between the first byte and the completion of the read
    pub io: Duration,
    /// Number of bytes accumulated into the caller's buffer
    pub bytes_read: usize,
}

/// File type used in the `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// ASCII text
    Ascii,
    /// Binary (aka Image)
    Binary,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Ascii => write!(f, "A"),
            FileType::Binary => write!(f, "I"),
        }
    }
}

#[cfg(test)]
mod test {

    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(raw: &str) -> FtpsResult<Reply> {
        Reply::read_from(&mut Cursor::new(raw.as_bytes()))
    }

    #[test]
    fn should_parse_single_line_reply() {
        let reply = parse("220 Service ready\r\n").unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.status(), Status::Ready);
        assert_eq!(reply.message.as_str(), "Service ready");
        assert_eq!(reply.multiline, false);
    }

    #[test]
    fn should_parse_multiline_reply() {
        let reply = parse("230-Welcome!\r\nDisk usage: 42%\r\n230 Login successful\r\n").unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(
            reply.message.as_str(),
            "Welcome!\nDisk usage: 42%\nLogin successful"
        );
        assert_eq!(reply.multiline, true);
    }

    #[test]
    fn should_tolerate_digits_in_continuation_lines() {
        // continuation lines may begin with digit sequences, even with the
        // reply code itself when not followed by a space
        let reply = parse("211-Features\r\n2112 looks like a code\r\n211-dashed\r\n211 End\r\n")
            .unwrap();
        assert_eq!(reply.code, 211);
        assert_eq!(
            reply.message.as_str(),
            "Features\n2112 looks like a code\n211-dashed\nEnd"
        );
    }

    #[test]
    fn should_reject_malformed_first_lines() {
        assert!(matches!(parse("hello world\r\n"), Err(FtpsError::BadReply)));
        assert!(matches!(parse("22 short\r\n"), Err(FtpsError::BadReply)));
        assert!(matches!(parse("2200 joined\r\n"), Err(FtpsError::BadReply)));
        assert!(matches!(parse("220\r\n"), Err(FtpsError::BadReply)));
    }

    #[test]
    fn should_fail_on_truncated_multiline_reply() {
        assert!(matches!(
            parse("220-Welcome\r\nstill going\r\n"),
            Err(FtpsError::ConnectionError(_))
        ));
    }

    #[test]
    fn should_fail_on_closed_channel() {
        assert!(matches!(parse(""), Err(FtpsError::ConnectionError(_))));
    }

    #[test]
    fn fmt_reply() {
        let reply = Reply {
            code: 550,
            message: String::from("Can't create directory: File exists"),
            multiline: false,
        };
        assert_eq!(
            reply.to_string().as_str(),
            "[550] Can't create directory: File exists"
        );
    }

    #[test]
    fn fmt_error() {
        assert_eq!(
            FtpsError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "deadline elapsed"
            ))
            .to_string()
            .as_str(),
            "connection error: deadline elapsed"
        );
        assert_eq!(
            FtpsError::IncompleteWrite {
                expected: 8,
                written: 5
            }
            .to_string()
            .as_str(),
            "short write on data channel: wrote 5 of 8 bytes"
        );
        assert_eq!(
            FtpsError::UnexpectedReply {
                expected: Status::LoggedIn,
                reply: Reply {
                    code: 530,
                    message: String::from("Login incorrect."),
                    multiline: false,
                },
            }
            .to_string()
            .as_str(),
            "unexpected reply: expected 230, got [530] Login incorrect."
        );
    }

    #[test]
    fn fmt_file_type() {
        assert_eq!(FileType::Ascii.to_string().as_str(), "A");
        assert_eq!(FileType::Binary.to_string().as_str(), "I");
    }
}
