//! # Status
//!
//! Reply codes defined by the File Transfer Protocol, reduced to the ones a
//! client is likely to exchange.

use thiserror::Error;

#[derive(Debug, Copy, Clone, Error, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
/// Ftp status returned after command execution
pub enum Status {
    // 1xx: Positive Preliminary Reply
    #[error("data connection already open, transfer starting")]
    AlreadyOpen = 125,
    #[error("file status okay, about to open data connection")]
    AboutToSend = 150,
    // 2xx: Positive Completion Reply
    #[error("command okay")]
    CommandOk = 200,
    #[error("system status")]
    System = 211,
    #[error("file status")]
    File = 213,
    #[error("service ready for new user")]
    Ready = 220,
    #[error("service closing control connection")]
    Closing = 221,
    #[error("closing data connection")]
    ClosingDataConnection = 226,
    #[error("entering passive mode")]
    PassiveMode = 227,
    #[error("user logged in, proceed")]
    LoggedIn = 230,
    #[error("authentication mechanism accepted")]
    AuthOk = 234,
    #[error("requested file action okay")]
    RequestedFileActionOk = 250,
    #[error("pathname created")]
    PathCreated = 257,
    // 3xx: Positive Intermediate Reply
    #[error("user name okay, need password")]
    NeedPassword = 331,
    #[error("requested file action pending further information")]
    RequestFilePending = 350,
    // 4xx: Transient Negative Completion Reply
    #[error("service not available, closing control connection")]
    NotAvailable = 421,
    #[error("can't open data connection")]
    CannotOpenDataConnection = 425,
    #[error("connection closed, transfer aborted")]
    TransferAborted = 426,
    #[error("requested file action not taken")]
    RequestFileActionIgnored = 450,
    // 5xx: Permanent Negative Completion Reply
    #[error("syntax error, command unrecognized")]
    BadCommand = 500,
    #[error("syntax error in parameters or arguments")]
    BadArguments = 501,
    #[error("command not implemented")]
    NotImplemented = 502,
    #[error("bad sequence of commands")]
    BadSequence = 503,
    #[error("user not logged in")]
    NotLoggedIn = 530,
    #[error("requested action not taken, file unavailable")]
    FileUnavailable = 550,
    #[error("unknown reply code")]
    Unknown = 0,
}

impl Status {
    /// Get the numeric reply code
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        match code {
            125 => Self::AlreadyOpen,
            150 => Self::AboutToSend,
            200 => Self::CommandOk,
            211 => Self::System,
            213 => Self::File,
            220 => Self::Ready,
            221 => Self::Closing,
            226 => Self::ClosingDataConnection,
            227 => Self::PassiveMode,
            230 => Self::LoggedIn,
            234 => Self::AuthOk,
            250 => Self::RequestedFileActionOk,
            257 => Self::PathCreated,
            331 => Self::NeedPassword,
            350 => Self::RequestFilePending,
            421 => Self::NotAvailable,
            425 => Self::CannotOpenDataConnection,
            426 => Self::TransferAborted,
            450 => Self::RequestFileActionIgnored,
            500 => Self::BadCommand,
            501 => Self::BadArguments,
            502 => Self::NotImplemented,
            503 => Self::BadSequence,
            530 => Self::NotLoggedIn,
            550 => Self::FileUnavailable,
            _ => Self::Unknown,
        }
    }
}
