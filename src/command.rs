//! # Command
//!
//! The subset of FTP commands this client can issue

use std::string::ToString;

use crate::types::FileType;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Set auth to TLS
    Auth,
    /// Change directory to parent directory
    Cdup,
    /// A raw command line, sent verbatim
    Custom(String),
    /// Change working directory
    Cwd(String),
    /// Remove file at specified path
    Dele(String),
    /// List entries at specified path, or at the working directory
    List(Option<String>),
    /// Get modification time for file at specified path
    Mdtm(String),
    /// Make directory
    Mkd(String),
    /// Ping server
    Noop,
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Protection buffer size
    Pbsz(usize),
    /// Set protection level for protocol
    Prot(ProtectionLevel),
    /// Print working directory
    Pwd,
    /// Quit
    Quit,
    /// Select file to rename
    RenameFrom(String),
    /// Rename selected file to
    RenameTo(String),
    /// Retrieve file
    Retr(String),
    /// Remove directory
    Rmd(String),
    /// Get file size of specified path
    Size(String),
    /// Put file at specified path
    Store(String),
    /// Set transfer type
    Type(FileType),
    /// Provide user to login as
    User(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Protection level; argument for `Prot` command
pub enum ProtectionLevel {
    #[allow(unused)]
    Clear,
    Private,
}

// -- stringify

impl ToString for Command {
    fn to_string(&self) -> String {
        let mut s = match self {
            Self::Auth => "AUTH TLS".to_string(),
            Self::Cdup => "CDUP".to_string(),
            Self::Custom(line) => line.trim_end_matches("\r\n").to_string(),
            Self::Cwd(d) => format!("CWD {}", d),
            Self::Dele(f) => format!("DELE {}", f),
            Self::List(p) => p
                .as_deref()
                .map(|x| format!("LIST {}", x))
                .unwrap_or_else(|| "LIST".to_string()),
            Self::Mdtm(p) => format!("MDTM {}", p),
            Self::Mkd(p) => format!("MKD {}", p),
            Self::Noop => "NOOP".to_string(),
            Self::Pass(p) => format!("PASS {}", p),
            Self::Pasv => "PASV".to_string(),
            Self::Pbsz(sz) => format!("PBSZ {}", sz),
            Self::Prot(l) => format!("PROT {}", l.to_string()),
            Self::Pwd => "PWD".to_string(),
            Self::Quit => "QUIT".to_string(),
            Self::RenameFrom(p) => format!("RNFR {}", p),
            Self::RenameTo(p) => format!("RNTO {}", p),
            Self::Retr(p) => format!("RETR {}", p),
            Self::Rmd(p) => format!("RMD {}", p),
            Self::Size(p) => format!("SIZE {}", p),
            Self::Store(p) => format!("STOR {}", p),
            Self::Type(t) => format!("TYPE {}", t.to_string()),
            Self::User(u) => format!("USER {}", u),
        };
        s.push_str("\r\n");
        s
    }
}

impl ToString for ProtectionLevel {
    fn to_string(&self) -> String {
        match self {
            Self::Clear => "C",
            Self::Private => "P",
        }
        .to_string()
    }
}
