#![crate_name = "ftpslite"]
#![crate_type = "lib"]

//! # ftpslite
//!
//! ftpslite is a compact, synchronous FTP client library with optional FTPS
//! support through the explicit `AUTH TLS` upgrade. It implements the small
//! command subset an application needs to exchange files with a remote
//! server: authentication, directory navigation and management, listing,
//! upload, download, deletion and a generic passthrough for any other
//! control command.
//!
//! All transfers use passive mode. Every blocking operation is bounded by
//! one of the timeouts carried in the [`SessionConfig`].
//!
//! ## Get started
//!
//! Build a [`SessionConfig`], create a session and connect. The whole login
//! sequence (greeting, optional TLS upgrade, credentials, binary transfer
//! type, initial directory, optional data-channel protection) runs inside
//! [`FtpsSession::connect`].
//!
//! ```rust,no_run
//! use ftpslite::{FtpsSession, SessionConfig};
//!
//! let config = SessionConfig::new("ftp.example.com", 21)
//!     .credentials("demo", "password")
//!     .initial_directory("/incoming");
//! let mut session = FtpsSession::new(config);
//! session.connect().unwrap();
//! session.store_file("hello.txt", b"hello, world!").unwrap();
//! session.disconnect().unwrap();
//! ```
//!
//! ## FTPS
//!
//! Enabling secure mode upgrades the control channel right after the
//! greeting and every data channel after it is dialed:
//!
//! ```rust,no_run
//! use ftpslite::{FtpsSession, SessionConfig};
//!
//! let config = SessionConfig::new("ftp.example.com", 21)
//!     .credentials("demo", "password")
//!     .secure(true);
//! let mut session = FtpsSession::new(config);
//! session.connect().unwrap();
//! ```
//!
//! A custom [`native_tls::TlsConnector`] (for client certificates, disabled
//! verification and so on) can be supplied with
//! [`SessionConfig::tls_connector`]; otherwise a default connector is built
//! when secure mode is enabled.

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
pub(crate) mod command;
mod config;
mod regex;
mod session;
mod status;

// -- public
pub mod list;
pub mod types;

// -- tls deps
pub extern crate native_tls;

pub use config::{SessionConfig, SocketBufferConfig};
pub use session::FtpsSession;
pub use status::Status;
pub use types::{FtpsError, FtpsResult, Reply, TransferStats};

// -- test support
#[cfg(test)]
pub(crate) mod mock_server;

#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
