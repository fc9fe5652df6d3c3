//! # Tls
//!
//! Explicit TLS upgrade of established plaintext connections

use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};

use crate::types::{FtpsError, FtpsResult};

/// Wraps plaintext connections of one session into TLS client sessions,
/// performing the handshake synchronously.
#[derive(Debug)]
pub struct TlsUpgrader {
    connector: TlsConnector,
    domain: String,
}

impl TlsUpgrader {
    pub fn new(connector: TlsConnector, domain: impl ToString) -> Self {
        Self {
            connector,
            domain: domain.to_string(),
        }
    }

    /// Build an upgrader from the session configuration; when no connector
    /// was supplied a default one is created.
    pub fn from_config(connector: Option<TlsConnector>, domain: &str) -> FtpsResult<Self> {
        let connector = match connector {
            Some(connector) => connector,
            None => TlsConnector::new()
                .map_err(|err| FtpsError::SecureNegotiation(err.to_string()))?,
        };
        Ok(Self::new(connector, domain))
    }

    /// Run the client handshake over `stream` and return the protected
    /// stream. A failed handshake is fatal to the channel being upgraded.
    pub fn upgrade(&self, stream: TcpStream) -> FtpsResult<TlsStream<TcpStream>> {
        debug!("upgrading connection to TLS for domain {}", self.domain);
        self.connector
            .connect(&self.domain, stream)
            .map_err(|err| FtpsError::SecureNegotiation(err.to_string()))
    }
}
