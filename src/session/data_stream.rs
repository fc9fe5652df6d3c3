//! # Data Stream
//!
//! Byte stream over one connection, plain TCP or TLS after an upgrade

use std::io::{Read, Result, Write};
use std::net::{Shutdown, TcpStream};

use native_tls::TlsStream;

/// Stream used for both the control and the data connection. `Tcp` for
/// plain communication, `Tls` after the explicit upgrade.
#[derive(Debug)]
pub enum DataStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl DataStream {
    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            DataStream::Tcp(ref stream) => stream,
            DataStream::Tls(ref stream) => stream.get_ref(),
        }
    }

    /// Unwrap the stream into the TcpStream it was built on. Used when
    /// upgrading the control connection, which is plain at that point.
    pub(crate) fn into_tcp_stream(self) -> Result<TcpStream> {
        match self {
            DataStream::Tcp(stream) => Ok(stream),
            DataStream::Tls(stream) => stream.get_ref().try_clone(),
        }
    }

    /// Close the connection, sending the TLS close notification first when
    /// the stream is protected.
    pub(crate) fn close(self) {
        match self {
            DataStream::Tcp(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            DataStream::Tls(mut stream) => {
                if let Err(err) = stream.shutdown() {
                    trace!("failed to shut down tls stream: {err}");
                }
            }
        }
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.read(buf),
            DataStream::Tls(ref mut stream) => stream.read(buf),
        }
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.write(buf),
            DataStream::Tls(ref mut stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.flush(),
            DataStream::Tls(ref mut stream) => stream.flush(),
        }
    }
}
