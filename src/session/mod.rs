//! # Session
//!
//! This module contains the synchronous FTP(S) session: the control
//! channel, passive data-channel negotiation and the transfer engine.

mod data_stream;
mod tls;

use std::fs::File;
use std::io::{self, copy, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use socket2::SockRef;

// export
pub use data_stream::DataStream;
pub use tls::TlsUpgrader;

use crate::command::{Command, ProtectionLevel};
use crate::config::{SessionConfig, SocketBufferConfig};
use crate::list::DirEntry;
use crate::regex::{MDTM_RE, SIZE_RE};
use crate::status::Status;
use crate::types::{FileType, FtpsError, FtpsResult, Reply, TransferStats};

/// One client session against a remote FTP(S) server.
///
/// A session owns at most one control connection, spanning
/// [`FtpsSession::connect`] to [`FtpsSession::disconnect`], and at most one
/// data connection, spanning a single data-bearing command. The session is
/// not reentrant: callers must serialize use and close an open data channel
/// before starting the next data-bearing operation.
pub struct FtpsSession {
    config: SessionConfig,
    control: Option<BufReader<DataStream>>,
    data: Option<DataStream>,
    upgrader: Option<TlsUpgrader>,
    welcome_msg: Option<String>,
}

impl FtpsSession {
    /// Create a disconnected session from its configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            control: None,
            data: None,
            upgrader: None,
            welcome_msg: None,
        }
    }

    /// Establish the control connection and run the login sequence.
    ///
    /// The stages run in order and the first failure aborts, tagged so the
    /// caller can tell the failing exchange apart: greeting (220), optional
    /// `AUTH TLS` (234) plus control upgrade, `USER` (331), `PASS` (230),
    /// `TYPE I` (200), `CWD` into the initial directory (250) and, in
    /// secure mode, `PBSZ 0` / `PROT P` (200).
    pub fn connect(&mut self) -> FtpsResult<()> {
        if self.control.is_some() {
            return Err(FtpsError::NotDisconnected);
        }
        debug!(
            "session {}: connecting to {}:{}",
            self.config.id, self.config.host, self.config.port
        );
        let stream = self.dial(self.config.port, self.config.control_buffer)?;
        self.control = Some(BufReader::new(DataStream::Tcp(stream)));

        let greeting = self.read_reply(Status::Ready)?;
        self.welcome_msg = Some(greeting.message.clone());

        if self.config.secure {
            let upgrader = TlsUpgrader::from_config(self.config.tls.clone(), &self.config.host)?;
            self.send_ftp_command(Command::Auth, Status::AuthOk)
                .map_err(|err| FtpsError::SecureNegotiation(err.to_string()))?;
            self.upgrade_control(&upgrader)?;
            self.upgrader = Some(upgrader);
        }

        self.send_ftp_command(
            Command::User(self.config.username.clone()),
            Status::NeedPassword,
        )
        .map_err(|err| FtpsError::InvalidLogin(Box::new(err)))?;
        self.send_ftp_command(
            Command::Pass(self.config.password.clone()),
            Status::LoggedIn,
        )
        .map_err(|err| FtpsError::InvalidLogin(Box::new(err)))?;

        self.send_ftp_command(Command::Type(FileType::Binary), Status::CommandOk)
            .map_err(|err| FtpsError::InvalidParameter(err.to_string()))?;

        self.send_ftp_command(
            Command::Cwd(self.config.initial_directory.clone()),
            Status::RequestedFileActionOk,
        )
        .map_err(|err| FtpsError::InvalidDirectory(Box::new(err)))?;

        if self.config.secure {
            self.send_ftp_command(Command::Pbsz(0), Status::CommandOk)
                .map_err(|err| FtpsError::SecureNegotiation(err.to_string()))?;
            self.send_ftp_command(Command::Prot(ProtectionLevel::Private), Status::CommandOk)
                .map_err(|err| FtpsError::SecureNegotiation(err.to_string()))?;
        }
        debug!("session {}: login complete", self.config.id);
        Ok(())
    }

    /// Quit the session and close the control connection. The session can
    /// be connected again afterwards.
    pub fn disconnect(&mut self) -> FtpsResult<()> {
        debug!("session {}: disconnecting", self.config.id);
        self.send_ftp_command(Command::Quit, Status::Closing)?;
        self.control = None;
        self.upgrader = None;
        self.welcome_msg = None;
        Ok(())
    }

    /// Greeting text sent by the server at connect time, if connected.
    pub fn welcome_msg(&self) -> Option<&str> {
        self.welcome_msg.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current working directory, from the quoted path of the PWD reply.
    pub fn working_directory(&mut self) -> FtpsResult<String> {
        let reply = self.send_ftp_command(Command::Pwd, Status::PathCreated)?;
        match (reply.message.find('"'), reply.message.rfind('"')) {
            (Some(begin), Some(end)) if begin < end => {
                Ok(reply.message[begin + 1..end].to_string())
            }
            _ => Err(FtpsError::LineFormat),
        }
    }

    /// Change the working directory to the path specified.
    pub fn change_directory(&mut self, path: &str) -> FtpsResult<()> {
        self.send_ftp_command(
            Command::Cwd(path.to_string()),
            Status::RequestedFileActionOk,
        )
        .map(|_| ())
    }

    /// Move the working directory to its parent.
    pub fn parent_directory(&mut self) -> FtpsResult<()> {
        self.send_ftp_command(Command::Cdup, Status::RequestedFileActionOk)
            .map(|_| ())
    }

    /// Create a directory on the server.
    pub fn make_directory(&mut self, path: &str) -> FtpsResult<()> {
        self.send_ftp_command(Command::Mkd(path.to_string()), Status::PathCreated)
            .map(|_| ())
    }

    /// Remove a directory from the server.
    pub fn remove_directory(&mut self, path: &str) -> FtpsResult<()> {
        self.send_ftp_command(
            Command::Rmd(path.to_string()),
            Status::RequestedFileActionOk,
        )
        .map(|_| ())
    }

    /// Remove a file from the server.
    pub fn delete_file(&mut self, path: &str) -> FtpsResult<()> {
        self.send_ftp_command(
            Command::Dele(path.to_string()),
            Status::RequestedFileActionOk,
        )
        .map(|_| ())
    }

    /// This does nothing; used to keep the connection alive.
    pub fn noop(&mut self) -> FtpsResult<()> {
        self.send_ftp_command(Command::Noop, Status::CommandOk)
            .map(|_| ())
    }

    /// Rename `from` to `to`.
    pub fn rename(&mut self, from: &str, to: &str) -> FtpsResult<()> {
        self.send_ftp_command(
            Command::RenameFrom(from.to_string()),
            Status::RequestFilePending,
        )?;
        self.send_ftp_command(
            Command::RenameTo(to.to_string()),
            Status::RequestedFileActionOk,
        )
        .map(|_| ())
    }

    /// Size in bytes of the file at `path`, if it exists.
    pub fn file_size(&mut self, path: &str) -> FtpsResult<u64> {
        let reply = self.send_ftp_command(Command::Size(path.to_string()), Status::File)?;
        match SIZE_RE.captures(&reply.message) {
            Some(caps) => caps[1].parse::<u64>().map_err(|_| FtpsError::BadReply),
            None => Err(FtpsError::BadReply),
        }
    }

    /// Modification time of the file at `path`, if it exists.
    pub fn modified_time(&mut self, path: &str) -> FtpsResult<NaiveDateTime> {
        let reply = self.send_ftp_command(Command::Mdtm(path.to_string()), Status::File)?;
        let caps = MDTM_RE
            .captures(&reply.message)
            .ok_or(FtpsError::BadReply)?;
        let (year, month, day) = (
            caps[1].parse::<i32>().unwrap(),
            caps[2].parse::<u32>().unwrap(),
            caps[3].parse::<u32>().unwrap(),
        );
        let (hour, minute, second) = (
            caps[4].parse::<u32>().unwrap(),
            caps[5].parse::<u32>().unwrap(),
            caps[6].parse::<u32>().unwrap(),
        );
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(FtpsError::BadReply)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or(FtpsError::BadReply)?;
        Ok(NaiveDateTime::new(date, time))
    }

    /// Send an arbitrary control command and require `expected` in return.
    pub fn send_command(&mut self, command: impl ToString, expected: Status) -> FtpsResult<Reply> {
        self.send_ftp_command(Command::Custom(command.to_string()), expected)
    }

    /// List the working directory.
    ///
    /// The data channel is always finalized, even when reading or parsing
    /// fails, so the control channel stays aligned with the server.
    pub fn list(&mut self) -> FtpsResult<Vec<DirEntry>> {
        self.data_command(Command::List(Some(String::from("-a"))), Status::AboutToSend)?;
        let lines = self.read_data_lines();
        let finalize = self.close_data_channel();
        let lines = lines?;
        finalize?;
        lines
            .iter()
            .map(|line| DirEntry::from_line(line).map_err(FtpsError::Parse))
            .collect()
    }

    /// Upload `bytes` to `remote_path` with a single write, then finalize
    /// the transfer.
    pub fn store_file(&mut self, remote_path: &str, bytes: &[u8]) -> FtpsResult<()> {
        self.data_command(Command::Store(remote_path.to_string()), Status::AboutToSend)?;
        let transfer = self.write_data_channel(bytes);
        let finalize = self.close_data_channel();
        transfer.and(finalize.map(|_| ()))
    }

    /// Download `remote_path` into the local file at `local_path`, created
    /// or truncated, then finalize the transfer.
    pub fn retrieve_file(&mut self, remote_path: &str, local_path: &Path) -> FtpsResult<()> {
        self.data_command(Command::Retr(remote_path.to_string()), Status::AboutToSend)?;
        let transfer = self.copy_data_to_file(local_path);
        let finalize = self.close_data_channel();
        transfer.and(finalize.map(|_| ()))
    }

    /// Open a data channel for a custom data-bearing command.
    ///
    /// The channel is single-use: exactly one transfer, driven with
    /// [`FtpsSession::read_data_channel`], then it must be closed with
    /// [`FtpsSession::close_data_channel`] before the next data-bearing
    /// command.
    pub fn open_data_channel(
        &mut self,
        command: impl ToString,
        expected: Status,
    ) -> FtpsResult<()> {
        self.data_command(Command::Custom(command.to_string()), expected)
    }

    /// Fill `buf` from the open data channel.
    ///
    /// The loop accumulates short reads and treats a bare EOF as retryable;
    /// it ends only when the buffer is full or on a hard error, including
    /// the expiry of the data timeout.
    pub fn read_data_channel(&mut self, buf: &mut [u8]) -> FtpsResult<TransferStats> {
        let data = self.data.as_mut().ok_or(FtpsError::NotConnected)?;
        arm_deadline(data.get_ref(), self.config.data_timeout)?;
        let start_wait = Instant::now();
        let mut stats = TransferStats::default();
        let mut first_read: Option<Instant> = None;
        while stats.bytes_read < buf.len() {
            match data.read(&mut buf[stats.bytes_read..]) {
                Ok(0) => continue,
                Ok(len) => {
                    if first_read.is_none() {
                        let now = Instant::now();
                        stats.wait = now.duration_since(start_wait);
                        first_read = Some(now);
                    }
                    stats.bytes_read += len;
                }
                Err(err) => return Err(FtpsError::ConnectionError(err)),
            }
        }
        if let Some(first) = first_read {
            stats.io = first.elapsed();
        }
        trace!(
            "data read: {} bytes, waited {:?}, io {:?}",
            stats.bytes_read,
            stats.wait,
            stats.io
        );
        Ok(stats)
    }

    /// Close the open data channel and read the mandatory closing reply
    /// (226). This must run after every data-bearing command, listing
    /// included, and even when the transfer itself failed.
    pub fn close_data_channel(&mut self) -> FtpsResult<Reply> {
        let data = self.data.take().ok_or(FtpsError::NotConnected)?;
        data.close();
        self.read_reply(Status::ClosingDataConnection)
    }

    // -- control channel internals

    /// Write one command and read the reply it triggers.
    fn send_ftp_command(&mut self, command: Command, expected: Status) -> FtpsResult<Reply> {
        let line = command.to_string();
        self.write_command_line(&line)?;
        self.read_reply(expected)
    }

    fn write_command_line(&mut self, line: &str) -> FtpsResult<()> {
        let reader = self.control.as_mut().ok_or(FtpsError::NotConnected)?;
        if self.config.debug {
            debug!("[FTP CMD] {}", line.trim_end_matches("\r\n"));
        }
        arm_deadline(reader.get_ref().get_ref(), self.config.control_timeout)?;
        reader
            .get_mut()
            .write_all(line.as_bytes())
            .map_err(FtpsError::ConnectionError)
    }

    /// Read one logical reply and compare it with the single status the
    /// caller considers success; any other code is a protocol error.
    fn read_reply(&mut self, expected: Status) -> FtpsResult<Reply> {
        let reader = self.control.as_mut().ok_or(FtpsError::NotConnected)?;
        arm_deadline(reader.get_ref().get_ref(), self.config.control_timeout)?;
        let reply = Reply::read_from(reader)?;
        if self.config.debug {
            debug!(
                "[FTP REP] {}/{} ({})",
                reply.code,
                expected.code(),
                reply.message
            );
        }
        if reply.code == expected.code() {
            Ok(reply)
        } else {
            Err(FtpsError::UnexpectedReply { expected, reply })
        }
    }

    /// Swap the control connection for its TLS-upgraded counterpart.
    fn upgrade_control(&mut self, upgrader: &TlsUpgrader) -> FtpsResult<()> {
        let reader = self.control.take().ok_or(FtpsError::NotConnected)?;
        let stream = reader
            .into_inner()
            .into_tcp_stream()
            .map_err(FtpsError::ConnectionError)?;
        let secured = upgrader.upgrade(stream)?;
        self.control = Some(BufReader::new(DataStream::Tls(Box::new(secured))));
        Ok(())
    }

    // -- data channel internals

    /// Negotiate a passive data connection and send `command` over the
    /// control channel. On failure the freshly dialed connection is closed
    /// and discarded, leaving the session consistent for another attempt.
    fn data_command(&mut self, command: Command, expected: Status) -> FtpsResult<()> {
        if self.data.is_some() {
            return Err(FtpsError::InvalidParameter(String::from(
                "a data connection is already open",
            )));
        }
        let port = self.negotiate_passive_port()?;
        let stream = self.dial(port, self.config.data_buffer)?;
        if let Err(err) = self.send_ftp_command(command, expected) {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(err);
        }
        let data = if self.config.secure {
            let upgrader = self.upgrader.as_ref().ok_or_else(|| {
                FtpsError::SecureNegotiation(String::from("control channel was not upgraded"))
            })?;
            DataStream::Tls(Box::new(upgrader.upgrade(stream)?))
        } else {
            DataStream::Tcp(stream)
        };
        self.data = Some(data);
        Ok(())
    }

    /// Run PASV and recompose the data port from the reply.
    fn negotiate_passive_port(&mut self) -> FtpsResult<u16> {
        let reply = self.send_ftp_command(Command::Pasv, Status::PassiveMode)?;
        let port = Self::parse_pasv_port(&reply.message)?;
        trace!("passive data port: {port}");
        Ok(port)
    }

    /// Extract the data port from a `(h1,h2,h3,h4,p1,p2)` PASV body.
    ///
    /// The four address octets are ignored: the data connection always
    /// dials the configured host, since NAT'd servers tend to advertise an
    /// internal address here.
    pub(crate) fn parse_pasv_port(message: &str) -> FtpsResult<u16> {
        let begin = message.find('(').ok_or(FtpsError::PasvFormat)?;
        let end = message.rfind(')').ok_or(FtpsError::PasvFormat)?;
        if begin >= end {
            return Err(FtpsError::PasvFormat);
        }
        let fields: Vec<&str> = message[begin + 1..end].split(',').collect();
        if fields.len() != 6 {
            return Err(FtpsError::PasvFormat);
        }
        let msb = fields[4].parse::<u8>().map_err(|_| FtpsError::PasvFormat)?;
        let lsb = fields[5].parse::<u8>().map_err(|_| FtpsError::PasvFormat)?;
        Ok(u16::from(msb) * 256 + u16::from(lsb))
    }

    /// Dial `(configured host, port)` with the connect timeout and apply
    /// the buffer hints, trying every resolved address in order.
    fn dial(&self, port: u16, buffers: SocketBufferConfig) -> FtpsResult<TcpStream> {
        let addrs: Vec<_> = (self.config.host.as_str(), port)
            .to_socket_addrs()
            .map_err(FtpsError::ConnectionError)?
            .collect();
        let mut last_err: Option<io::Error> = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    apply_buffer_sizes(&stream, buffers)?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(FtpsError::ConnectionError(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host did not resolve to any address")
        })))
    }

    // -- transfer engine internals

    /// Upload with a single write call; a short count is an error.
    fn write_data_channel(&mut self, bytes: &[u8]) -> FtpsResult<()> {
        let data = self.data.as_mut().ok_or(FtpsError::NotConnected)?;
        arm_deadline(data.get_ref(), self.config.data_timeout)?;
        let written = data.write(bytes).map_err(FtpsError::ConnectionError)?;
        if written != bytes.len() {
            return Err(FtpsError::IncompleteWrite {
                expected: bytes.len(),
                written,
            });
        }
        data.flush().map_err(FtpsError::ConnectionError)
    }

    /// Read CRLF lines from the data channel until it closes.
    fn read_data_lines(&mut self) -> FtpsResult<Vec<String>> {
        let data = self.data.as_mut().ok_or(FtpsError::NotConnected)?;
        arm_deadline(data.get_ref(), self.config.data_timeout)?;
        let mut reader = BufReader::new(data);
        let mut lines: Vec<String> = Vec::new();
        loop {
            let mut buf: Vec<u8> = Vec::new();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(len) => {
                    let mut line = String::from_utf8_lossy(&buf[..len]).to_string();
                    while line.ends_with('\n') || line.ends_with('\r') {
                        line.pop();
                    }
                    if line.is_empty() {
                        continue;
                    }
                    trace!("DATA IN: {line}");
                    lines.push(line);
                }
                Err(err) => return Err(FtpsError::ConnectionError(err)),
            }
        }
        Ok(lines)
    }

    /// Stream the data channel into a local file until EOF.
    fn copy_data_to_file(&mut self, path: &Path) -> FtpsResult<()> {
        let data = self.data.as_mut().ok_or(FtpsError::NotConnected)?;
        arm_deadline(data.get_ref(), self.config.data_timeout)?;
        let mut file = File::create(path).map_err(FtpsError::ConnectionError)?;
        copy(data, &mut file).map_err(FtpsError::ConnectionError)?;
        Ok(())
    }
}

/// Bound the next socket operations by `timeout`; zero disarms.
fn arm_deadline(stream: &TcpStream, timeout: Duration) -> FtpsResult<()> {
    let timeout = if timeout.is_zero() {
        None
    } else {
        Some(timeout)
    };
    stream
        .set_read_timeout(timeout)
        .map_err(FtpsError::ConnectionError)?;
    stream
        .set_write_timeout(timeout)
        .map_err(FtpsError::ConnectionError)
}

/// Apply socket buffer hints; sizes left unset keep the kernel defaults.
fn apply_buffer_sizes(stream: &TcpStream, buffers: SocketBufferConfig) -> FtpsResult<()> {
    let socket = SockRef::from(stream);
    if let Some(size) = buffers.recv_size() {
        socket
            .set_recv_buffer_size(size)
            .map_err(FtpsError::ConnectionError)?;
    }
    if let Some(size) = buffers.send_size() {
        socket
            .set_send_buffer_size(size)
            .map_err(FtpsError::ConnectionError)?;
    }
    Ok(())
}
