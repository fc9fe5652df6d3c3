//! # Mock server
//!
//! A scripted FTP server running on a loopback listener, used by the
//! session tests to drive full protocol exchanges without a real server.
//!
//! It implements just enough of the protocol for one control connection:
//! fixed `test`/`test` credentials, an in-memory file store shared with the
//! test body, a canned listing and passive-mode data channels.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

pub(crate) struct MockFtpServer {
    port: u16,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockFtpServer {
    pub fn start() -> Self {
        Self::with_listing(Vec::new())
    }

    /// Start a server whose `LIST` reply is exactly `listing`.
    pub fn with_listing(listing: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind mock server");
        let port = listener.local_addr().unwrap().port();
        let files: Arc<Mutex<HashMap<String, Vec<u8>>>> = Arc::new(Mutex::new(HashMap::new()));
        let served = files.clone();
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve_control(stream, &listing, &served);
            }
        });
        Self { port, files }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bytes stored on the server under `name`, if any.
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    /// Place a file on the server before (or while) the session runs.
    pub fn seed_file(&self, name: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(name.to_string(), bytes);
    }
}

fn serve_control(
    stream: TcpStream,
    listing: &[String],
    files: &Arc<Mutex<HashMap<String, Vec<u8>>>>,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut pending_data: Option<TcpListener> = None;
    let mut rename_from: Option<String> = None;
    let mut username = String::new();

    send(&mut writer, "220 mock ftp ready");
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, arg),
            None => (line, ""),
        };
        match verb {
            "USER" => {
                username = arg.to_string();
                send(&mut writer, "331 User name okay, need password");
            }
            "PASS" => {
                if username == "test" && arg == "test" {
                    send(&mut writer, "230 Login successful");
                } else {
                    send(&mut writer, "530 Login incorrect");
                }
            }
            "TYPE" => send(&mut writer, "200 Switching to requested mode"),
            "NOOP" => send(&mut writer, "200 NOOP ok"),
            "PWD" => send(&mut writer, "257 \"/home/test\" is the current directory"),
            "CWD" => {
                if arg == "/missing" {
                    send(&mut writer, "550 Failed to change directory");
                } else {
                    send(&mut writer, "250 Directory successfully changed");
                }
            }
            "CDUP" => send(&mut writer, "250 Directory successfully changed"),
            "MKD" => send(&mut writer, &format!("257 \"{arg}\" created")),
            "RMD" => send(&mut writer, "250 Remove directory operation successful"),
            "DELE" => {
                if files.lock().unwrap().remove(arg).is_some() {
                    send(&mut writer, "250 Delete operation successful");
                } else {
                    send(&mut writer, "550 Delete operation failed");
                }
            }
            "SIZE" => match files.lock().unwrap().get(arg) {
                Some(bytes) => send(&mut writer, &format!("213 {}", bytes.len())),
                None => send(&mut writer, "550 Could not get file size"),
            },
            "MDTM" => {
                if files.lock().unwrap().contains_key(arg) {
                    send(&mut writer, "213 20230201111632");
                } else {
                    send(&mut writer, "550 Could not get file modification time");
                }
            }
            "RNFR" => {
                if files.lock().unwrap().contains_key(arg) {
                    rename_from = Some(arg.to_string());
                    send(&mut writer, "350 Ready for RNTO");
                } else {
                    send(&mut writer, "550 RNFR command failed");
                }
            }
            "RNTO" => match rename_from.take() {
                Some(from) => {
                    let mut files = files.lock().unwrap();
                    let bytes = files.remove(&from).unwrap();
                    files.insert(arg.to_string(), bytes);
                    send(&mut writer, "250 Rename successful");
                }
                None => send(&mut writer, "503 RNFR required first"),
            },
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                let port = listener.local_addr().unwrap().port();
                pending_data = Some(listener);
                send(
                    &mut writer,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{}).",
                        port / 256,
                        port % 256
                    ),
                );
            }
            "LIST" => match pending_data.take() {
                Some(listener) => {
                    send(&mut writer, "150 Here comes the directory listing");
                    let (mut data, _) = listener.accept().unwrap();
                    for line in listing {
                        data.write_all(line.as_bytes()).unwrap();
                        data.write_all(b"\r\n").unwrap();
                    }
                    drop(data);
                    send(&mut writer, "226 Directory send OK");
                }
                None => send(&mut writer, "425 Use PASV first"),
            },
            "STOR" => match pending_data.take() {
                Some(listener) => {
                    send(&mut writer, "150 Ok to send data");
                    let (mut data, _) = listener.accept().unwrap();
                    let mut bytes = Vec::new();
                    data.read_to_end(&mut bytes).unwrap();
                    files.lock().unwrap().insert(arg.to_string(), bytes);
                    send(&mut writer, "226 Transfer complete");
                }
                None => send(&mut writer, "425 Use PASV first"),
            },
            "RETR" => {
                let bytes = files.lock().unwrap().get(arg).cloned();
                match (bytes, pending_data.take()) {
                    (Some(bytes), Some(listener)) => {
                        send(&mut writer, "150 Opening BINARY mode data connection");
                        let (mut data, _) = listener.accept().unwrap();
                        data.write_all(&bytes).unwrap();
                        drop(data);
                        send(&mut writer, "226 Transfer complete");
                    }
                    _ => send(&mut writer, "550 Failed to open file"),
                }
            }
            "QUIT" => {
                send(&mut writer, "221 Goodbye");
                break;
            }
            _ => send(&mut writer, "500 Unknown command"),
        }
    }
}

fn send(writer: &mut TcpStream, line: &str) {
    writer.write_all(line.as_bytes()).unwrap();
    writer.write_all(b"\r\n").unwrap();
}
