//! # List
//!
//! This module exposes the parser for Unix-style `LIST` output lines.
//!
//! The LIST format has never been specified, so this parser targets the
//! `ls -l` shape emitted by the vast majority of Unix FTP servers: nine
//! space-separated fields where the ninth is the file name, possibly with
//! embedded spaces. MS-DOS style listings are not supported.
//!
//! ```rust
//! use std::str::FromStr;
//! use ftpslite::list::DirEntry;
//!
//! let entry = DirEntry::from_str("-rw-rw-r-- 1 user group 8192 Nov 5 2018 report.txt").unwrap();
//! assert_eq!(entry.name(), "report");
//! assert_eq!(entry.extension(), "txt");
//! ```

use std::convert::TryFrom;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use chrono::prelude::{NaiveDateTime, Utc};
use chrono::Datelike;
use thiserror::Error;

/// Kind of a remote directory entry
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EntryKind {
    File,
    Folder,
    Link,
}

/// One decoded line of a `LIST` response
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DirEntry {
    kind: EntryKind,
    name: String,
    extension: String,
    size: u64,
    modified: SystemTime,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("unsupported line format")]
    LineFormat,
    #[error("unknown entry type '{0}'")]
    UnknownEntryType(char),
    #[error("bad file size")]
    BadSize,
    #[error("invalid modification date")]
    InvalidDate,
}

impl DirEntry {
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// File name without the extension
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Text after the last `.` of the file name; empty when the name has no
    /// dot
    pub fn extension(&self) -> &str {
        self.extension.as_str()
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time, GMT
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn is_link(&self) -> bool {
        self.kind == EntryKind::Link
    }

    /// Decode one listing line.
    ///
    /// The line is split on single spaces into at most nine fields, so the
    /// name field keeps any embedded spaces. Column-aligned listings with
    /// runs of spaces between fields are not supported and fail to parse.
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.splitn(9, ' ').collect();
        if fields.len() < 9 {
            return Err(ParseError::LineFormat);
        }
        let kind = match fields[0].chars().next() {
            Some('-') => EntryKind::File,
            Some('d') => EntryKind::Folder,
            Some('l') => EntryKind::Link,
            Some(other) => return Err(ParseError::UnknownEntryType(other)),
            None => return Err(ParseError::LineFormat),
        };
        let size = fields[4].parse::<u64>().map_err(|_| ParseError::BadSize)?;
        let modified = Self::parse_lstime(fields[5], fields[6], fields[7])?;
        let raw_name = fields[8].trim_end_matches(['\r', '\n']);
        let (name, extension) = match raw_name.rfind('.') {
            Some(idx) => (raw_name[..idx].to_string(), raw_name[idx + 1..].to_string()),
            None => (raw_name.to_string(), String::new()),
        };
        trace!(
            "parsed dir entry: kind {:?}, name '{}', ext '{}', size {}",
            kind,
            name,
            extension,
            size
        );
        Ok(DirEntry {
            kind,
            name,
            extension,
            size,
            modified,
        })
    }

    /// `ls` prints `HH:MM` for entries modified in the current year and the
    /// year itself for older entries; the field containing a `:` tells the
    /// two shapes apart.
    fn parse_lstime(month: &str, day: &str, clue: &str) -> Result<SystemTime, ParseError> {
        let composed = if clue.contains(':') {
            format!("{} {} {:02} {}", day, month, Utc::now().year() % 100, clue)
        } else {
            if clue.len() < 4 {
                return Err(ParseError::InvalidDate);
            }
            format!("{} {} {} 00:00", day, month, &clue[clue.len() - 2..])
        };
        let datetime = NaiveDateTime::parse_from_str(&composed, "%d %b %y %H:%M")
            .map_err(|_| ParseError::InvalidDate)?;
        Ok(SystemTime::UNIX_EPOCH
            .checked_add(Duration::from_secs(datetime.and_utc().timestamp() as u64))
            .unwrap_or(SystemTime::UNIX_EPOCH))
    }
}

impl FromStr for DirEntry {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_line(s)
    }
}

impl TryFrom<&str> for DirEntry {
    type Error = ParseError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        Self::from_line(line)
    }
}

impl TryFrom<String> for DirEntry {
    type Error = ParseError;

    fn try_from(line: String) -> Result<Self, Self::Error> {
        Self::from_line(line.as_str())
    }
}
