//! # Regex
//!
//! Regular expressions used to pick values out of reply bodies

use lazy_regex::{Lazy, Regex};

/// Extracts the `YYYYMMDDHHMMSS` modification time from a MDTM reply.
pub static MDTM_RE: Lazy<Regex> = lazy_regex!(r"\b(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})\b");

/// Extracts the byte count from a SIZE reply.
pub static SIZE_RE: Lazy<Regex> = lazy_regex!(r"(\d+)\s*$");
