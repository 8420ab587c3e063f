// LSNP Core — Shared Types
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Identifiers and small value types shared across every subsystem.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// `name@ip` identifier for a peer, stable for the lifetime of its process.
///
/// Userids are compared and hashed as opaque strings — LSNP does not
/// normalize case or whitespace, matching the wire format's plain-text
/// nature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(name: impl Into<String>, ip: impl fmt::Display) -> Self {
        Self(format!("{}@{}", name.into(), ip))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before `@`, or the whole string if there is no `@`.
    pub fn display_name(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Epoch-second timestamp source. Centralized so tests can reason about it
/// and so a single clock definition is shared by tokens, posts, and presence.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

/// Optional avatar carried on a PROFILE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub mime_type: String,
    pub data: Vec<u8>,
}
