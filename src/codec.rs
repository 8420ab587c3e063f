// LSNP Core — Wire Codec
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Line-oriented key/value wire framing and the typed [`Frame`] it encodes.
//!
//! The wire format is ASCII, newline-delimited `KEY: VALUE` pairs terminated
//! by a blank line. [`RawFrame`] is the untyped boundary representation;
//! everything above the codec deals only in [`Frame`], a tagged variant per
//! known `TYPE`. This split is the "dynamic message maps" note from the
//! design notes made concrete: the codec is the one place that still thinks
//! in string maps.

use crate::types::UserId;
use base64::Engine;
use std::fmt;
use thiserror::Error;

/// Datagrams larger than this are rejected before parsing (spec caps a
/// frame at 8 KiB to fit a single UDP packet).
pub const MAX_FRAME_SIZE: usize = 8 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame exceeds {MAX_FRAME_SIZE} bytes")]
    TooLarge,
    #[error("malformed frame: line {0:?} has no ':'")]
    MalformedFrame(String),
    #[error("missing required field {0} for TYPE {1}")]
    MissingField(&'static str, String),
    #[error("frame has no TYPE field")]
    NoType,
    #[error("field {0} is not valid: {1}")]
    InvalidField(&'static str, String),
}

/// The untyped wire-level map, order-preserving so serialization round-trips
/// deterministically (spec.md §8's codec round-trip property).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    fields: Vec<(String, String)>,
}

impl RawFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if let Some(existing) = self.fields.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value;
        } else {
            self.fields.push((key.to_string(), value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn type_name(&self) -> Option<&str> {
        self.get("TYPE")
    }

    fn require<'a>(&'a self, key: &'static str) -> Result<&'a str, CodecError> {
        self.get(key)
            .ok_or_else(|| CodecError::MissingField(key, self.type_name().unwrap_or("?").into()))
    }
}

/// Parse a single wire frame out of `bytes`. Lines after the first blank
/// line are ignored (a datagram holds exactly one frame).
pub fn parse(bytes: &[u8]) -> Result<RawFrame, CodecError> {
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(CodecError::TooLarge);
    }
    let text = String::from_utf8_lossy(bytes);
    let mut frame = RawFrame::new();
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| CodecError::MalformedFrame(line.to_string()))?;
        frame.set(key.trim(), value.trim_start());
    }
    if frame.type_name().is_none() {
        return Err(CodecError::NoType);
    }
    Ok(frame)
}

/// Serialize `frame` back to wire bytes, keys in insertion order, terminated
/// by a blank line.
pub fn serialize(frame: &RawFrame) -> Vec<u8> {
    let mut out = String::new();
    for (key, value) in &frame.fields {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');
    out.into_bytes()
}

fn b64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn b64_decode(s: &str, field: &'static str) -> Result<Vec<u8>, CodecError> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| CodecError::InvalidField(field, e.to_string()))
}

fn parse_u64(s: &str, field: &'static str) -> Result<u64, CodecError> {
    s.parse().map_err(|_| CodecError::InvalidField(field, s.to_string()))
}

fn parse_u32(s: &str, field: &'static str) -> Result<u32, CodecError> {
    s.parse().map_err(|_| CodecError::InvalidField(field, s.to_string()))
}

fn parse_i64(s: &str, field: &'static str) -> Result<i64, CodecError> {
    s.parse().map_err(|_| CodecError::InvalidField(field, s.to_string()))
}

fn split_list(s: &str) -> Vec<UserId> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(|p| UserId::from(p.trim())).collect()
    }
}

fn join_list(ids: &[UserId]) -> String {
    ids.iter().map(|u| u.as_str()).collect::<Vec<_>>().join(",")
}

/// Outcome of a tic-tac-toe game, carried on `TICTACTOE_RESULT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    WinX,
    WinO,
    Draw,
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameOutcome::WinX => "WIN_X",
            GameOutcome::WinO => "WIN_O",
            GameOutcome::Draw => "DRAW",
        };
        f.write_str(s)
    }
}

impl GameOutcome {
    fn parse(s: &str) -> Result<Self, CodecError> {
        match s {
            "WIN_X" => Ok(GameOutcome::WinX),
            "WIN_O" => Ok(GameOutcome::WinO),
            "DRAW" => Ok(GameOutcome::Draw),
            other => Err(CodecError::InvalidField("RESULT", other.to_string())),
        }
    }
}

/// Typed LSNP wire message. One variant per known `TYPE`; anything else is
/// kept as [`Frame::Unknown`] so the dispatcher can still log it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Ping { user_id: UserId, token: String },
    Profile {
        user_id: UserId,
        display_name: String,
        status: String,
        avatar_type: Option<String>,
        avatar_data: Option<Vec<u8>>,
        token: String,
    },
    Post { user_id: UserId, content: String, timestamp: i64, token: String },
    Dm { user_id: UserId, to: UserId, content: String, timestamp: i64, token: String },
    Follow { user_id: UserId, to: UserId, token: String },
    Unfollow { user_id: UserId, to: UserId, token: String },
    Like { user_id: UserId, to: UserId, post_timestamp: i64, token: String },
    GroupCreate { user_id: UserId, group_id: String, title: String, token: String },
    GroupUpdate {
        user_id: UserId,
        group_id: String,
        members: Vec<UserId>,
        token: String,
    },
    GroupMessage { user_id: UserId, group_id: String, content: String, timestamp: i64, token: String },
    FileOffer {
        user_id: UserId,
        to: UserId,
        file_id: String,
        filename: String,
        size: u64,
        chunk_size: u32,
        total_chunks: u32,
        token: String,
    },
    FileAccept { user_id: UserId, to: UserId, file_id: String, token: String },
    FileChunk { user_id: UserId, to: UserId, file_id: String, seq: u32, data: Vec<u8>, token: String },
    FileComplete { user_id: UserId, to: UserId, file_id: String, token: String },
    Ack { user_id: UserId, to: UserId, file_id: String, seq: u32 },
    TictactoeInvite { user_id: UserId, to: UserId, game_id: String, token: String },
    TictactoeAccept { user_id: UserId, to: UserId, game_id: String, token: String },
    TictactoeMove {
        user_id: UserId,
        to: UserId,
        game_id: String,
        position: u8,
        move_seq: u32,
        token: String,
    },
    TictactoeResult { user_id: UserId, to: UserId, game_id: String, outcome: GameOutcome, token: String },
    Unknown { type_name: String, raw: RawFrame },
}

impl Frame {
    pub fn type_name(&self) -> &str {
        match self {
            Frame::Ping { .. } => "PING",
            Frame::Profile { .. } => "PROFILE",
            Frame::Post { .. } => "POST",
            Frame::Dm { .. } => "DM",
            Frame::Follow { .. } => "FOLLOW",
            Frame::Unfollow { .. } => "UNFOLLOW",
            Frame::Like { .. } => "LIKE",
            Frame::GroupCreate { .. } => "GROUP_CREATE",
            Frame::GroupUpdate { .. } => "GROUP_UPDATE",
            Frame::GroupMessage { .. } => "GROUP_MESSAGE",
            Frame::FileOffer { .. } => "FILE_OFFER",
            Frame::FileAccept { .. } => "FILE_ACCEPT",
            Frame::FileChunk { .. } => "FILE_CHUNK",
            Frame::FileComplete { .. } => "FILE_COMPLETE",
            Frame::Ack { .. } => "ACK",
            Frame::TictactoeInvite { .. } => "TICTACTOE_INVITE",
            Frame::TictactoeAccept { .. } => "TICTACTOE_ACCEPT",
            Frame::TictactoeMove { .. } => "TICTACTOE_MOVE",
            Frame::TictactoeResult { .. } => "TICTACTOE_RESULT",
            Frame::Unknown { type_name, .. } => type_name,
        }
    }

    /// `USER_ID` (sender) of every known frame type; `Unknown` has none.
    pub fn sender(&self) -> Option<&UserId> {
        match self {
            Frame::Ping { user_id, .. }
            | Frame::Profile { user_id, .. }
            | Frame::Post { user_id, .. }
            | Frame::Dm { user_id, .. }
            | Frame::Follow { user_id, .. }
            | Frame::Unfollow { user_id, .. }
            | Frame::Like { user_id, .. }
            | Frame::GroupCreate { user_id, .. }
            | Frame::GroupUpdate { user_id, .. }
            | Frame::GroupMessage { user_id, .. }
            | Frame::FileOffer { user_id, .. }
            | Frame::FileAccept { user_id, .. }
            | Frame::FileChunk { user_id, .. }
            | Frame::FileComplete { user_id, .. }
            | Frame::Ack { user_id, .. }
            | Frame::TictactoeInvite { user_id, .. }
            | Frame::TictactoeAccept { user_id, .. }
            | Frame::TictactoeMove { user_id, .. }
            | Frame::TictactoeResult { user_id, .. } => Some(user_id),
            Frame::Unknown { .. } => None,
        }
    }

    /// Token string attached to the frame, where the TYPE requires one.
    /// `ACK` and `Unknown` carry none.
    pub fn token(&self) -> Option<&str> {
        match self {
            Frame::Ping { token, .. }
            | Frame::Profile { token, .. }
            | Frame::Post { token, .. }
            | Frame::Dm { token, .. }
            | Frame::Follow { token, .. }
            | Frame::Unfollow { token, .. }
            | Frame::Like { token, .. }
            | Frame::GroupCreate { token, .. }
            | Frame::GroupUpdate { token, .. }
            | Frame::GroupMessage { token, .. }
            | Frame::FileOffer { token, .. }
            | Frame::FileAccept { token, .. }
            | Frame::FileChunk { token, .. }
            | Frame::FileComplete { token, .. }
            | Frame::TictactoeInvite { token, .. }
            | Frame::TictactoeAccept { token, .. }
            | Frame::TictactoeMove { token, .. }
            | Frame::TictactoeResult { token, .. } => Some(token),
            Frame::Ack { .. } | Frame::Unknown { .. } => None,
        }
    }

    /// Decode a validated [`RawFrame`] into its typed variant, checking the
    /// fields required for its `TYPE`.
    pub fn decode(raw: RawFrame) -> Result<Frame, CodecError> {
        let type_name = raw.type_name().expect("parse() guarantees TYPE").to_string();
        let user_id = || -> Result<UserId, CodecError> {
            Ok(UserId::from(raw.require("USER_ID")?))
        };
        let to = || -> Result<UserId, CodecError> { Ok(UserId::from(raw.require("TO")?)) };
        let token = || -> Result<String, CodecError> { Ok(raw.require("TOKEN")?.to_string()) };

        let frame = match type_name.as_str() {
            "PING" => Frame::Ping { user_id: user_id()?, token: token()? },
            "PROFILE" => {
                let avatar_type = raw.get("AVATAR_TYPE").map(str::to_string);
                let avatar_data = match raw.get("AVATAR_DATA") {
                    Some(d) => Some(b64_decode(d, "AVATAR_DATA")?),
                    None => None,
                };
                Frame::Profile {
                    user_id: user_id()?,
                    display_name: raw.require("DISPLAY_NAME")?.to_string(),
                    status: raw.require("STATUS")?.to_string(),
                    avatar_type,
                    avatar_data,
                    token: token()?,
                }
            }
            "POST" => Frame::Post {
                user_id: user_id()?,
                content: raw.require("CONTENT")?.to_string(),
                timestamp: parse_i64(raw.require("TIMESTAMP")?, "TIMESTAMP")?,
                token: token()?,
            },
            "DM" => Frame::Dm {
                user_id: user_id()?,
                to: to()?,
                content: raw.require("CONTENT")?.to_string(),
                timestamp: parse_i64(raw.require("TIMESTAMP")?, "TIMESTAMP")?,
                token: token()?,
            },
            "FOLLOW" => Frame::Follow { user_id: user_id()?, to: to()?, token: token()? },
            "UNFOLLOW" => Frame::Unfollow { user_id: user_id()?, to: to()?, token: token()? },
            "LIKE" => Frame::Like {
                user_id: user_id()?,
                to: to()?,
                post_timestamp: parse_i64(raw.require("POST_TIMESTAMP")?, "POST_TIMESTAMP")?,
                token: token()?,
            },
            "GROUP_CREATE" => Frame::GroupCreate {
                user_id: user_id()?,
                group_id: raw.require("GROUP_ID")?.to_string(),
                title: raw.require("TITLE")?.to_string(),
                token: token()?,
            },
            "GROUP_UPDATE" => Frame::GroupUpdate {
                user_id: user_id()?,
                group_id: raw.require("GROUP_ID")?.to_string(),
                members: split_list(raw.get("MEMBERS").unwrap_or("")),
                token: token()?,
            },
            "GROUP_MESSAGE" => Frame::GroupMessage {
                user_id: user_id()?,
                group_id: raw.require("GROUP_ID")?.to_string(),
                content: raw.require("CONTENT")?.to_string(),
                timestamp: parse_i64(raw.require("TIMESTAMP")?, "TIMESTAMP")?,
                token: token()?,
            },
            "FILE_OFFER" => Frame::FileOffer {
                user_id: user_id()?,
                to: to()?,
                file_id: raw.require("FILE_ID")?.to_string(),
                filename: raw.require("FILENAME")?.to_string(),
                size: parse_u64(raw.require("FILESIZE")?, "FILESIZE")?,
                chunk_size: parse_u32(raw.require("CHUNK_SIZE")?, "CHUNK_SIZE")?,
                total_chunks: parse_u32(raw.require("TOTAL_CHUNKS")?, "TOTAL_CHUNKS")?,
                token: token()?,
            },
            "FILE_ACCEPT" => Frame::FileAccept {
                user_id: user_id()?,
                to: to()?,
                file_id: raw.require("FILE_ID")?.to_string(),
                token: token()?,
            },
            "FILE_CHUNK" => Frame::FileChunk {
                user_id: user_id()?,
                to: to()?,
                file_id: raw.require("FILE_ID")?.to_string(),
                seq: parse_u32(raw.require("SEQ")?, "SEQ")?,
                data: b64_decode(raw.require("DATA")?, "DATA")?,
                token: token()?,
            },
            "FILE_COMPLETE" => Frame::FileComplete {
                user_id: user_id()?,
                to: to()?,
                file_id: raw.require("FILE_ID")?.to_string(),
                token: token()?,
            },
            "ACK" => Frame::Ack {
                user_id: user_id()?,
                to: to()?,
                file_id: raw.require("FILE_ID")?.to_string(),
                seq: parse_u32(raw.require("SEQ")?, "SEQ")?,
            },
            "TICTACTOE_INVITE" => Frame::TictactoeInvite {
                user_id: user_id()?,
                to: to()?,
                game_id: raw.require("GAME_ID")?.to_string(),
                token: token()?,
            },
            "TICTACTOE_ACCEPT" => Frame::TictactoeAccept {
                user_id: user_id()?,
                to: to()?,
                game_id: raw.require("GAME_ID")?.to_string(),
                token: token()?,
            },
            "TICTACTOE_MOVE" => Frame::TictactoeMove {
                user_id: user_id()?,
                to: to()?,
                game_id: raw.require("GAME_ID")?.to_string(),
                position: parse_u32(raw.require("POSITION")?, "POSITION")? as u8,
                move_seq: parse_u32(raw.require("MOVE_SEQ")?, "MOVE_SEQ")?,
                token: token()?,
            },
            "TICTACTOE_RESULT" => Frame::TictactoeResult {
                user_id: user_id()?,
                to: to()?,
                game_id: raw.require("GAME_ID")?.to_string(),
                outcome: GameOutcome::parse(raw.require("RESULT")?)?,
                token: token()?,
            },
            _ => Frame::Unknown { type_name, raw },
        };
        Ok(frame)
    }

    /// Encode back to the wire-level [`RawFrame`] (inverse of [`Frame::decode`]).
    pub fn encode(&self) -> RawFrame {
        let mut raw = RawFrame::new();
        raw.set("TYPE", self.type_name());
        match self {
            Frame::Ping { user_id, token } => {
                raw.set("USER_ID", user_id.as_str()).set("TOKEN", token);
            }
            Frame::Profile { user_id, display_name, status, avatar_type, avatar_data, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("DISPLAY_NAME", display_name.clone())
                    .set("STATUS", status.clone());
                if let Some(t) = avatar_type {
                    raw.set("AVATAR_TYPE", t.clone());
                }
                if let Some(d) = avatar_data {
                    raw.set("AVATAR_DATA", b64_encode(d));
                }
                raw.set("TOKEN", token);
            }
            Frame::Post { user_id, content, timestamp, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("CONTENT", content.clone())
                    .set("TIMESTAMP", timestamp.to_string())
                    .set("TOKEN", token);
            }
            Frame::Dm { user_id, to, content, timestamp, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("CONTENT", content.clone())
                    .set("TIMESTAMP", timestamp.to_string())
                    .set("TOKEN", token);
            }
            Frame::Follow { user_id, to, token } | Frame::Unfollow { user_id, to, token } => {
                raw.set("USER_ID", user_id.as_str()).set("TO", to.as_str()).set("TOKEN", token);
            }
            Frame::Like { user_id, to, post_timestamp, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("POST_TIMESTAMP", post_timestamp.to_string())
                    .set("TOKEN", token);
            }
            Frame::GroupCreate { user_id, group_id, title, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("GROUP_ID", group_id.clone())
                    .set("TITLE", title.clone())
                    .set("TOKEN", token);
            }
            Frame::GroupUpdate { user_id, group_id, members, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("GROUP_ID", group_id.clone())
                    .set("MEMBERS", join_list(members))
                    .set("TOKEN", token);
            }
            Frame::GroupMessage { user_id, group_id, content, timestamp, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("GROUP_ID", group_id.clone())
                    .set("CONTENT", content.clone())
                    .set("TIMESTAMP", timestamp.to_string())
                    .set("TOKEN", token);
            }
            Frame::FileOffer { user_id, to, file_id, filename, size, chunk_size, total_chunks, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("FILE_ID", file_id.clone())
                    .set("FILENAME", filename.clone())
                    .set("FILESIZE", size.to_string())
                    .set("CHUNK_SIZE", chunk_size.to_string())
                    .set("TOTAL_CHUNKS", total_chunks.to_string())
                    .set("TOKEN", token);
            }
            Frame::FileAccept { user_id, to, file_id, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("FILE_ID", file_id.clone())
                    .set("TOKEN", token);
            }
            Frame::FileChunk { user_id, to, file_id, seq, data, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("FILE_ID", file_id.clone())
                    .set("SEQ", seq.to_string())
                    .set("DATA", b64_encode(data))
                    .set("TOKEN", token);
            }
            Frame::FileComplete { user_id, to, file_id, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("FILE_ID", file_id.clone())
                    .set("TOKEN", token);
            }
            Frame::Ack { user_id, to, file_id, seq } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("FILE_ID", file_id.clone())
                    .set("SEQ", seq.to_string());
            }
            Frame::TictactoeInvite { user_id, to, game_id, token }
            | Frame::TictactoeAccept { user_id, to, game_id, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("GAME_ID", game_id.clone())
                    .set("TOKEN", token);
            }
            Frame::TictactoeMove { user_id, to, game_id, position, move_seq, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("GAME_ID", game_id.clone())
                    .set("POSITION", position.to_string())
                    .set("MOVE_SEQ", move_seq.to_string())
                    .set("TOKEN", token);
            }
            Frame::TictactoeResult { user_id, to, game_id, outcome, token } => {
                raw.set("USER_ID", user_id.as_str())
                    .set("TO", to.as_str())
                    .set("GAME_ID", game_id.clone())
                    .set("RESULT", outcome.to_string())
                    .set("TOKEN", token);
            }
            Frame::Unknown { raw: original, .. } => return original.clone(),
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_missing_colon() {
        let err = parse(b"TYPE PING\n\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedFrame(_)));
    }

    #[test]
    fn parse_rejects_missing_type() {
        let err = parse(b"USER_ID: a@b\n\n").unwrap_err();
        assert_eq!(err, CodecError::NoType);
    }

    #[test]
    fn parse_stops_at_blank_line() {
        let raw = parse(b"TYPE: PING\nUSER_ID: a@b\n\nTYPE: POST\n").unwrap();
        assert_eq!(raw.get("TYPE"), Some("PING"));
    }

    #[test]
    fn serialize_preserves_insertion_order() {
        let mut raw = RawFrame::new();
        raw.set("TYPE", "PING").set("USER_ID", "a@b").set("TOKEN", "a@b|0|broadcast");
        let bytes = serialize(&raw);
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "TYPE: PING");
        assert_eq!(lines[1], "USER_ID: a@b");
        assert_eq!(lines[2], "TOKEN: a@b|0|broadcast");
    }

    #[test]
    fn round_trip_post() {
        let frame = Frame::Post {
            user_id: UserId::from("Alice@127.0.0.1"),
            content: "hello".into(),
            timestamp: 12345,
            token: "Alice@127.0.0.1|99999|broadcast".into(),
        };
        let encoded = serialize(&frame.encode());
        let raw = parse(&encoded).unwrap();
        let decoded = Frame::decode(raw).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn round_trip_file_chunk_with_binary_data() {
        let frame = Frame::FileChunk {
            user_id: UserId::from("A@1"),
            to: UserId::from("B@2"),
            file_id: "deadbeef".into(),
            seq: 3,
            data: vec![0, 1, 2, 255, 254],
            token: "A@1|1|file".into(),
        };
        let encoded = serialize(&frame.encode());
        let decoded = Frame::decode(parse(&encoded).unwrap()).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn decode_missing_field_names_the_type() {
        let mut raw = RawFrame::new();
        raw.set("TYPE", "POST").set("USER_ID", "a@b");
        let err = Frame::decode(raw).unwrap_err();
        assert_eq!(err, CodecError::MissingField("CONTENT", "POST".into()));
    }

    #[test]
    fn unknown_type_is_preserved_for_logging() {
        let raw = parse(b"TYPE: SOMETHING_NEW\nUSER_ID: a@b\n\n").unwrap();
        let frame = Frame::decode(raw.clone()).unwrap();
        match &frame {
            Frame::Unknown { type_name, raw: r } => {
                assert_eq!(type_name, "SOMETHING_NEW");
                assert_eq!(r, &raw);
            }
            _ => panic!("expected Unknown"),
        }
    }
}
