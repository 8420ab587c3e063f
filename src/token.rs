// LSNP Core — Token Service
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Token minting and validation. Tokens are authorization markers scoped to
//! a purpose and expiry, not secrets — LSNP has no confidentiality goal.

use crate::types::{now, UserId};
use std::fmt;
use thiserror::Error;

/// Receiver-side tolerance for sender/receiver clock skew around a token's
/// expiry. Not specified by the source; documented here per the design
/// notes' open question.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Chat,
    Broadcast,
    Follow,
    Group,
    File,
    Game,
    Like,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Chat => "chat",
            Scope::Broadcast => "broadcast",
            Scope::Follow => "follow",
            Scope::Group => "group",
            Scope::File => "file",
            Scope::Game => "game",
            Scope::Like => "like",
        };
        f.write_str(s)
    }
}

impl Scope {
    fn parse(s: &str) -> Option<Scope> {
        match s {
            "chat" => Some(Scope::Chat),
            "broadcast" => Some(Scope::Broadcast),
            "follow" => Some(Scope::Follow),
            "group" => Some(Scope::Group),
            "file" => Some(Scope::File),
            "game" => Some(Scope::Game),
            "like" => Some(Scope::Like),
            _ => None,
        }
    }

    /// Scope required of the token attached to a message of this wire TYPE.
    /// `ACK` carries no token and is not mapped.
    pub fn required_for(type_name: &str) -> Option<Scope> {
        match type_name {
            "DM" | "GROUP_MESSAGE" => Some(Scope::Chat),
            "POST" | "PROFILE" | "PING" => Some(Scope::Broadcast),
            "FOLLOW" | "UNFOLLOW" => Some(Scope::Follow),
            "LIKE" => Some(Scope::Like),
            "GROUP_CREATE" | "GROUP_UPDATE" => Some(Scope::Group),
            "FILE_OFFER" | "FILE_ACCEPT" | "FILE_CHUNK" | "FILE_COMPLETE" => Some(Scope::File),
            "TICTACTOE_INVITE" | "TICTACTOE_ACCEPT" | "TICTACTOE_MOVE" | "TICTACTOE_RESULT" => {
                Some(Scope::Game)
            }
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not in userid|expiry|scope format")]
    BadFormat,
    #[error("token issuer does not match claimed sender")]
    IssuerMismatch,
    #[error("token expired")]
    Expired,
    #[error("token scope does not match required scope")]
    ScopeMismatch,
}

/// A parsed `userid|expiry|scope` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub issuer: UserId,
    pub expiry: i64,
    pub scope: Scope,
}

impl Token {
    pub fn parse(s: &str) -> Result<Token, TokenError> {
        let mut parts = s.splitn(3, '|');
        let (issuer, expiry, scope) = match (parts.next(), parts.next(), parts.next()) {
            (Some(i), Some(e), Some(s)) if !i.is_empty() => (i, e, s),
            _ => return Err(TokenError::BadFormat),
        };
        let expiry: i64 = expiry.parse().map_err(|_| TokenError::BadFormat)?;
        let scope = Scope::parse(scope).ok_or(TokenError::BadFormat)?;
        Ok(Token { issuer: UserId::from(issuer), expiry, scope })
    }

    pub fn to_string_wire(&self) -> String {
        format!("{}|{}|{}", self.issuer, self.expiry, self.scope)
    }
}

/// Mints tokens on behalf of the local peer and validates inbound ones.
pub struct TokenService {
    local_user: UserId,
}

impl TokenService {
    pub fn new(local_user: UserId) -> Self {
        Self { local_user }
    }

    /// `issue(scope, ttl) -> "userid|expiry|scope"`, expiry = now + ttl.
    pub fn issue(&self, scope: Scope, ttl_seconds: i64) -> String {
        Token {
            issuer: self.local_user.clone(),
            expiry: now() + ttl_seconds,
            scope,
        }
        .to_string_wire()
    }

    /// Validate `token_str` for a message claiming to be from
    /// `claimed_sender`, requiring `required_scope`.
    pub fn validate(
        &self,
        token_str: &str,
        claimed_sender: &UserId,
        required_scope: Scope,
    ) -> Result<(), TokenError> {
        let token = Token::parse(token_str)?;
        if &token.issuer != claimed_sender {
            return Err(TokenError::IssuerMismatch);
        }
        if now() > token.expiry + CLOCK_SKEW_TOLERANCE_SECS {
            return Err(TokenError::Expired);
        }
        if token.scope != required_scope {
            return Err(TokenError::ScopeMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(s: &str) -> UserId {
        UserId::from(s)
    }

    #[test]
    fn issue_then_validate_succeeds() {
        let svc = TokenService::new(user("Alice@127.0.0.1"));
        let token = svc.issue(Scope::Broadcast, 30);
        assert!(svc.validate(&token, &user("Alice@127.0.0.1"), Scope::Broadcast).is_ok());
    }

    #[test]
    fn bad_format_is_rejected() {
        let svc = TokenService::new(user("Alice@127.0.0.1"));
        let err = svc.validate("not-a-token", &user("Alice@127.0.0.1"), Scope::Broadcast).unwrap_err();
        assert_eq!(err, TokenError::BadFormat);
    }

    #[test]
    fn issuer_mismatch_is_rejected() {
        let svc = TokenService::new(user("Alice@127.0.0.1"));
        let token = svc.issue(Scope::Chat, 30);
        let err = svc.validate(&token, &user("Mallory@127.0.0.9"), Scope::Chat).unwrap_err();
        assert_eq!(err, TokenError::IssuerMismatch);
    }

    #[test]
    fn scope_mismatch_is_rejected() {
        let svc = TokenService::new(user("Alice@127.0.0.1"));
        let token = svc.issue(Scope::Game, 30);
        let err = svc.validate(&token, &user("Alice@127.0.0.1"), Scope::Chat).unwrap_err();
        assert_eq!(err, TokenError::ScopeMismatch);
    }

    #[test]
    fn expiry_monotonicity() {
        let token = Token { issuer: user("Alice@127.0.0.1"), expiry: now() - 1000, scope: Scope::Chat }
            .to_string_wire();
        let svc = TokenService::new(user("Bob@127.0.0.2"));
        let err = svc.validate(&token, &user("Alice@127.0.0.1"), Scope::Chat).unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn within_clock_skew_tolerance_is_still_valid() {
        let token = Token {
            issuer: user("Alice@127.0.0.1"),
            expiry: now() - (CLOCK_SKEW_TOLERANCE_SECS - 5),
            scope: Scope::Chat,
        }
        .to_string_wire();
        let svc = TokenService::new(user("Bob@127.0.0.2"));
        assert!(svc.validate(&token, &user("Alice@127.0.0.1"), Scope::Chat).is_ok());
    }

    #[test]
    fn scope_required_for_known_types() {
        assert_eq!(Scope::required_for("DM"), Some(Scope::Chat));
        assert_eq!(Scope::required_for("POST"), Some(Scope::Broadcast));
        assert_eq!(Scope::required_for("FOLLOW"), Some(Scope::Follow));
        assert_eq!(Scope::required_for("GROUP_CREATE"), Some(Scope::Group));
        assert_eq!(Scope::required_for("FILE_CHUNK"), Some(Scope::File));
        assert_eq!(Scope::required_for("TICTACTOE_MOVE"), Some(Scope::Game));
        assert_eq!(Scope::required_for("LIKE"), Some(Scope::Like));
        assert_eq!(Scope::required_for("ACK"), None);
    }
}
