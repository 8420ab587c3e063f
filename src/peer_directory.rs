// LSNP Core — Peer Directory
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Tracks every peer LSNP has heard from: address, profile, and last-seen
//! time. The single source of truth for resolving a [`UserId`] to the
//! [`SocketAddr`] unicast sends go to.

use crate::types::{now, Avatar, UserId};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::debug;

/// Peer aged out once its last-seen exceeds 3x the presence interval.
pub const PRUNE_AGE_FACTOR: i64 = 3;

#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub user_id: UserId,
    pub addr: SocketAddr,
    pub display_name: String,
    pub status: String,
    pub avatar: Option<Avatar>,
    pub last_seen: i64,
}

impl PeerRecord {
    fn new(user_id: UserId, addr: SocketAddr) -> Self {
        let display_name = user_id.display_name().to_string();
        Self { user_id, addr, display_name, status: String::new(), avatar: None, last_seen: now() }
    }
}

/// Optional profile fields carried on a PROFILE frame; PING carries none of
/// these and only refreshes last-seen/address.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub status: Option<String>,
    pub avatar: Option<Avatar>,
}

#[derive(Default)]
pub struct PeerDirectory {
    peers: HashMap<UserId, PeerRecord>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe traffic from `user_id` at `addr`, applying `profile` fields if
    /// any were carried. Returns `true` the first time this userid is seen
    /// (the caller emits a discovery notification exactly once on `true`).
    pub fn observe(&mut self, user_id: &UserId, addr: SocketAddr, profile: Option<ProfileFields>) -> bool {
        let is_new = !self.peers.contains_key(user_id);
        let record = self
            .peers
            .entry(user_id.clone())
            .or_insert_with(|| PeerRecord::new(user_id.clone(), addr));
        record.addr = addr;
        record.last_seen = now();
        if let Some(profile) = profile {
            if let Some(name) = profile.display_name {
                record.display_name = name;
            }
            if let Some(status) = profile.status {
                record.status = status;
            }
            if profile.avatar.is_some() {
                record.avatar = profile.avatar;
            }
        }
        if is_new {
            debug!(peer = %user_id, %addr, "discovered new peer");
        }
        is_new
    }

    pub fn lookup(&self, user_id: &UserId) -> Option<&PeerRecord> {
        self.peers.get(user_id)
    }

    pub fn resolve_addr(&self, user_id: &UserId) -> Option<SocketAddr> {
        self.peers.get(user_id).map(|p| p.addr)
    }

    pub fn list(&self) -> Vec<&PeerRecord> {
        let mut peers: Vec<_> = self.peers.values().collect();
        peers.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        peers
    }

    /// Drop every peer whose `last_seen` exceeds `PRUNE_AGE_FACTOR *
    /// presence_interval_secs`. Returns the pruned userids.
    pub fn prune(&mut self, presence_interval_secs: i64) -> Vec<UserId> {
        let max_age = PRUNE_AGE_FACTOR * presence_interval_secs;
        let cutoff = now() - max_age;
        let stale: Vec<UserId> = self
            .peers
            .iter()
            .filter(|(_, p)| p.last_seen < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.peers.remove(id);
            debug!(peer = %id, "pruned stale peer");
        }
        stale
    }
}
