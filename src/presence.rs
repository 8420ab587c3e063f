// LSNP Core — Presence Engine
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Periodic upkeep: broadcast PING/PROFILE so peers know we're alive, and
//! prune peers that have gone quiet. Pure scheduling — the actual frame
//! construction and socket I/O stay with the dispatcher.

use crate::types::now;

pub const PRESENCE_INTERVAL_SECS: i64 = 30;
pub const PRUNE_INTERVAL_SECS: i64 = 60;

/// Tracks when each periodic action last ran and tells the dispatcher's tick
/// handler what's due, the same small-owned-struct style the teacher uses
/// for its rate limiters rather than spawning a background task per timer.
pub struct PresenceEngine {
    last_presence_broadcast: i64,
    last_prune: i64,
}

impl PresenceEngine {
    pub fn new() -> Self {
        let start = now();
        Self { last_presence_broadcast: start, last_prune: start }
    }

    /// Call on every dispatcher tick. Returns `(broadcast_due, prune_due)`,
    /// advancing the relevant deadline(s) when due.
    pub fn poll(&mut self) -> (bool, bool) {
        let at = now();
        let broadcast_due = at - self.last_presence_broadcast >= PRESENCE_INTERVAL_SECS;
        if broadcast_due {
            self.last_presence_broadcast = at;
        }
        let prune_due = at - self.last_prune >= PRUNE_INTERVAL_SECS;
        if prune_due {
            self.last_prune = at;
        }
        (broadcast_due, prune_due)
    }
}

impl Default for PresenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_engine_is_not_immediately_due() {
        let mut engine = PresenceEngine::new();
        let (broadcast_due, prune_due) = engine.poll();
        assert!(!broadcast_due);
        assert!(!prune_due);
    }

    #[test]
    fn forcing_the_deadline_into_the_past_makes_it_due() {
        let mut engine = PresenceEngine::new();
        engine.last_presence_broadcast = now() - PRESENCE_INTERVAL_SECS - 1;
        engine.last_prune = now() - PRUNE_INTERVAL_SECS - 1;
        let (broadcast_due, prune_due) = engine.poll();
        assert!(broadcast_due);
        assert!(prune_due);
        // Having just fired, an immediate re-poll reports not due again.
        let (broadcast_due, prune_due) = engine.poll();
        assert!(!broadcast_due);
        assert!(!prune_due);
    }
}
