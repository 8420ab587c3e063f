// LSNP Core — Group Manager
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Named groups with owner-mutable membership. Each peer tracks only the
//! groups it participates in — groups are not globally unique.

use crate::types::UserId;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupError {
    #[error("unknown group")]
    NotFound,
    #[error("only the group owner may do this")]
    Unauthorized,
    #[error("sender is not a member of this group")]
    NotMember,
    #[error("group already exists")]
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub group_id: String,
    pub title: String,
    pub owner: UserId,
    pub members: HashSet<UserId>,
}

impl Group {
    pub fn is_member(&self, who: &UserId) -> bool {
        self.members.contains(who)
    }
}

#[derive(Default)]
pub struct GroupManager {
    groups: HashMap<String, Group>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, group_id: &str) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn list(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// `create(group_id, title)` — local user becomes owner and sole member.
    pub fn create(&mut self, group_id: String, title: String, local_user: UserId) -> Result<&Group, GroupError> {
        if self.groups.contains_key(&group_id) {
            return Err(GroupError::AlreadyExists);
        }
        let mut members = HashSet::new();
        members.insert(local_user.clone());
        self.groups.insert(group_id.clone(), Group { group_id: group_id.clone(), title, owner: local_user, members });
        Ok(self.groups.get(&group_id).expect("just inserted"))
    }

    /// Owner-only membership change. Returns the full resulting member set
    /// to broadcast in GROUP_UPDATE.
    pub fn update(
        &mut self,
        group_id: &str,
        requester: &UserId,
        add: &[UserId],
        remove: &[UserId],
    ) -> Result<HashSet<UserId>, GroupError> {
        let group = self.groups.get_mut(group_id).ok_or(GroupError::NotFound)?;
        if &group.owner != requester {
            return Err(GroupError::Unauthorized);
        }
        for user in add {
            group.members.insert(user.clone());
        }
        for user in remove {
            group.members.remove(user);
        }
        Ok(group.members.clone())
    }

    /// Any current member may send; returns the unicast targets (every
    /// member except the sender).
    pub fn recipients_for_message(&self, group_id: &str, sender: &UserId) -> Result<Vec<UserId>, GroupError> {
        let group = self.groups.get(group_id).ok_or(GroupError::NotFound)?;
        if !group.is_member(sender) {
            return Err(GroupError::NotMember);
        }
        Ok(group.members.iter().filter(|m| *m != sender).cloned().collect())
    }

    /// Inbound GROUP_CREATE — learn of a group we didn't create, owned by
    /// `sender`.
    pub fn receive_create(&mut self, group_id: String, title: String, sender: UserId) {
        self.groups.entry(group_id.clone()).or_insert_with(|| {
            let mut members = HashSet::new();
            members.insert(sender.clone());
            Group { group_id, title, owner: sender, members }
        });
    }

    /// Inbound GROUP_UPDATE. The member set it carries is authoritative for
    /// the recipient's view of the group — it fully replaces the existing
    /// set. Ignored (per spec) if it didn't come from the owner.
    pub fn receive_update(&mut self, group_id: &str, sender: &UserId, members: HashSet<UserId>) -> Result<(), GroupError> {
        let group = self.groups.get_mut(group_id).ok_or(GroupError::NotFound)?;
        if &group.owner != sender {
            debug!(%group_id, sender = %sender, owner = %group.owner, "ignoring GROUP_UPDATE from non-owner");
            return Err(GroupError::Unauthorized);
        }
        group.members = members;
        Ok(())
    }

    /// Inbound GROUP_MESSAGE: accepted only if `sender` is a current member.
    pub fn accept_message(&self, group_id: &str, sender: &UserId) -> Result<&Group, GroupError> {
        let group = self.groups.get(group_id).ok_or(GroupError::NotFound)?;
        if !group.is_member(sender) {
            return Err(GroupError::NotMember);
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(s: &str) -> UserId {
        UserId::from(s)
    }

    #[test]
    fn create_makes_owner_sole_member() {
        let mut mgr = GroupManager::new();
        let alice = user("Alice@127.0.0.1");
        let group = mgr.create("studygroup".into(), "CSNETWK Study Group".into(), alice.clone()).unwrap();
        assert_eq!(group.owner, alice);
        assert_eq!(group.members.len(), 1);
    }

    #[test]
    fn non_owner_cannot_update() {
        let mut mgr = GroupManager::new();
        let alice = user("Alice@127.0.0.1");
        let bob = user("Bob@127.0.0.2");
        mgr.create("studygroup".into(), "t".into(), alice).unwrap();
        let err = mgr.update("studygroup", &bob, &[bob.clone()], &[]).unwrap_err();
        assert_eq!(err, GroupError::Unauthorized);
    }

    #[test]
    fn group_lifecycle_scenario() {
        let mut mgr = GroupManager::new();
        let alice = user("Alice@127.0.0.1");
        let bob = user("Bob@127.0.0.2");
        let charlie = user("Charlie@127.0.0.3");
        mgr.create("studygroup".into(), "CSNETWK Study Group".into(), alice.clone()).unwrap();
        mgr.update("studygroup", &alice, &[bob.clone()], &[]).unwrap();
        let members = mgr.update("studygroup", &alice, &[charlie.clone()], &[]).unwrap();
        assert_eq!(members.len(), 3);

        let recipients = mgr.recipients_for_message("studygroup", &bob).unwrap();
        assert_eq!(recipients.len(), 2);
        assert!(recipients.contains(&alice));
        assert!(recipients.contains(&charlie));
    }

    #[test]
    fn message_from_non_member_is_dropped() {
        let mut mgr = GroupManager::new();
        let alice = user("Alice@127.0.0.1");
        let mallory = user("Mallory@127.0.0.9");
        mgr.create("g".into(), "t".into(), alice).unwrap();
        let err = mgr.accept_message("g", &mallory).unwrap_err();
        assert_eq!(err, GroupError::NotMember);
    }

    #[test]
    fn receive_update_from_non_owner_is_ignored() {
        let mut mgr = GroupManager::new();
        let alice = user("Alice@127.0.0.1");
        let bob = user("Bob@127.0.0.2");
        mgr.receive_create("g".into(), "t".into(), alice.clone());
        let mut set = HashSet::new();
        set.insert(bob.clone());
        let err = mgr.receive_update("g", &bob, set).unwrap_err();
        assert_eq!(err, GroupError::Unauthorized);
        assert!(mgr.get("g").unwrap().is_member(&alice));
    }
}
