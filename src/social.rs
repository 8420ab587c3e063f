// LSNP Core — Social State
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Follow graph, post log, and like log. Pure state — minting tokens and
//! sending frames is the dispatcher's job; this module only decides what to
//! keep and what to drop.

use crate::types::{now, UserId};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub author: UserId,
    pub timestamp: i64,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Like {
    pub liker: UserId,
    pub author: UserId,
    pub post_timestamp: i64,
}

pub struct SocialState {
    /// This peer's own identity, stamped as the author of its own posts and
    /// likes.
    local_user: UserId,
    /// Peers the local user follows — governs acceptance of inbound POST.
    following: HashSet<UserId>,
    /// Peers that follow the local user.
    followers: HashSet<UserId>,
    /// The local user's own posts, retained indefinitely.
    own_posts: Vec<Post>,
    /// Posts accepted from followed authors.
    received_posts: Vec<Post>,
    /// Likes received on the local user's own posts.
    likes: Vec<Like>,
}

impl SocialState {
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            following: HashSet::new(),
            followers: HashSet::new(),
            own_posts: Vec::new(),
            received_posts: Vec::new(),
            likes: Vec::new(),
        }
    }

    // ---- follows -----------------------------------------------------

    pub fn follow(&mut self, target: UserId) {
        self.following.insert(target);
    }

    pub fn unfollow(&mut self, target: &UserId) {
        self.following.remove(target);
    }

    pub fn is_following(&self, target: &UserId) -> bool {
        self.following.contains(target)
    }

    pub fn following(&self) -> impl Iterator<Item = &UserId> {
        self.following.iter()
    }

    /// Record an inbound FOLLOW/UNFOLLOW — updates who follows *us*.
    /// Returns `true` if this changed anything worth a notification.
    pub fn set_follower(&mut self, who: UserId, following: bool) -> bool {
        if following {
            self.followers.insert(who)
        } else {
            self.followers.remove(&who)
        }
    }

    pub fn is_follower(&self, who: &UserId) -> bool {
        self.followers.contains(who)
    }

    // ---- posts ---------------------------------------------------------

    /// `post(body)` — timestamp with the current epoch second and append to
    /// the outgoing log.
    pub fn post(&mut self, body: String) -> Post {
        let post = Post { author: self.local_user.clone(), timestamp: now(), body };
        self.own_posts.push(post.clone());
        post
    }

    /// Receiving a POST: dropped by the caller (dispatcher) unless
    /// `is_following(&author)`; this method only performs the insertion once
    /// that gate has already passed.
    pub fn accept_post(&mut self, author: UserId, timestamp: i64, body: String) {
        debug!(%author, timestamp, "accepted post from followed peer");
        self.received_posts.push(Post { author, timestamp, body });
    }

    pub fn own_posts(&self) -> &[Post] {
        &self.own_posts
    }

    pub fn received_posts(&self) -> &[Post] {
        &self.received_posts
    }

    pub fn has_own_post_at(&self, timestamp: i64) -> bool {
        self.own_posts.iter().any(|p| p.timestamp == timestamp)
    }

    // ---- likes -----------------------------------------------------------

    /// Receiving a LIKE: the author side stores it against one of its own
    /// posts. Returns `true` iff this is new (not a duplicate liker +
    /// timestamp pair) and the post actually exists — both conditions the
    /// dispatcher needs to decide whether to notify.
    pub fn receive_like(&mut self, liker: UserId, post_timestamp: i64) -> bool {
        if !self.has_own_post_at(post_timestamp) {
            return false;
        }
        let duplicate = self
            .likes
            .iter()
            .any(|l| l.liker == liker && l.post_timestamp == post_timestamp);
        if duplicate {
            return false;
        }
        self.likes.push(Like { liker, author: self.local_user.clone(), post_timestamp });
        true
    }

    pub fn likes_for(&self, post_timestamp: i64) -> impl Iterator<Item = &Like> {
        self.likes.iter().filter(move |l| l.post_timestamp == post_timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> UserId {
        UserId::from("Alice@127.0.0.1")
    }

    #[test]
    fn follow_gates_post_acceptance() {
        let mut state = SocialState::new(local());
        let bob = UserId::from("Bob@127.0.0.2");
        assert!(!state.is_following(&bob));
        state.follow(bob.clone());
        assert!(state.is_following(&bob));
        state.unfollow(&bob);
        assert!(!state.is_following(&bob));
    }

    #[test]
    fn own_posts_are_retained() {
        let mut state = SocialState::new(local());
        let post = state.post("hello".into());
        assert_eq!(state.own_posts().len(), 1);
        assert_eq!(post.author, local());
        assert!(state.has_own_post_at(post.timestamp));
    }

    #[test]
    fn received_post_recorded_when_accepted() {
        let mut state = SocialState::new(local());
        state.accept_post(UserId::from("Bob@127.0.0.2"), 10, "Hello".into());
        assert_eq!(state.received_posts().len(), 1);
        assert_eq!(state.received_posts()[0].body, "Hello");
    }

    #[test]
    fn duplicate_like_is_idempotent() {
        let mut state = SocialState::new(local());
        let post = state.post("hi".into());
        let alice = UserId::from("Alice-liker@127.0.0.9");
        assert!(state.receive_like(alice.clone(), post.timestamp));
        assert!(!state.receive_like(alice, post.timestamp));
        assert_eq!(state.likes_for(post.timestamp).count(), 1);
    }

    #[test]
    fn like_for_unknown_post_is_ignored() {
        let mut state = SocialState::new(local());
        assert!(!state.receive_like(UserId::from("Alice@127.0.0.1"), 999));
    }
}
