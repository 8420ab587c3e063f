// LSNP Core — Dispatcher
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! The event loop every other module answers to. A single `tokio::select!`
//! over inbound datagrams, a 1-second tick, and a command channel from the
//! CLI — no subsystem spawns its own task or owns a socket.

use crate::codec::{Frame, GameOutcome};
use crate::config::PeerConfig;
use crate::file_transfer::{AckOutcome, ChunkOutcome, FileTransferError, FileTransferManager};
use crate::game::{GameError, GameManager};
use crate::group::{GroupError, GroupManager};
use crate::peer_directory::{PeerDirectory, ProfileFields};
use crate::presence::PresenceEngine;
use crate::social::SocialState;
use crate::token::{Scope, Token, TokenError, TokenService};
use crate::transport::{Transport, TransportError};
use crate::types::{now, Avatar, UserId};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Token lifetime minted for outgoing frames. Not specified by the source;
/// long enough that ordinary clock skew and retransmission delay never
/// expire a token before its message is acted on.
pub const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown peer {0}")]
    UnknownPeer(String),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    FileTransfer(#[from] FileTransferError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Error, Debug)]
enum InboundError {
    #[error("message is not addressed to this peer")]
    NotAddressedToUs,
    #[error("sender is unknown to this peer")]
    NoSender,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    FileTransfer(#[from] FileTransferError),
}

/// Local commands the CLI front-end (or a test harness) feeds in. Mirrors
/// the wire TYPE each produces, plus the read-only listing commands and
/// runtime toggles.
#[derive(Debug, Clone)]
pub enum Command {
    SetProfile { status: String, avatar: Option<Avatar> },
    Post { body: String },
    Dm { to: UserId, body: String },
    Follow { to: UserId },
    Unfollow { to: UserId },
    Like { to: UserId, post_timestamp: i64 },
    GroupCreate { group_id: String, title: String },
    GroupUpdate { group_id: String, add: Vec<UserId>, remove: Vec<UserId> },
    GroupMessage { group_id: String, body: String },
    FileOffer { to: UserId, filename: String, data: Vec<u8> },
    FileAccept { file_id: String },
    GameInvite { game_id: String, to: UserId },
    GameAccept { game_id: String },
    GameMove { game_id: String, position: u8 },
    ToggleVerbose,
    ListPeers,
    ListDms,
    ListPosts,
    ListGroups,
}

/// A direct message received from another peer, kept only so the `dms`
/// command has something to list — LSNP has no delivery receipt beyond that.
#[derive(Debug, Clone)]
struct ReceivedDm {
    from: UserId,
    timestamp: i64,
    body: String,
}

pub struct Dispatcher {
    local_user: UserId,
    config: PeerConfig,
    transport: Transport,
    tokens: TokenService,
    peers: PeerDirectory,
    social: SocialState,
    groups: GroupManager,
    files: FileTransferManager,
    games: GameManager,
    presence: PresenceEngine,
    profile: ProfileFields,
    received_dms: Vec<ReceivedDm>,
    verbose: bool,
}

impl Dispatcher {
    pub fn new(local_user: UserId, config: PeerConfig, transport: Transport) -> Self {
        let verbose = config.verbose;
        Self {
            tokens: TokenService::new(local_user.clone()),
            social: SocialState::new(local_user.clone()),
            local_user,
            config,
            transport,
            peers: PeerDirectory::new(),
            groups: GroupManager::new(),
            files: FileTransferManager::new(),
            games: GameManager::new(),
            presence: PresenceEngine::new(),
            profile: ProfileFields::default(),
            received_dms: Vec::new(),
            verbose,
        }
    }

    fn issue(&self, scope: Scope) -> String {
        self.tokens.issue(scope, TOKEN_TTL_SECS)
    }

    fn known_addrs(&self) -> Vec<SocketAddr> {
        self.peers.list().into_iter().map(|p| p.addr).collect()
    }

    fn resolve(&self, user: &UserId) -> Result<SocketAddr, CommandError> {
        self.peers.resolve_addr(user).ok_or_else(|| CommandError::UnknownPeer(user.to_string()))
    }

    async fn send_to(&self, frame: &Frame, to: &UserId) -> Result<(), CommandError> {
        let addr = self.resolve(to)?;
        self.transport.send_unicast(frame, addr).await?;
        Ok(())
    }

    async fn broadcast(&self, frame: &Frame) -> Result<(), CommandError> {
        self.transport.send_broadcast(frame, &self.known_addrs()).await?;
        Ok(())
    }

    fn log_outbound(&self, frame: &Frame) {
        if self.verbose {
            info!(direction = "out", type_name = frame.type_name(), frame = ?frame, "frame");
        }
    }

    fn log_inbound(&self, frame: &Frame, from: SocketAddr) {
        if self.verbose {
            info!(direction = "in", %from, type_name = frame.type_name(), frame = ?frame, "frame");
        }
    }

    /// `[Security] Invalid token for <TYPE> from <sender>: <Reason> (expected
    /// <scope>, got <scope>)` — the notification spec.md requires whenever an
    /// inbound token fails validation, surfaced only in verbose mode.
    fn log_security_violation(&self, type_name: &str, sender: &UserId, required: Scope, token_str: &str, err: &TokenError) {
        if !self.verbose {
            return;
        }
        let detail = match err {
            TokenError::ScopeMismatch => {
                let got = Token::parse(token_str).map(|t| t.scope.to_string()).unwrap_or_else(|_| "?".to_string());
                format!("{err:?} (expected {required}, got {got})")
            }
            other => format!("{other:?}"),
        };
        warn!("[Security] Invalid token for {type_name} from {sender}: {detail}");
    }

    /// Drives the event loop until the command channel closes.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                result = self.transport.recv() => {
                    if let Ok((frame, from)) = result {
                        self.log_inbound(&frame, from);
                        if let Err(e) = self.handle_inbound(frame, from).await {
                            debug!(%from, error = %e, "inbound frame not accepted");
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.handle_tick().await;
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if let Err(e) = self.handle_command(cmd).await {
                                warn!(error = %e, "command failed");
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    }

    // ---- inbound frames --------------------------------------------------

    async fn handle_inbound(&mut self, frame: Frame, from: SocketAddr) -> Result<(), InboundError> {
        let sender = frame.sender().cloned().ok_or(InboundError::NoSender)?;
        if let Some(required) = Scope::required_for(frame.type_name()) {
            let token = frame.token().unwrap_or_default();
            if let Err(e) = self.tokens.validate(token, &sender, required) {
                self.log_security_violation(frame.type_name(), &sender, required, token, &e);
                return Err(InboundError::Token(e));
            }
        }

        let profile = match &frame {
            Frame::Profile { display_name, status, avatar_type, avatar_data, .. } => Some(ProfileFields {
                display_name: Some(display_name.clone()),
                status: Some(status.clone()),
                avatar: match (avatar_type, avatar_data) {
                    (Some(mime), Some(data)) => Some(Avatar { mime_type: mime.clone(), data: data.clone() }),
                    _ => None,
                },
            }),
            _ => None,
        };
        let newly_discovered = self.peers.observe(&sender, from, profile);
        if newly_discovered {
            info!(peer = %sender, "peer discovered");
        }

        match frame {
            Frame::Ping { .. } => {}
            Frame::Profile { .. } => {}
            Frame::Post { user_id, content, timestamp, .. } => {
                if self.social.is_following(&user_id) {
                    self.social.accept_post(user_id, timestamp, content);
                } else {
                    trace!(author = %user_id, "dropping post from unfollowed author");
                }
            }
            Frame::Dm { user_id, to, content, timestamp, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                info!(from = %user_id, %content, "dm received");
                self.received_dms.push(ReceivedDm { from: user_id, timestamp, body: content });
            }
            Frame::Follow { user_id, to, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                self.social.set_follower(user_id, true);
            }
            Frame::Unfollow { user_id, to, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                self.social.set_follower(user_id, false);
            }
            Frame::Like { user_id, to, post_timestamp, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                self.social.receive_like(user_id, post_timestamp);
            }
            Frame::GroupCreate { user_id, group_id, title, .. } => {
                self.groups.receive_create(group_id, title, user_id);
            }
            Frame::GroupUpdate { user_id, group_id, members, .. } => {
                let members: HashSet<UserId> = members.into_iter().collect();
                self.groups.receive_update(&group_id, &user_id, members)?;
            }
            Frame::GroupMessage { user_id, group_id, content, .. } => {
                self.groups.accept_message(&group_id, &user_id)?;
                info!(group = %group_id, from = %user_id, %content, "group message received");
            }
            Frame::FileOffer { user_id, to, file_id, filename, size, chunk_size, total_chunks, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                self.files.receive_offer(user_id.clone(), file_id.clone(), filename, size, chunk_size, total_chunks)?;
                info!(from = %user_id, %file_id, "file offer received, awaiting file_accept");
            }
            Frame::FileAccept { user_id, to, file_id, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                let initial = self.files.receive_accept(&file_id, &user_id)?;
                for (seq, data) in initial {
                    let chunk = Frame::FileChunk {
                        user_id: self.local_user.clone(),
                        to: user_id.clone(),
                        file_id: file_id.clone(),
                        seq,
                        data,
                        token: self.issue(Scope::File),
                    };
                    self.log_outbound(&chunk);
                    let _ = self.send_to(&chunk, &user_id).await;
                }
            }
            Frame::FileChunk { user_id, to, file_id, seq, data, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                let outcome = self.files.receive_chunk(&file_id, seq, data)?;
                let ack = Frame::Ack { user_id: self.local_user.clone(), to: user_id.clone(), file_id: file_id.clone(), seq };
                self.log_outbound(&ack);
                let _ = self.send_to(&ack, &user_id).await;
                if let ChunkOutcome::Completed(completed) = outcome {
                    info!(%file_id, filename = %completed.filename, bytes = completed.data.len(), "file transfer complete");
                }
            }
            Frame::FileComplete { file_id, .. } => {
                if let Some(completed) = self.files.receive_complete(&file_id) {
                    info!(%file_id, filename = %completed.filename, "file transfer finalized");
                }
            }
            Frame::Ack { to, file_id, seq, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                match self.files.receive_ack(&file_id, seq) {
                    Ok(AckOutcome::Progress(more)) => {
                        if let Some(transfer) = self.files.active_outgoing().find(|t| t.file_id == file_id) {
                            let receiver = transfer.receiver.clone();
                            for (seq, data) in more {
                                let chunk = Frame::FileChunk {
                                    user_id: self.local_user.clone(),
                                    to: receiver.clone(),
                                    file_id: file_id.clone(),
                                    seq,
                                    data,
                                    token: self.issue(Scope::File),
                                };
                                self.log_outbound(&chunk);
                                let _ = self.send_to(&chunk, &receiver).await;
                            }
                        }
                    }
                    Ok(AckOutcome::Complete) => {
                        info!(%file_id, "outgoing file transfer acknowledged complete");
                    }
                    Err(_) => {}
                }
            }
            Frame::TictactoeInvite { user_id, to, game_id, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                self.games.receive_invite(game_id.clone(), user_id.clone())?;
                info!(from = %user_id, %game_id, "game invite received, awaiting game_accept");
            }
            Frame::TictactoeAccept { user_id, to, game_id, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                self.games.receive_accept(&game_id, &user_id)?;
                info!(%game_id, "opponent accepted, game active");
            }
            Frame::TictactoeMove { user_id, to, game_id, position, move_seq, .. } => {
                if to != self.local_user {
                    return Err(InboundError::NotAddressedToUs);
                }
                let applied = self.games.receive_move(&game_id, &user_id, position, move_seq)?;
                if let Some(outcome) = applied.outcome {
                    self.send_game_result(&game_id, &user_id, outcome).await;
                }
            }
            Frame::TictactoeResult { game_id, outcome, .. } => {
                self.games.receive_result(&game_id, outcome)?;
                info!(%game_id, outcome = %outcome, "game concluded");
            }
            Frame::Unknown { type_name, .. } => {
                debug!(%type_name, "unknown frame type");
            }
        }
        Ok(())
    }

    async fn send_game_result(&self, game_id: &str, opponent: &UserId, outcome: GameOutcome) {
        let frame = Frame::TictactoeResult {
            user_id: self.local_user.clone(),
            to: opponent.clone(),
            game_id: game_id.to_string(),
            outcome,
            token: self.issue(Scope::Game),
        };
        self.log_outbound(&frame);
        let _ = self.send_to(&frame, opponent).await;
    }

    // ---- periodic tick ----------------------------------------------------

    async fn handle_tick(&mut self) {
        let (broadcast_due, prune_due) = self.presence.poll();
        if broadcast_due {
            let ping = Frame::Ping { user_id: self.local_user.clone(), token: self.issue(Scope::Broadcast) };
            self.log_outbound(&ping);
            let _ = self.broadcast(&ping).await;
        }
        if prune_due {
            for pruned in self.peers.prune(self.config.prune_interval_secs) {
                info!(peer = %pruned, "peer pruned after inactivity");
            }
        }

        let report = self.files.tick();
        for (receiver, file_id, seq, data) in report.retransmits {
            let chunk = Frame::FileChunk {
                user_id: self.local_user.clone(),
                to: receiver.clone(),
                file_id,
                seq,
                data,
                token: self.issue(Scope::File),
            };
            self.log_outbound(&chunk);
            let _ = self.send_to(&chunk, &receiver).await;
        }
        for file_id in report.timed_out {
            warn!(%file_id, "file transfer timed out");
        }
    }

    // ---- local commands -----------------------------------------------------

    async fn handle_command(&mut self, cmd: Command) -> Result<(), CommandError> {
        match cmd {
            Command::SetProfile { status, avatar } => {
                let display_name = self.local_user.display_name().to_string();
                self.profile = ProfileFields { display_name: Some(display_name.clone()), status: Some(status.clone()), avatar: avatar.clone() };
                let frame = Frame::Profile {
                    user_id: self.local_user.clone(),
                    display_name,
                    status,
                    avatar_type: avatar.as_ref().map(|a| a.mime_type.clone()),
                    avatar_data: avatar.map(|a| a.data),
                    token: self.issue(Scope::Broadcast),
                };
                self.log_outbound(&frame);
                self.broadcast(&frame).await
            }
            Command::Post { body } => {
                let post = self.social.post(body.clone());
                let frame = Frame::Post { user_id: self.local_user.clone(), content: body, timestamp: post.timestamp, token: self.issue(Scope::Broadcast) };
                self.log_outbound(&frame);
                self.broadcast(&frame).await
            }
            Command::Dm { to, body } => {
                let frame = Frame::Dm { user_id: self.local_user.clone(), to: to.clone(), content: body, timestamp: now(), token: self.issue(Scope::Chat) };
                self.log_outbound(&frame);
                self.send_to(&frame, &to).await
            }
            Command::Follow { to } => {
                self.social.follow(to.clone());
                let frame = Frame::Follow { user_id: self.local_user.clone(), to: to.clone(), token: self.issue(Scope::Follow) };
                self.log_outbound(&frame);
                self.send_to(&frame, &to).await
            }
            Command::Unfollow { to } => {
                self.social.unfollow(&to);
                let frame = Frame::Unfollow { user_id: self.local_user.clone(), to: to.clone(), token: self.issue(Scope::Follow) };
                self.log_outbound(&frame);
                self.send_to(&frame, &to).await
            }
            Command::Like { to, post_timestamp } => {
                let frame = Frame::Like { user_id: self.local_user.clone(), to: to.clone(), post_timestamp, token: self.issue(Scope::Like) };
                self.log_outbound(&frame);
                self.send_to(&frame, &to).await
            }
            Command::GroupCreate { group_id, title } => {
                self.groups.create(group_id.clone(), title.clone(), self.local_user.clone())?;
                let frame = Frame::GroupCreate { user_id: self.local_user.clone(), group_id, title, token: self.issue(Scope::Group) };
                self.log_outbound(&frame);
                self.broadcast(&frame).await
            }
            Command::GroupUpdate { group_id, add, remove } => {
                let members = self.groups.update(&group_id, &self.local_user, &add, &remove)?;
                let frame = Frame::GroupUpdate {
                    user_id: self.local_user.clone(),
                    group_id,
                    members: members.into_iter().collect(),
                    token: self.issue(Scope::Group),
                };
                self.log_outbound(&frame);
                self.broadcast(&frame).await
            }
            Command::GroupMessage { group_id, body } => {
                let recipients = self.groups.recipients_for_message(&group_id, &self.local_user)?;
                let frame = Frame::GroupMessage { user_id: self.local_user.clone(), group_id, content: body, timestamp: now(), token: self.issue(Scope::Chat) };
                self.log_outbound(&frame);
                for to in recipients {
                    self.send_to(&frame, &to).await?;
                }
                Ok(())
            }
            Command::FileOffer { to, filename, data } => {
                let (file_id, size, chunk_size, total_chunks) = self.files.offer(to.clone(), filename.clone(), data);
                let frame = Frame::FileOffer {
                    user_id: self.local_user.clone(),
                    to: to.clone(),
                    file_id,
                    filename,
                    size,
                    chunk_size,
                    total_chunks,
                    token: self.issue(Scope::File),
                };
                self.log_outbound(&frame);
                self.send_to(&frame, &to).await
            }
            Command::FileAccept { file_id } => {
                let sender = self.files.accept(&file_id)?;
                let frame = Frame::FileAccept { user_id: self.local_user.clone(), to: sender.clone(), file_id, token: self.issue(Scope::File) };
                self.log_outbound(&frame);
                self.send_to(&frame, &sender).await
            }
            Command::GameInvite { game_id, to } => {
                self.games.invite(game_id.clone(), to.clone())?;
                let frame = Frame::TictactoeInvite { user_id: self.local_user.clone(), to: to.clone(), game_id, token: self.issue(Scope::Game) };
                self.log_outbound(&frame);
                self.send_to(&frame, &to).await
            }
            Command::GameAccept { game_id } => {
                let opponent = self.games.accept(&game_id)?;
                let frame = Frame::TictactoeAccept { user_id: self.local_user.clone(), to: opponent.clone(), game_id, token: self.issue(Scope::Game) };
                self.log_outbound(&frame);
                self.send_to(&frame, &opponent).await
            }
            Command::GameMove { game_id, position } => {
                let opponent = self
                    .games
                    .get(&game_id)
                    .map(|g| g.opponent.clone())
                    .ok_or(CommandError::Game(GameError::NotFound))?;
                let applied = self.games.make_move(&game_id, position)?;
                let frame = Frame::TictactoeMove {
                    user_id: self.local_user.clone(),
                    to: opponent.clone(),
                    game_id: game_id.clone(),
                    position,
                    move_seq: applied.move_seq,
                    token: self.issue(Scope::Game),
                };
                self.log_outbound(&frame);
                self.send_to(&frame, &opponent).await?;
                if let Some(outcome) = applied.outcome {
                    self.send_game_result(&game_id, &opponent, outcome).await;
                }
                Ok(())
            }
            Command::ToggleVerbose => {
                self.verbose = !self.verbose;
                println!("verbose: {}", self.verbose);
                Ok(())
            }
            Command::ListPeers => {
                for peer in self.peers.list() {
                    println!("{} {} last_seen={} status={}", peer.user_id, peer.addr, peer.last_seen, peer.status);
                }
                Ok(())
            }
            Command::ListDms => {
                for dm in &self.received_dms {
                    println!("[{}] {}: {}", dm.timestamp, dm.from, dm.body);
                }
                Ok(())
            }
            Command::ListPosts => {
                for post in self.social.own_posts().iter().chain(self.social.received_posts()) {
                    println!("[{}] {}: {}", post.timestamp, post.author, post.body);
                }
                Ok(())
            }
            Command::ListGroups => {
                for group in self.groups.list() {
                    println!("{} \"{}\" members={}", group.group_id, group.title, group.members.len());
                }
                Ok(())
            }
        }
    }

    pub fn peers(&self) -> &PeerDirectory {
        &self.peers
    }
    pub fn social(&self) -> &SocialState {
        &self.social
    }
    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportMode;
    use std::net::{IpAddr, Ipv4Addr};

    async fn dispatcher_for(name: &str) -> Dispatcher {
        let transport = Transport::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, TransportMode::Simulate).await.unwrap();
        let addr = transport.local_addr().unwrap();
        let local_user = UserId::new(name, addr.ip());
        let config = PeerConfig {
            username: name.to_string(),
            mode: TransportMode::Simulate,
            ip: addr.ip(),
            port: addr.port(),
            verbose: false,
            presence_interval_secs: crate::presence::PRESENCE_INTERVAL_SECS,
            prune_interval_secs: crate::presence::PRUNE_INTERVAL_SECS,
        };
        Dispatcher::new(local_user, config, transport)
    }

    #[tokio::test]
    async fn follow_gated_post_is_accepted_only_after_follow() {
        let mut alice = dispatcher_for("Alice").await;
        let bob = dispatcher_for("Bob").await;
        let bob_addr = bob.transport.local_addr().unwrap();
        let bob_id = bob.local_user.clone();
        alice.peers.observe(&bob_id, bob_addr, None);

        let post = Frame::Post { user_id: bob_id.clone(), content: "hi".into(), timestamp: 42, token: format!("{}|{}|broadcast", bob_id, now() + 60) };
        alice.handle_inbound(post.clone(), bob_addr).await.unwrap();
        assert!(alice.social.received_posts().is_empty());

        alice.social.follow(bob_id.clone());
        alice.handle_inbound(post, bob_addr).await.unwrap();
        assert_eq!(alice.social.received_posts().len(), 1);
    }

    #[tokio::test]
    async fn bad_scope_token_is_rejected() {
        let mut alice = dispatcher_for("Alice").await;
        let bob_id = UserId::from("Bob@127.0.0.2");
        let bad_token = format!("{}|{}|file", bob_id, now() + 60);
        let post = Frame::Post { user_id: bob_id.clone(), content: "hi".into(), timestamp: 1, token: bad_token };
        let err = alice.handle_inbound(post, "127.0.0.2:9999".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, InboundError::Token(TokenError::ScopeMismatch)));
    }
}
