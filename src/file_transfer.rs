// LSNP Core — File Transfer Manager
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Reliable chunked file transfer on top of unreliable UDP: offer/accept
//! handshake, a sliding window of unacked chunks, per-chunk retransmission,
//! and inactivity timeout. Files are kept in memory for the duration of the
//! transfer (spec assumes small files); an implementation targeting large
//! files would need to offload writes without reordering within a file_id.

use crate::types::{now, UserId};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: u32 = 1024;
pub const WINDOW_SIZE: usize = 8;
pub const CHUNK_TIMEOUT_SECS: i64 = 1;
pub const MAX_CHUNK_RETRIES: u32 = 5;
pub const INACTIVITY_TIMEOUT_SECS: i64 = 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileTransferError {
    #[error("unknown file transfer {0}")]
    NotFound(String),
    #[error("a transfer with file_id {0} already exists")]
    AlreadyExists(String),
    #[error("FILE_ACCEPT for {0} came from {1}, expected the receiver")]
    Unauthorized(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Offered,
    Accepted,
    Transferring,
    Complete,
    Cancelled,
}

struct ChunkSlot {
    data: Vec<u8>,
    sent_at: Option<i64>,
    acked: bool,
    retries: u32,
}

pub struct OutgoingTransfer {
    pub file_id: String,
    pub receiver: UserId,
    pub filename: String,
    pub chunk_size: u32,
    pub total_chunks: u32,
    pub size: u64,
    chunks: Vec<ChunkSlot>,
    pub state: TransferState,
    last_activity: i64,
}

impl OutgoingTransfer {
    /// Chunks that need (re)sending right now, respecting the sliding
    /// window of in-flight unacked chunks.
    fn due_chunks(&mut self, at: i64) -> Vec<(u32, Vec<u8>)> {
        let in_flight = self.chunks.iter().filter(|c| c.sent_at.is_some() && !c.acked).count();
        let mut slots_left = WINDOW_SIZE.saturating_sub(in_flight);
        let mut due = Vec::new();
        for (seq, chunk) in self.chunks.iter_mut().enumerate() {
            if chunk.acked || slots_left == 0 {
                continue;
            }
            let needs_send = match chunk.sent_at {
                None => true,
                Some(t) => at - t >= CHUNK_TIMEOUT_SECS,
            };
            if !needs_send {
                continue;
            }
            if chunk.sent_at.is_some() {
                chunk.retries += 1;
                if chunk.retries > MAX_CHUNK_RETRIES {
                    continue;
                }
            }
            chunk.sent_at = Some(at);
            due.push((seq as u32, chunk.data.clone()));
            slots_left -= 1;
        }
        due
    }

    fn retries_exhausted(&self) -> bool {
        self.chunks.iter().any(|c| !c.acked && c.retries > MAX_CHUNK_RETRIES)
    }

    fn ack(&mut self, seq: u32) {
        if let Some(c) = self.chunks.get_mut(seq as usize) {
            c.acked = true;
        }
    }

    fn all_acked(&self) -> bool {
        self.chunks.iter().all(|c| c.acked)
    }
}

pub struct IncomingTransfer {
    pub file_id: String,
    pub sender: UserId,
    pub filename: String,
    pub size: u64,
    pub chunk_size: u32,
    pub total_chunks: u32,
    received: Vec<Option<Vec<u8>>>,
    pub state: TransferState,
    last_activity: i64,
}

impl IncomingTransfer {
    fn apply_chunk(&mut self, seq: u32, data: Vec<u8>) -> bool {
        match self.received.get_mut(seq as usize) {
            Some(slot @ None) => {
                *slot = Some(data);
                true
            }
            _ => false,
        }
    }

    fn is_complete(&self) -> bool {
        !self.received.is_empty() && self.received.iter().all(|c| c.is_some())
    }

    fn assemble(&self) -> Vec<u8> {
        self.received.iter().flat_map(|c| c.clone().unwrap_or_default()).collect()
    }
}

/// What the dispatcher should do after a tick: retransmit some chunks and/or
/// report transfers that timed out.
#[derive(Default)]
pub struct TickReport {
    pub retransmits: Vec<(UserId, String, u32, Vec<u8>)>,
    pub timed_out: Vec<String>,
}

/// A completed incoming transfer, ready to be written to disk by the caller.
pub struct CompletedTransfer {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct FileTransferManager {
    outgoing: HashMap<String, OutgoingTransfer>,
    incoming: HashMap<String, IncomingTransfer>,
}

impl FileTransferManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_file_id() -> String {
        hex::encode(rand::random::<[u8; 8]>())
    }

    /// `file_offer(user, path)` — chunk the file and register the outgoing
    /// transfer. Returns the metadata the dispatcher needs for FILE_OFFER.
    pub fn offer(&mut self, receiver: UserId, filename: String, data: Vec<u8>) -> (String, u64, u32, u32) {
        let file_id = Self::new_file_id();
        let size = data.len() as u64;
        let chunks: Vec<ChunkSlot> = data
            .chunks(DEFAULT_CHUNK_SIZE as usize)
            .map(|c| ChunkSlot { data: c.to_vec(), sent_at: None, acked: false, retries: 0 })
            .collect();
        let total_chunks = chunks.len() as u32;
        self.outgoing.insert(
            file_id.clone(),
            OutgoingTransfer {
                file_id: file_id.clone(),
                receiver,
                filename,
                chunk_size: DEFAULT_CHUNK_SIZE,
                total_chunks,
                size,
                chunks,
                state: TransferState::Offered,
                last_activity: now(),
            },
        );
        (file_id, size, DEFAULT_CHUNK_SIZE, total_chunks)
    }

    /// Inbound FILE_OFFER — the receiver surfaces the offer and waits for a
    /// local `file_accept`.
    pub fn receive_offer(
        &mut self,
        sender: UserId,
        file_id: String,
        filename: String,
        size: u64,
        chunk_size: u32,
        total_chunks: u32,
    ) -> Result<(), FileTransferError> {
        if self.incoming.contains_key(&file_id) {
            return Err(FileTransferError::AlreadyExists(file_id));
        }
        self.incoming.insert(
            file_id.clone(),
            IncomingTransfer {
                file_id,
                sender,
                filename,
                size,
                chunk_size,
                total_chunks,
                received: vec![None; total_chunks as usize],
                state: TransferState::Offered,
                last_activity: now(),
            },
        );
        Ok(())
    }

    /// `file_accept(file_id)` — local command on the receiver side. Returns
    /// the sender to address FILE_ACCEPT to.
    pub fn accept(&mut self, file_id: &str) -> Result<UserId, FileTransferError> {
        let transfer = self
            .incoming
            .get_mut(file_id)
            .ok_or_else(|| FileTransferError::NotFound(file_id.to_string()))?;
        transfer.state = TransferState::Accepted;
        transfer.last_activity = now();
        Ok(transfer.sender.clone())
    }

    /// Inbound FILE_ACCEPT — sender side. Begins transmitting chunks within
    /// the sliding window.
    pub fn receive_accept(&mut self, file_id: &str, from: &UserId) -> Result<Vec<(u32, Vec<u8>)>, FileTransferError> {
        let transfer = self
            .outgoing
            .get_mut(file_id)
            .ok_or_else(|| FileTransferError::NotFound(file_id.to_string()))?;
        if &transfer.receiver != from {
            return Err(FileTransferError::Unauthorized(file_id.to_string(), from.to_string()));
        }
        transfer.state = TransferState::Transferring;
        transfer.last_activity = now();
        Ok(transfer.due_chunks(now()))
    }

    /// Inbound ACK for an outgoing chunk. Advances the window and refills
    /// it; reports completion once every chunk is acked.
    pub fn receive_ack(&mut self, file_id: &str, seq: u32) -> Result<AckOutcome, FileTransferError> {
        let transfer = self
            .outgoing
            .get_mut(file_id)
            .ok_or_else(|| FileTransferError::NotFound(file_id.to_string()))?;
        transfer.ack(seq);
        transfer.last_activity = now();
        if transfer.all_acked() {
            self.outgoing.remove(file_id);
            return Ok(AckOutcome::Complete);
        }
        let more = transfer.due_chunks(now());
        Ok(AckOutcome::Progress(more))
    }

    /// Inbound FILE_CHUNK. Duplicates are idempotent — applied at most once,
    /// always (re-)ACKed by the caller regardless of outcome.
    pub fn receive_chunk(&mut self, file_id: &str, seq: u32, data: Vec<u8>) -> Result<ChunkOutcome, FileTransferError> {
        let transfer = self
            .incoming
            .get_mut(file_id)
            .ok_or_else(|| FileTransferError::NotFound(file_id.to_string()))?;
        transfer.apply_chunk(seq, data);
        transfer.last_activity = now();
        transfer.state = TransferState::Transferring;
        if transfer.is_complete() {
            let filename = transfer.filename.clone();
            let data = transfer.assemble();
            self.incoming.remove(file_id);
            return Ok(ChunkOutcome::Completed(CompletedTransfer { filename, data }));
        }
        Ok(ChunkOutcome::Pending)
    }

    /// Inbound FILE_COMPLETE. Finalizes if every chunk has in fact arrived;
    /// otherwise the transfer is left running (a genuine finish will arrive
    /// either via the last FILE_CHUNK or a later retransmitted one).
    pub fn receive_complete(&mut self, file_id: &str) -> Option<CompletedTransfer> {
        let transfer = self.incoming.get(file_id)?;
        if !transfer.is_complete() {
            return None;
        }
        let transfer = self.incoming.remove(file_id)?;
        Some(CompletedTransfer { filename: transfer.filename, data: transfer.assemble() })
    }

    pub fn cancel(&mut self, file_id: &str) {
        self.outgoing.remove(file_id);
        self.incoming.remove(file_id);
    }

    pub fn active_outgoing(&self) -> impl Iterator<Item = &OutgoingTransfer> {
        self.outgoing.values()
    }

    pub fn active_incoming(&self) -> impl Iterator<Item = &IncomingTransfer> {
        self.incoming.values()
    }

    /// Periodic tick: retransmit due chunks, cancel transfers that
    /// exhausted their retries, and cancel anything idle past the
    /// inactivity timeout.
    pub fn tick(&mut self) -> TickReport {
        let at = now();
        let mut report = TickReport::default();

        let mut cancel_outgoing = Vec::new();
        for (id, transfer) in self.outgoing.iter_mut() {
            if at - transfer.last_activity > INACTIVITY_TIMEOUT_SECS {
                cancel_outgoing.push(id.clone());
                continue;
            }
            if transfer.state != TransferState::Transferring {
                continue;
            }
            if transfer.retries_exhausted() {
                warn!(file_id = %id, "file transfer exhausted chunk retries, cancelling");
                cancel_outgoing.push(id.clone());
                continue;
            }
            for (seq, data) in transfer.due_chunks(at) {
                report.retransmits.push((transfer.receiver.clone(), id.clone(), seq, data));
            }
        }
        for id in cancel_outgoing {
            self.outgoing.remove(&id);
            report.timed_out.push(id);
        }

        let mut cancel_incoming = Vec::new();
        for (id, transfer) in self.incoming.iter() {
            if at - transfer.last_activity > INACTIVITY_TIMEOUT_SECS {
                cancel_incoming.push(id.clone());
            }
        }
        for id in cancel_incoming {
            self.incoming.remove(&id);
            debug!(file_id = %id, "incoming file transfer timed out");
            report.timed_out.push(id);
        }

        report
    }
}

pub enum AckOutcome {
    Progress(Vec<(u32, Vec<u8>)>),
    Complete,
}

pub enum ChunkOutcome {
    Pending,
    Completed(CompletedTransfer),
}
