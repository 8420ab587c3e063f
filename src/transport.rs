// LSNP Core — Transport
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! UDP datagram transport. Wraps a single [`tokio::net::UdpSocket`] bound to
//! one port shared by unicast and broadcast traffic, matching the spec's
//! "no per-peer port assignment" resolution of its open question (see
//! DESIGN.md). `simulate` mode addresses peers directly over loopback
//! instead of the network broadcast address, for running a whole LSNP
//! network of peers on one host during tests and demos.

use crate::codec::{self, CodecError, Frame};
use socket2::{Domain, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{trace, warn};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("datagram did not decode: {0}")]
    Decode(#[from] CodecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Real LAN broadcast on `255.255.255.255:<port>`.
    Broadcast,
    /// Loopback-only, every peer on a distinct port on `127.0.0.1`. Used to
    /// run and test a whole network of peers from a single process/host.
    Simulate,
}

pub struct Transport {
    socket: UdpSocket,
    mode: TransportMode,
    port: u16,
}

impl Transport {
    /// Bind `ip:port`. In [`TransportMode::Broadcast`] the socket is created
    /// with `SO_BROADCAST` via `socket2` before being handed to tokio.
    pub async fn bind(ip: IpAddr, port: u16, mode: TransportMode) -> Result<Self, TransportError> {
        let addr = SocketAddr::new(ip, port);
        let socket2 = Socket::new(Domain::for_address(addr), Type::DGRAM, None)?;
        socket2.set_reuse_address(true)?;
        if mode == TransportMode::Broadcast {
            socket2.set_broadcast(true)?;
        }
        socket2.set_nonblocking(true)?;
        socket2.bind(&addr.into())?;
        let socket = UdpSocket::from_std(socket2.into())?;
        Ok(Self { socket, mode, port })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The address every peer listens on for broadcast traffic. In
    /// [`TransportMode::Simulate`] there is no single broadcast address —
    /// callers must unicast to each known peer instead.
    pub fn broadcast_addr(&self) -> Option<SocketAddr> {
        match self.mode {
            TransportMode::Broadcast => Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), self.port)),
            TransportMode::Simulate => None,
        }
    }

    pub async fn send_unicast(&self, frame: &Frame, to: SocketAddr) -> Result<(), TransportError> {
        let bytes = codec::serialize(&frame.encode());
        trace!(%to, type_name = frame.type_name(), bytes = bytes.len(), "send");
        self.socket.send_to(&bytes, to).await?;
        Ok(())
    }

    /// Broadcast mode: one send to the network broadcast address. Simulate
    /// mode: one unicast send per address in `peers`.
    pub async fn send_broadcast(&self, frame: &Frame, peers: &[SocketAddr]) -> Result<(), TransportError> {
        match self.broadcast_addr() {
            Some(addr) => self.send_unicast(frame, addr).await,
            None => {
                for &addr in peers {
                    self.send_unicast(frame, addr).await?;
                }
                Ok(())
            }
        }
    }

    /// Receive and decode one datagram. Decode failures are logged and
    /// surfaced to the caller rather than silently dropped, so the
    /// dispatcher's verbose mode can show malformed traffic.
    pub async fn recv(&self) -> Result<(Frame, SocketAddr), TransportError> {
        let mut buf = vec![0u8; codec::MAX_FRAME_SIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        trace!(%from, bytes = len, "recv");
        match codec::parse(&buf).and_then(Frame::decode) {
            Ok(frame) => Ok((frame, from)),
            Err(e) => {
                warn!(%from, error = %e, "dropping undecodable datagram");
                Err(TransportError::Decode(e))
            }
        }
    }
}
