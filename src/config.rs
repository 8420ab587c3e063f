// LSNP Core — Configuration
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Startup configuration, parsed from the command line with `clap`.

use crate::transport::TransportMode;
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Simulate,
    Broadcast,
}

impl From<ModeArg> for TransportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Simulate => TransportMode::Simulate,
            ModeArg::Broadcast => TransportMode::Broadcast,
        }
    }
}

/// `lsnp <username> [--mode simulate|broadcast] [--ip <addr>] [--port <n>]`
#[derive(Debug, Parser)]
#[command(name = "lsnp", about = "Local Social Networking Protocol peer", version)]
pub struct Args {
    /// Display name used to build this peer's USER_ID.
    pub username: String,

    /// Whether to address other peers by LAN broadcast or by loopback
    /// unicast (for running several peers on one host).
    #[arg(long, value_enum, default_value_t = ModeArg::Broadcast)]
    pub mode: ModeArg,

    /// Address to bind the UDP socket on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub ip: IpAddr,

    /// Port to bind the UDP socket on.
    #[arg(long, default_value_t = 50999)]
    pub port: u16,

    /// Enable verbose mode at startup (toggleable at runtime with `verbose`).
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

/// Runtime peer configuration derived from [`Args`] plus the fixed
/// intervals other modules key off of.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub username: String,
    pub mode: TransportMode,
    pub ip: IpAddr,
    pub port: u16,
    pub verbose: bool,
    pub presence_interval_secs: i64,
    pub prune_interval_secs: i64,
}

impl From<Args> for PeerConfig {
    fn from(args: Args) -> Self {
        Self {
            username: args.username,
            mode: args.mode.into(),
            ip: args.ip,
            port: args.port,
            verbose: args.verbose,
            presence_interval_secs: crate::presence::PRESENCE_INTERVAL_SECS,
            prune_interval_secs: crate::presence::PRUNE_INTERVAL_SECS,
        }
    }
}
