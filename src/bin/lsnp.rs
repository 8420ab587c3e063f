// LSNP Core — CLI Peer
// Copyright (c) 2024-2026 LSNP Contributors
// Distributed under the MIT software license.

//! Interactive command-line front end: parses `clap` startup args, then
//! reads one command per line from stdin and feeds it to the [`Dispatcher`]
//! running the protocol event loop on its own task.

use clap::Parser;
use lsnp::dispatcher::{Command, Dispatcher};
use lsnp::transport::Transport;
use lsnp::types::{Avatar, UserId};
use lsnp::{Args, PeerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config: PeerConfig = args.into();

    let transport = match Transport::bind(config.ip, config.port, config.mode).await {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to bind UDP socket: {e}");
            std::process::exit(1);
        }
    };
    let bound = transport.local_addr().expect("socket is bound");
    let local_user = UserId::new(config.username.clone(), bound.ip());
    println!("lsnp: {} listening on {}", local_user, bound);

    let (tx, rx) = mpsc::channel(64);
    let mut dispatcher = Dispatcher::new(local_user, config, transport);
    let handle = tokio::spawn(async move { dispatcher.run(rx).await });

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    print_help();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_command(line).await {
            Ok(ReplAction::Dispatch(cmd)) => {
                if tx.send(cmd).await.is_err() {
                    break;
                }
            }
            Ok(ReplAction::Help) => print_help(),
            Ok(ReplAction::Quit) => break,
            Err(e) => eprintln!("error: {e}"),
        }
    }
    drop(tx);
    let _ = handle.await;
}

fn print_help() {
    println!(
        "commands: profile <status> [avatar_path] | post <text> | dm <user> <text> | \
follow <user> | unfollow <user> | like <user> <timestamp> | \
peers | dms | posts | groups | \
group create <id> <title> | group update <id> add|remove <user> | group msg <id> <text> | \
file_offer <user> <path> | file_accept <file_id> | \
tictactoe_invite <user> | tictactoe_accept <game_id> | tictactoe_move <game_id> <0-8> | \
verbose | help | quit"
    );
}

fn new_id() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

/// Extension-based MIME guess for a profile avatar file. Not a content
/// sniff — good enough for the handful of image types LSNP peers trade.
fn guess_mime_type(path: &str) -> String {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
    .to_string()
}

enum ReplAction {
    Dispatch(Command),
    Help,
    Quit,
}

/// Parses one line of operator input.
async fn parse_command(line: &str) -> Result<ReplAction, String> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    if verb == "quit" || verb == "exit" {
        return Ok(ReplAction::Quit);
    }
    if verb == "help" {
        return Ok(ReplAction::Help);
    }

    let cmd = match verb {
        "verbose" => Command::ToggleVerbose,
        "peers" => Command::ListPeers,
        "dms" => Command::ListDms,
        "posts" => Command::ListPosts,
        "groups" => Command::ListGroups,
        "profile" => {
            let mut fields = rest.splitn(2, char::is_whitespace);
            let status = fields.next().ok_or("usage: profile <status> [avatar_path]")?.to_string();
            let avatar = match fields.next() {
                Some(path) if !path.is_empty() => {
                    let data = tokio::fs::read(path).await.map_err(|e| format!("read {path}: {e}"))?;
                    Some(Avatar { mime_type: guess_mime_type(path), data })
                }
                _ => None,
            };
            Command::SetProfile { status, avatar }
        }
        "post" => Command::Post { body: rest.to_string() },
        "dm" => {
            let mut fields = rest.splitn(2, char::is_whitespace);
            let to = UserId::from(fields.next().ok_or("usage: dm <user> <text>")?);
            let body = fields.next().unwrap_or("").to_string();
            Command::Dm { to, body }
        }
        "follow" => Command::Follow { to: UserId::from(rest) },
        "unfollow" => Command::Unfollow { to: UserId::from(rest) },
        "like" => {
            let mut fields = rest.split_whitespace();
            let to = UserId::from(fields.next().ok_or("usage: like <user> <timestamp>")?);
            let post_timestamp: i64 = fields
                .next()
                .ok_or("usage: like <user> <timestamp>")?
                .parse()
                .map_err(|_| "timestamp must be an integer".to_string())?;
            Command::Like { to, post_timestamp }
        }
        "group" => parse_group_command(rest)?,
        "file_offer" => {
            let mut fields = rest.split_whitespace();
            let to = UserId::from(fields.next().ok_or("usage: file_offer <user> <path>")?);
            let path = fields.next().ok_or("usage: file_offer <user> <path>")?;
            let data = tokio::fs::read(path).await.map_err(|e| format!("read {path}: {e}"))?;
            let filename = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string());
            Command::FileOffer { to, filename, data }
        }
        "file_accept" => Command::FileAccept { file_id: rest.split_whitespace().next().ok_or("usage: file_accept <file_id>")?.to_string() },
        "tictactoe_invite" => Command::GameInvite { game_id: new_id(), to: UserId::from(rest.split_whitespace().next().ok_or("usage: tictactoe_invite <user>")?) },
        "tictactoe_accept" => {
            Command::GameAccept { game_id: rest.split_whitespace().next().ok_or("usage: tictactoe_accept <game_id>")?.to_string() }
        }
        "tictactoe_move" => {
            let mut fields = rest.split_whitespace();
            let game_id = fields.next().ok_or("usage: tictactoe_move <game_id> <0-8>")?.to_string();
            let position: u8 = fields
                .next()
                .ok_or("usage: tictactoe_move <game_id> <0-8>")?
                .parse()
                .map_err(|_| "position must be 0-8".to_string())?;
            Command::GameMove { game_id, position }
        }
        other => return Err(format!("unknown command {other:?}, try `help`")),
    };
    Ok(ReplAction::Dispatch(cmd))
}

fn parse_group_command(rest: &str) -> Result<Command, String> {
    let mut fields = rest.splitn(3, char::is_whitespace);
    let sub = fields.next().unwrap_or("");
    match sub {
        "create" => {
            let group_id = fields.next().ok_or("usage: group create <id> <title>")?.to_string();
            let title = fields.next().unwrap_or("").to_string();
            Ok(Command::GroupCreate { group_id, title })
        }
        "update" => {
            let group_id = fields.next().ok_or("usage: group update <id> add|remove <user>")?.to_string();
            let tail = fields.next().unwrap_or("");
            let mut tail_fields = tail.splitn(2, char::is_whitespace);
            let action = tail_fields.next().ok_or("usage: group update <id> add|remove <user>")?;
            let user = UserId::from(tail_fields.next().ok_or("usage: group update <id> add|remove <user>")?);
            match action {
                "add" => Ok(Command::GroupUpdate { group_id, add: vec![user], remove: vec![] }),
                "remove" => Ok(Command::GroupUpdate { group_id, add: vec![], remove: vec![user] }),
                other => Err(format!("usage: group update <id> add|remove <user> (got {other:?})")),
            }
        }
        "msg" => {
            let group_id = fields.next().ok_or("usage: group msg <id> <text>")?.to_string();
            let body = fields.next().unwrap_or("").to_string();
            Ok(Command::GroupMessage { group_id, body })
        }
        other => Err(format!("unknown group subcommand {other:?}")),
    }
}
