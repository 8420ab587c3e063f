pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod file_transfer;
pub mod game;
pub mod group;
pub mod peer_directory;
pub mod presence;
pub mod social;
pub mod token;
pub mod transport;
pub mod types;

pub use config::{Args, PeerConfig};
pub use dispatcher::{Command, Dispatcher};
pub use types::{now, Avatar, UserId};
