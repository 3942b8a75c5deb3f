//! CLI arguments for the client binary.

use std::path::PathBuf;

use clap::Parser;

/// `<binary> [--number <id>] <client-name>`
#[derive(Debug, Parser)]
#[command(name = "agora-client", about = "Line-oriented client for the event-catalog service")]
pub struct ClientArgs {
    /// Replica id to connect to. Omit to pick one at random from the
    /// network config.
    #[arg(long = "number")]
    pub number: Option<u32>,

    /// Path to the network config document (the same one the servers
    /// load), used only to resolve a replica id to a host/port.
    #[arg(long, default_value = "config/network.json", env = "AGORA_NETWORK_CONFIG")]
    pub config: PathBuf,

    /// Display name advertised to the server on connect.
    pub client_name: String,
}
