//! CLI and bootstrap configuration for a replica process.

use std::path::PathBuf;

use clap::Parser;

/// `<binary> [--debug] [--silent] <replica-id>`
#[derive(Debug, Parser)]
#[command(name = "agora-server", about = "Replicated event-catalog server")]
pub struct ServerArgs {
    /// Trace every entry/exit of the local critical section, with an
    /// artificial delay, to make mutual exclusion visible in the logs.
    #[arg(long)]
    pub debug: bool,

    /// Suppress informational logs (connection/Lamport-transition
    /// chatter); fatal errors are still printed.
    #[arg(long)]
    pub silent: bool,

    /// Seconds to sleep on either side of the critical section when
    /// `--debug` is set.
    #[arg(long, default_value_t = 1, env = "AGORA_DEBUG_DELAY")]
    pub debug_delay: u64,

    /// Path to the peer/network config document.
    #[arg(long, default_value = "config/network.json", env = "AGORA_NETWORK_CONFIG")]
    pub config: PathBuf,

    /// Path to the catalog seed document.
    #[arg(long, default_value = "config/catalog.json", env = "AGORA_CATALOG_SEED")]
    pub catalog: PathBuf,

    /// This replica's numeric id, must be a key of the network config.
    pub replica_id: u32,
}
