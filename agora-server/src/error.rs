//! Startup and bootstrap failure taxonomy. Every variant here is fatal:
//! `main` logs it and exits non-zero. Anything that can be recovered from
//! (a dial to a peer that isn't up yet) or merely logged and ignored (an
//! I/O error on an established channel) never becomes a `BootstrapError`.

use agora_proto::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("replica id {0} is not present in the network config")]
    UnknownReplicaId(u32),
    #[error("could not bind peer listener on {addr}: {source}")]
    PeerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not bind client listener on {addr}: {source}")]
    ClientBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("handshake with peer failed: {0}")]
    Handshake(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
