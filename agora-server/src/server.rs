//! Replica wiring: load configuration, bootstrap the peer mesh, start the
//! engine and arbiter tasks, and accept client connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::arbiter::Arbiter;
use crate::config::ServerArgs;
use crate::error::BootstrapError;
use crate::lamport::Engine;
use crate::{mesh, session};

pub struct Replica {
    args: ServerArgs,
}

impl Replica {
    pub fn new(args: ServerArgs) -> Self {
        Replica { args }
    }

    pub async fn run(self) -> Result<()> {
        let network = agora_proto::config::NetworkConfig::load(&self.args.config)
            .context("loading network config")?;
        let seed = agora_proto::config::CatalogSeed::load(&self.args.catalog)
            .context("loading catalog seed")?;

        let n = self.args.replica_id;
        if !network.servers.contains_key(&n) {
            return Err(BootstrapError::UnknownReplicaId(n).into());
        }

        let peer_addr = network.servers[&n].clone();
        let client_port = network
            .client_ports
            .get(&n)
            .ok_or(BootstrapError::UnknownReplicaId(n))?
            .clone();
        let peers = network.peers_of(n);

        info!(replica_id = n, peer_addr = %peer_addr, client_port = %client_port, "starting replica");

        // Connection establishment completes in full before any Lamport
        // traffic is decoded: the mesh handshake carries only a peer id,
        // never REQ/ACK/REL, so there is no message to lose by deferring
        // the engine's existence until every link is up.
        let conns = mesh::bootstrap(n, &peer_addr, &network.servers, &peers)
            .await
            .context("bootstrapping peer mesh")?;
        let (peer_tx, pending_readers) = mesh::spawn_writers(conns);

        let engine = Engine::new(n, peers, peer_tx, seed.events);
        let engine_handle = engine.handle();
        tokio::spawn(engine.run());

        mesh::spawn_readers(pending_readers, engine_handle.clone());

        let debug_delay = Duration::from_secs(self.args.debug_delay);
        let arbiter = Arbiter::new(Arc::new(seed.users), engine_handle, self.args.debug, debug_delay);
        let arbiter_handle = arbiter.handle();
        tokio::spawn(arbiter.run());

        let client_addr = format!("0.0.0.0:{client_port}");
        let listener = TcpListener::bind(&client_addr)
            .await
            .map_err(|source| BootstrapError::ClientBind { addr: client_addr.clone(), source })?;
        info!(addr = %client_addr, "client listener bound");

        loop {
            let (stream, remote) = listener.accept().await.context("accepting client connection")?;
            info!(%remote, "client connection accepted");
            let arbiter_handle = arbiter_handle.clone();
            tokio::spawn(async move {
                session::run(stream, arbiter_handle).await;
            });
        }
    }
}
