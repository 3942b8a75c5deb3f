mod config;
mod credentials;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use rand::seq::IteratorRandom;
use tracing_subscriber::EnvFilter;

use agora_proto::config::NetworkConfig;
use config::ClientArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("agora_client=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = ClientArgs::parse();
    let network = NetworkConfig::load(&args.config).context("loading network config")?;

    let replica_id = match args.number {
        Some(id) => id,
        None => {
            let mut rng = rand::thread_rng();
            *network
                .servers
                .keys()
                .choose(&mut rng)
                .context("network config lists no replicas")?
        }
    };
    let port = network
        .client_ports
        .get(&replica_id)
        .with_context(|| format!("replica {replica_id} has no client port configured"))?;
    let addr = format!("127.0.0.1:{port}");

    tracing::info!(replica_id, addr = %addr, "connecting");
    session::run(&addr, &args.client_name).await
}
