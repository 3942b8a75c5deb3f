use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agora_server::config::ServerArgs;
use agora_server::server::Replica;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();

    let json_logs = std::env::var("AGORA_LOG_JSON").unwrap_or_default() == "1";
    let default_level = if args.silent { "warn" } else { "info" };
    let filter = EnvFilter::from_default_env().add_directive(format!("agora_server={default_level}").parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(replica_id = args.replica_id, "starting agora-server");
    let replica = Replica::new(args);
    replica.run().await
}
