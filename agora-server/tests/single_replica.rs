//! End-to-end test of a single (`K=1`) replica over real TCP sockets:
//! bootstrap with no peers, connect a client, run help/create/show/quit.

use std::io::Write as _;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use agora_server::config::ServerArgs;
use agora_server::server::Replica;

const PEER_ADDR: &str = "127.0.0.1:19101";
const CLIENT_PORT: &str = "18101";

fn write_config(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let network = format!(
        r#"{{"servers": {{"1": "{PEER_ADDR}"}}, "client_ports": {{"1": "{CLIENT_PORT}"}}}}"#
    );
    let catalog = r#"{
        "users": {"1": {"username": "john", "password": "root"}},
        "events": {}
    }"#;

    let network_path = dir.join("network.json");
    let catalog_path = dir.join("catalog.json");
    std::fs::File::create(&network_path).unwrap().write_all(network.as_bytes()).unwrap();
    std::fs::File::create(&catalog_path).unwrap().write_all(catalog.as_bytes()).unwrap();
    (network_path, catalog_path)
}

async fn read_response(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for response")
        .expect("read failed");
    line
}

#[tokio::test]
async fn single_replica_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (network_path, catalog_path) = write_config(dir.path());

    let args = ServerArgs {
        debug: false,
        silent: true,
        debug_delay: 0,
        config: network_path,
        catalog: catalog_path,
        replica_id: 1,
    };
    tokio::spawn(async move {
        Replica::new(args).run().await.unwrap();
    });

    // give the listener a moment to bind
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stream = TcpStream::connect(format!("127.0.0.1:{CLIENT_PORT}")).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"alice\n").await.unwrap();

    write_half.write_all(b"help\n").await.unwrap();
    let resp = read_response(&mut reader).await;
    assert!(resp.contains("Available commands"));

    write_half.write_all(b"create Launch setup 2 john root\n").await.unwrap();
    let resp = read_response(&mut reader).await;
    assert!(resp.contains("created"), "unexpected response: {resp}");

    write_half.write_all(b"show\n").await.unwrap();
    let resp = read_response(&mut reader).await;
    assert!(resp.contains("Launch"));

    write_half.write_all(b"register 1 1 john root\n").await.unwrap();
    let resp = read_response(&mut reader).await;
    assert!(resp.contains("creator"), "unexpected response: {resp}");

    write_half.write_all(b"quit\n").await.unwrap();
    let resp = read_response(&mut reader).await;
    assert!(resp.contains("goodbye"));
}
