//! Client session: one task per accepted client connection. Reads the
//! client's display name, then loops reading lines and forwarding them to
//! the arbiter, writing back exactly one response per line until `quit`
//! or an I/O error.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::arbiter::{ArbiterHandle, SessionOutcome};

pub async fn run(stream: TcpStream, arbiter: ArbiterHandle) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut name = String::new();
    if let Err(e) = reader.read_line(&mut name).await {
        warn!(error = %e, "client disconnected before sending a name");
        return;
    }
    let name = name.trim().to_string();
    info!(client = %name, "client connected");

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!(client = %name, "client disconnected");
                break;
            }
            Ok(_) => {
                let text = line.trim_end().to_string();
                if text.is_empty() {
                    continue;
                }
                match arbiter.submit(text).await {
                    SessionOutcome::Response(response) => {
                        let mut out = response;
                        if !out.ends_with('\n') {
                            out.push('\n');
                        }
                        if write_half.write_all(out.as_bytes()).await.is_err() {
                            warn!(client = %name, "write failed");
                            break;
                        }
                    }
                    SessionOutcome::Quit => {
                        let _ = write_half.write_all(b"goodbye\n").await;
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(client = %name, error = %e, "read failed");
                break;
            }
        }
    }
}
