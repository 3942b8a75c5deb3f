//! The client's connection lifecycle: connect, send the display name,
//! then concurrently forward stdin commands to the server and print
//! server responses to stdout, until `quit` or Ctrl-C.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::credentials;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("invalid input")]
    InvalidCommand,
}

/// Validate and, for auth-required commands, extend a raw line typed by
/// the user into the full wire line (with credentials appended).
/// Mirrors the original client's `processInput`.
async fn process_input(stdin: &mut BufReader<tokio::io::Stdin>, input: &str) -> Result<String, InputError> {
    let fields: Vec<&str> = input.split_whitespace().collect();
    let Some(name) = fields.first() else {
        return Err(InputError::InvalidCommand);
    };
    let Some(spec) = agora_proto::commands::lookup(name) else {
        return Err(InputError::InvalidCommand);
    };

    if !spec.auth {
        return Ok(fields.join(" "));
    }

    println!("Enter your credentials to run '{name}':");
    let (username, password) = credentials::prompt(stdin).await.map_err(|_| InputError::InvalidCommand)?;
    Ok(format!("{} {username} {password}", fields.join(" ")))
}

pub async fn run(addr: &str, display_name: &str) -> Result<()> {
    let stream = TcpStream::connect(addr).await.with_context(|| format!("connecting to {addr}"))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut server_reader = BufReader::new(read_half);

    write_half
        .write_all(format!("{display_name}\n").as_bytes())
        .await
        .context("sending display name")?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdin_line = String::new();
    let mut server_line = String::new();

    println!("Connected as {display_name}. Type 'help' for a list of commands.");

    loop {
        stdin_line.clear();
        server_line.clear();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.ok();
                println!("\ninterrupted, disconnecting");
                let _ = write_half.write_all(b"quit\n").await;
                break;
            }
            n = server_reader.read_line(&mut server_line) => {
                match n {
                    Ok(0) => {
                        println!("server closed the connection");
                        break;
                    }
                    Ok(_) => {
                        print!("{server_line}");
                        if server_line.trim_end() == "goodbye" {
                            break;
                        }
                    }
                    Err(e) => {
                        eprintln!("read error: {e}");
                        break;
                    }
                }
            }
            n = stdin.read_line(&mut stdin_line) => {
                match n {
                    Ok(0) => {
                        let _ = write_half.write_all(b"quit\n").await;
                        break;
                    }
                    Ok(_) => {
                        let trimmed = stdin_line.trim().to_string();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match process_input(&mut stdin, &trimmed).await {
                            Ok(line) => {
                                let is_quit = trimmed.split_whitespace().next() == Some("quit");
                                if write_half.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                                    eprintln!("write failed");
                                    break;
                                }
                                if is_quit {
                                    break;
                                }
                            }
                            Err(_) => println!("invalid command"),
                        }
                    }
                    Err(e) => {
                        eprintln!("stdin read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
