//! The command arbiter: the single worker that serializes every local
//! client command, classifies it as lock-free or lock-requiring, and for
//! the latter drives the engine's request/release dance around the
//! handler call.

use std::sync::Arc;
use std::time::Duration;

use agora_proto::catalog::{CommandError, Users};
use agora_proto::commands;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::debug;

use crate::handlers;
use crate::lamport::EngineHandle;

/// What the arbiter tells a session to do once it has processed a line.
pub enum SessionOutcome {
    Response(String),
    Quit,
}

struct Job {
    line: String,
    reply: oneshot::Sender<SessionOutcome>,
}

/// A cheaply-clonable handle sessions use to submit lines and await the
/// corresponding response, without needing to know how the arbiter is
/// implemented.
#[derive(Clone)]
pub struct ArbiterHandle {
    tx: mpsc::Sender<Job>,
}

impl ArbiterHandle {
    pub async fn submit(&self, line: String) -> SessionOutcome {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Job { line, reply }).await.is_err() {
            return SessionOutcome::Response("server is shutting down".into());
        }
        rx.await.unwrap_or(SessionOutcome::Response("server is shutting down".into()))
    }
}

pub struct Arbiter {
    users: Arc<Users>,
    engine: EngineHandle,
    debug: bool,
    debug_delay: Duration,
    rx: mpsc::Receiver<Job>,
    tx: mpsc::Sender<Job>,
}

impl Arbiter {
    pub fn new(users: Arc<Users>, engine: EngineHandle, debug: bool, debug_delay: Duration) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Arbiter {
            users,
            engine,
            debug,
            debug_delay,
            rx,
            tx,
        }
    }

    pub fn handle(&self) -> ArbiterHandle {
        ArbiterHandle { tx: self.tx.clone() }
    }

    /// The single worker loop: strictly one command in flight at a time,
    /// processed in arrival order.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            let outcome = self.process(&job.line).await;
            let _ = job.reply.send(outcome);
        }
    }

    async fn process(&mut self, line: &str) -> SessionOutcome {
        let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let Some(name) = fields.first() else {
            return SessionOutcome::Response(CommandError::UnknownCommand.to_string());
        };

        if name == "quit" {
            return SessionOutcome::Quit;
        }

        let Some(spec) = commands::lookup(name) else {
            return SessionOutcome::Response(CommandError::UnknownCommand.to_string());
        };

        let rest = &fields[1..];
        let needed = spec.min_args + 2 * spec.min_opt_pairs.unwrap_or(0) + if spec.auth { 2 } else { 0 };
        if rest.len() < needed {
            return SessionOutcome::Response(CommandError::InvalidNbArgs.to_string());
        }

        let (args, creds) = if spec.auth {
            let split_at = rest.len() - 2;
            (&rest[..split_at], Some((rest[split_at].clone(), rest[split_at + 1].clone())))
        } else {
            (&rest[..], None)
        };

        if name == "help" {
            return SessionOutcome::Response(handlers::help().response);
        }

        if !spec.lock_requiring {
            let catalog = self.engine.current_catalog();
            let response = match name.as_str() {
                "show" => handlers::show(&catalog, &self.users, args).response,
                "jobs" => handlers::jobs(&catalog, &self.users, args).response,
                _ => CommandError::UnknownCommand.to_string(),
            };
            return SessionOutcome::Response(response);
        }

        let (username, password) = creds.expect("lock-requiring commands all require auth");
        let granted = self.engine.request().await;

        if self.debug {
            debug!(delay_secs = self.debug_delay.as_secs(), "accessing local critical section");
            sleep(self.debug_delay).await;
        }

        let outcome = match name.as_str() {
            "create" => handlers::create(granted, &self.users, args, &username, &password),
            "close" => handlers::close(granted, &self.users, args, &username, &password),
            "register" => handlers::register(granted, &self.users, args, &username, &password),
            _ => unreachable!("classification guarantees only create/close/register reach here"),
        };

        if self.debug {
            debug!(delay_secs = self.debug_delay.as_secs(), "releasing local critical section");
            sleep(self.debug_delay).await;
        }

        let response = outcome.response.clone();
        let to_publish = outcome.mutated_catalog.unwrap_or_else(|| self.engine.current_catalog());
        self.engine.release(to_publish).await;
        SessionOutcome::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_proto::catalog::{Catalog, User};
    use std::collections::HashMap;

    async fn spawn_single_replica(users: Users) -> ArbiterHandle {
        let engine = crate::lamport::Engine::new(1, vec![], HashMap::new(), Catalog::new());
        let engine_handle = engine.handle();
        tokio::spawn(engine.run());
        let arbiter = Arbiter::new(Arc::new(users), engine_handle, false, Duration::from_millis(0));
        let handle = arbiter.handle();
        tokio::spawn(arbiter.run());
        handle
    }

    fn sample_users() -> Users {
        let mut u = Users::new();
        u.insert(1, User { username: "john".into(), password: "root".into() });
        u
    }

    #[tokio::test]
    async fn help_needs_no_auth_or_lock() {
        let handle = spawn_single_replica(Users::new()).await;
        match handle.submit("help".into()).await {
            SessionOutcome::Response(r) => assert!(r.contains("Available commands")),
            SessionOutcome::Quit => panic!("help should not quit"),
        }
    }

    #[tokio::test]
    async fn quit_is_recognized_without_touching_registry() {
        let handle = spawn_single_replica(Users::new()).await;
        match handle.submit("quit".into()).await {
            SessionOutcome::Quit => {}
            SessionOutcome::Response(_) => panic!("quit should signal Quit"),
        }
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let handle = spawn_single_replica(Users::new()).await;
        match handle.submit("frobnicate".into()).await {
            SessionOutcome::Response(r) => assert_eq!(r, CommandError::UnknownCommand.to_string()),
            SessionOutcome::Quit => panic!(),
        }
    }

    #[tokio::test]
    async fn create_then_show_round_trips() {
        let handle = spawn_single_replica(sample_users()).await;
        let create = handle.submit("create Launch setup 2 john root".into()).await;
        match create {
            SessionOutcome::Response(r) => assert!(r.contains("created")),
            SessionOutcome::Quit => panic!(),
        }
        let show = handle.submit("show".into()).await;
        match show {
            SessionOutcome::Response(r) => assert!(r.contains("Launch")),
            SessionOutcome::Quit => panic!(),
        }
    }

    #[tokio::test]
    async fn missing_args_reported_without_taking_lock() {
        let handle = spawn_single_replica(sample_users()).await;
        match handle.submit("register 1".into()).await {
            SessionOutcome::Response(r) => assert_eq!(r, CommandError::InvalidNbArgs.to_string()),
            SessionOutcome::Quit => panic!(),
        }
    }
}
