//! Replicated event-catalog server.
//!
//! A replica runs four concurrent components: the peer mesh
//! ([`mesh`]), the Lamport mutual-exclusion/replication engine
//! ([`lamport`]), the single-worker command arbiter ([`arbiter`]) and
//! one client session task per connection ([`session`]). [`server`]
//! wires all four together; [`handlers`] holds the command-specific
//! business rules the arbiter dispatches to.

pub mod arbiter;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lamport;
pub mod mesh;
pub mod server;
pub mod session;
