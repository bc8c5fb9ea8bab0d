//! Sharded in-memory key-value server library.
//!
//! Binary entry points (`pipekv-server`, `pipekv-client`) live under
//! `src/bin/`; this crate holds the shared wire protocol, store, session
//! and orchestration logic they both depend on.

pub mod admin;
pub mod backup;
pub mod client;
pub mod config;
pub mod consts;
pub mod error;
pub mod hash;
pub mod ipc;
pub mod jobs;
pub mod notifier;
pub mod protocol;
pub mod registrar;
pub mod server;
pub mod session;
pub mod sessions;
pub mod store;

pub use config::{ClientConfig, ServerConfig};
pub use server::{run_server, ServerContext};
