//! Server context and top-level orchestration.
//!
//! The reference keeps the session table, the KVS handle and the backup
//! counters as process globals. Here they live in one `ServerContext`,
//! handed by `Arc` reference to the Registrar, every Session, the Notifier
//! and the Job Runner — the "explicit context" redesign.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use log::info;

use crate::admin::spawn_admin_reaper;
use crate::backup::BackupCounter;
use crate::config::ServerConfig;
use crate::jobs::spawn_job_runner;
use crate::notifier::Notifier;
use crate::registrar::run_registrar;
use crate::sessions::SessionTable;
use crate::store::Store;

pub struct ServerContext {
    pub store: Store,
    pub sessions: Arc<SessionTable>,
    pub notifier: Notifier,
    pub backups: BackupCounter,
    pub config: ServerConfig,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let sessions = Arc::new(SessionTable::new());
        let notifier = Notifier::new(sessions.clone());
        let backups = BackupCounter::new(config.max_backups.max(1));
        Arc::new(Self {
            store: Store::new(),
            sessions,
            notifier,
            backups,
            config,
        })
    }
}

/// Bring up the Registrar, Job Runner, and admin reaper, and block until all
/// of them finish (the Job Runner exhausting the jobs directory is the
/// normal termination path; the Registrar and reaper loop until the process
/// is killed).
pub fn run_server(config: ServerConfig) -> Result<()> {
    info!("starting server: {config}");

    let register_pipe_path = config.register_pipe_path.clone();
    let jobs_directory = config.jobs_directory.clone();
    let max_threads = config.max_threads.max(1);

    let ctx = ServerContext::new(config);

    crate::ipc::prepare_registration_pipe(&register_pipe_path)
        .context("failed to create registration pipe")?;

    let registrar_ctx = ctx.clone();
    let registrar_path = register_pipe_path.clone();
    let registrar_handle = thread::Builder::new()
        .name("registrar".into())
        .spawn(move || run_registrar(registrar_ctx, registrar_path))
        .context("failed to spawn registrar thread")?;

    let reaper_ctx = ctx.clone();
    let reaper_handle = spawn_admin_reaper(reaper_ctx)?;

    let job_handle = spawn_job_runner(ctx.clone(), jobs_directory, max_threads)?;

    job_handle.join().ok();
    info!("job runner finished; server will keep serving interactive sessions");

    registrar_handle.join().ok();
    reaper_handle.join().ok();

    let _ = std::fs::remove_file(&register_pipe_path);
    Ok(())
}
