//! Admin signal handler: flag + dedicated reaper, per the spec's redesign
//! of the reference's heavy-lifting-inside-`handle_sigusr1` approach.
//!
//! `signal_hook::flag::register` arms an `AtomicBool` on `SIGUSR1`; this
//! module's reaper thread polls that flag and performs the actual teardown,
//! which is safe here because sessions hold no locks while blocked on I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use signal_hook::consts::SIGUSR1;

use crate::ipc::wake_blocked_reader;
use crate::server::ServerContext;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawn the reaper thread and arm the `SIGUSR1` flag. The returned handle
/// never finishes under normal operation (it polls forever).
pub fn spawn_admin_reaper(ctx: Arc<ServerContext>) -> Result<thread::JoinHandle<()>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGUSR1, flag.clone())
        .context("failed to register SIGUSR1 handler")?;

    let handle = thread::Builder::new()
        .name("admin-reaper".into())
        .spawn(move || reaper_loop(ctx, flag))
        .context("failed to spawn admin reaper thread")?;
    Ok(handle)
}

fn reaper_loop(ctx: Arc<ServerContext>, flag: Arc<AtomicBool>) {
    loop {
        thread::sleep(POLL_INTERVAL);
        if flag.swap(false, Ordering::SeqCst) {
            info!("admin: reset signal received, evicting all sessions");
            evict_all(&ctx);
        }
    }
}

/// Forcibly evict every active session: drop its subscriptions, unblock its
/// request-pipe read, unlink its three pipes, and free its slot.
fn evict_all(ctx: &Arc<ServerContext>) {
    for (id, req_path, resp_path, notif_path) in ctx.sessions.active_sessions() {
        ctx.sessions.drop_all(id);

        let req_path = std::path::Path::new(&req_path);
        let resp_path = std::path::Path::new(&resp_path);
        let notif_path = std::path::Path::new(&notif_path);

        wake_blocked_reader(req_path);

        let _ = std::fs::remove_file(req_path);
        let _ = std::fs::remove_file(resp_path);
        let _ = std::fs::remove_file(notif_path);

        ctx.sessions.free(id);
    }
}
