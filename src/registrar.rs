//! Registrar: owns the well-known registration FIFO and admits new sessions.
//!
//! Grounded in `client_listener` from the reference: blocking-open the
//! registration pipe, read one fixed-size CONNECT frame, claim a slot,
//! acknowledge, then hand the session off to its own thread.

use std::sync::Arc;
use std::thread;

use log::{info, warn};

use crate::consts::CONNECT_FRAME_LEN;
use crate::error::ConnectOutcome;
use crate::ipc::{open_read_blocking, open_write_blocking};
use crate::protocol::{ConnectFrame, OpCode, Response};
use crate::server::ServerContext;
use crate::session::run_session;

/// Runs forever, admitting one client per registration frame. Intended to
/// be the body of a dedicated thread; returns only if the registration pipe
/// itself cannot be (re)opened, which the caller treats as fatal-ish and
/// simply stops retrying.
pub fn run_registrar(ctx: Arc<ServerContext>, register_pipe_path: std::path::PathBuf) {
    loop {
        let pipe = match open_read_blocking(&register_pipe_path) {
            Ok(f) => f,
            Err(e) => {
                warn!("registrar: failed to open registration pipe: {e:#}");
                continue;
            }
        };

        if let Err(e) = admit_one(&ctx, pipe) {
            warn!("registrar: failed to admit client: {e:#}");
        }
    }
}

fn admit_one(ctx: &Arc<ServerContext>, mut pipe: std::fs::File) -> anyhow::Result<()> {
    use std::io::Read;

    let mut buf = [0u8; CONNECT_FRAME_LEN];
    let n = pipe.read(&mut buf)?;
    if n == 0 {
        return Ok(());
    }
    let frame = ConnectFrame::decode(&buf[..n])?;
    drop(pipe);

    let slot = ctx.sessions.claim(
        frame.req_path.clone(),
        frame.resp_path.clone(),
        frame.notif_path.clone(),
    );

    let outcome = match slot {
        Some(_) => ConnectOutcome::Accepted,
        None => ConnectOutcome::Full,
    };

    if let Ok(mut resp) = open_write_blocking(std::path::Path::new(&frame.resp_path)) {
        use std::io::Write as _;
        let ack = Response {
            opcode: OpCode::CONNECT,
            result: outcome.result_byte(),
        }
        .encode();
        let _ = resp.write_all(&ack);
    }

    let Some(id) = slot else {
        warn!("registrar: session table full, rejected {}", frame.req_path);
        return Ok(());
    };

    info!("registrar: admitted session {id} ({})", frame.req_path);
    let session_ctx = ctx.clone();
    thread::Builder::new()
        .name(format!("session-{id}"))
        .spawn(move || run_session(session_ctx, id))?;
    Ok(())
}
