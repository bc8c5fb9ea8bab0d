//! Per-session owner thread: the `OPENING → RUNNING → CLOSING → CLOSED`
//! state machine driven by one client's request pipe.
//!
//! Grounded in `client_handler` from the reference, restructured so that
//! every exit path (DISCONNECT, EOF, read error, admin reset) converges on
//! the same teardown routine.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};

use crate::consts::KEYED_FRAME_LEN;
use crate::ipc::{open_read_blocking, open_write_blocking, open_write_nonblocking};
use crate::protocol::{OpCode, Request, Response};
use crate::server::ServerContext;

/// Drives session `id` from OPENING through to CLOSED. Runs until the
/// client disconnects, the pipe errors out, or the admin reaper tears the
/// slot down from under it.
pub fn run_session(ctx: Arc<ServerContext>, id: usize) {
    let Some((req_path, resp_path, notif_path)) = ctx.sessions.paths(id) else {
        return;
    };
    let req_path = PathBuf::from(req_path);
    let resp_path = PathBuf::from(resp_path);
    let notif_path = PathBuf::from(notif_path);

    // OPENING: both ends must be attached before entering RUNNING. Opening
    // the request pipe for reading blocks until the client's writer-open
    // completes, which is the second half of the connect handshake.
    let mut req = match open_read_blocking(&req_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("session {id}: failed to open request pipe: {e:#}");
            teardown(&ctx, id, &req_path, &resp_path, &notif_path);
            return;
        }
    };

    match open_write_nonblocking(&notif_path) {
        Ok(sink) => ctx.sessions.set_notif_sink(id, sink),
        Err(e) => {
            warn!("session {id}: failed to open notification pipe: {e:#}");
            teardown(&ctx, id, &req_path, &resp_path, &notif_path);
            return;
        }
    }

    info!("session {id}: RUNNING");

    // RUNNING
    let mut buf = [0u8; KEYED_FRAME_LEN];
    loop {
        if !ctx.sessions.is_active(id) {
            // Torn down from under us by the admin reaper.
            break;
        }

        let n = match req.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("session {id}: request pipe read failed: {e:#}");
                break;
            }
        };

        match Request::decode(&buf[..n]) {
            Ok(Some(Request::Disconnect)) => {
                respond(&resp_path, OpCode::DISCONNECT, 0);
                info!("session {id}: DISCONNECT");
                break;
            }
            Ok(Some(Request::Subscribe(key))) => {
                let outcome = ctx.sessions.subscribe(id, &key, &ctx.store);
                respond(&resp_path, OpCode::SUBSCRIBE, outcome.result_byte());
            }
            Ok(Some(Request::Unsubscribe(key))) => {
                let outcome = ctx.sessions.unsubscribe(id, &key);
                respond(&resp_path, OpCode::UNSUBSCRIBE, outcome.result_byte());
            }
            Ok(None) => {
                warn!("session {id}: unrecognized opcode {}", buf.first().copied().unwrap_or(0));
            }
            Err(e) => {
                warn!("session {id}: malformed request frame: {e:#}");
            }
        }
    }

    teardown(&ctx, id, &req_path, &resp_path, &notif_path);
}

fn respond(resp_path: &std::path::Path, opcode: u8, result: u8) {
    match open_write_blocking(resp_path) {
        Ok(mut f) => {
            use std::io::Write as _;
            let frame = Response { opcode, result }.encode();
            if let Err(e) = f.write_all(&frame) {
                warn!("session: failed to write response: {e:#}");
            }
        }
        Err(e) => warn!("session: failed to open response pipe: {e:#}"),
    }
}

/// CLOSING → CLOSED: drop subscriptions, unlink all three pipes, free the
/// slot. Idempotent — safe to race with the admin reaper's own teardown of
/// the same session.
fn teardown(
    ctx: &Arc<ServerContext>,
    id: usize,
    req_path: &std::path::Path,
    resp_path: &std::path::Path,
    notif_path: &std::path::Path,
) {
    ctx.sessions.drop_all(id);
    let _ = std::fs::remove_file(req_path);
    let _ = std::fs::remove_file(resp_path);
    let _ = std::fs::remove_file(notif_path);
    ctx.sessions.free(id);
}
