//! Low-level FIFO helpers shared by the Registrar, Session, admin reaper,
//! and the client binary.
//!
//! Kept thin and transport-only — no protocol knowledge lives here, mirroring
//! how the reference keeps `io.c` free of `operations.c` concerns.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

/// Create `path` as a FIFO with mode 0o666, removing any stale node first.
/// Matches the reference's `unlink(path); mkfifo(path, 0666);` pattern.
pub fn create_fifo(path: &Path) -> Result<()> {
    let _ = std::fs::remove_file(path);
    mkfifo(path, Mode::from_bits_truncate(0o666))
        .with_context(|| format!("mkfifo {path:?}"))?;
    Ok(())
}

/// Create the well-known registration FIFO, replacing any stale node.
pub fn prepare_registration_pipe(path: &Path) -> Result<()> {
    create_fifo(path)
}

/// Open `path` for reading, blocking until a writer attaches (or the FIFO
/// already has data buffered). Used for the registration and request pipes.
pub fn open_read_blocking(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("open {path:?} for reading"))
}

/// Open `path` for writing, blocking until a reader attaches. Used for the
/// response pipe, which the reference opens fresh for each reply.
pub fn open_write_blocking(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("open {path:?} for writing"))
}

/// Open `path` for non-blocking writes. Used for the notification pipe: a
/// slow subscriber must never stall the writer.
pub fn open_write_nonblocking(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .with_context(|| format!("open {path:?} for non-blocking writes"))
}

/// Open `path` for non-blocking reads. Used by the client for its own
/// notification pipe.
pub fn open_read_nonblocking(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .with_context(|| format!("open {path:?} for non-blocking reads"))
}

/// Momentarily open `path` for writing, then drop the handle without
/// writing anything. If another thread is blocked in a read on `path`, this
/// causes that read to observe EOF once this writer closes — the standard
/// trick for interrupting a blocked FIFO reader without touching its fd
/// from a foreign thread.
pub fn wake_blocked_reader(path: &Path) {
    if let Ok(f) = open_write_blocking(path) {
        drop(f);
    }
}
