//! BACKUP command support: a capacity-gated pool of forked children, each
//! dumping a `Store` snapshot to a numbered `.bck` file.
//!
//! Grounded in the reference's `n_current_backups_lock`/`active_backups`
//! pair: at capacity, the issuing worker blocks (here: `waitpid`s the oldest
//! outstanding child) before starting a new one.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};

use crate::consts::BACKUP_EXT;
use crate::store::Store;

struct Inner {
    outstanding: Vec<Pid>,
    max: usize,
}

/// Tracks in-flight backup children and enforces `max_backups`.
pub struct BackupCounter {
    inner: Mutex<Inner>,
}

impl BackupCounter {
    pub fn new(max: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                outstanding: Vec::new(),
                max,
            }),
        }
    }

    /// Derive the Nth backup path for a given job file: `<stem>-<n>.bck` next
    /// to the job file, unless `backup_dir` overrides the destination.
    pub fn backup_path(job_path: &Path, n: usize, backup_dir: Option<&Path>) -> PathBuf {
        let stem = job_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "job".to_string());
        let file_name = format!("{stem}-{n}.{BACKUP_EXT}");
        match backup_dir {
            Some(dir) => dir.join(file_name),
            None => job_path
                .parent()
                .map(|p| p.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(file_name)),
        }
    }

    /// Run one BACKUP: reap an outstanding child if at capacity, then fork a
    /// fresh child that dumps `store`'s current snapshot to `dest` and exits.
    pub fn run(&self, store: &Store, dest: &Path) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.outstanding.len() >= inner.max.max(1) {
                if let Some(pid) = inner.outstanding.first().copied() {
                    waitpid(pid, None).context("waitpid on outstanding backup child")?;
                    inner.outstanding.remove(0);
                }
            }
        }

        let pairs = store.snapshot();
        // SAFETY: the child only touches its inherited, now-frozen copy of
        // `pairs` and the filesystem; it never re-enters Store's locks.
        match unsafe { fork() }.context("fork for BACKUP")? {
            ForkResult::Child => {
                let code = match write_snapshot(dest, &pairs) {
                    Ok(()) => 0,
                    Err(_) => 1,
                };
                std::process::exit(code);
            }
            ForkResult::Parent { child } => {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.outstanding.push(child);
                Ok(())
            }
        }
    }
}

fn write_snapshot(dest: &Path, pairs: &[(String, String)]) -> Result<()> {
    use std::io::Write;
    let file = File::create(dest).with_context(|| format!("create backup file {dest:?}"))?;
    let mut w = BufWriter::new(file);
    for (k, v) in pairs {
        writeln!(w, "({k},{v})")?;
    }
    Ok(())
}
