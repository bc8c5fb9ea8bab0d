//! Job Runner: a fixed worker pool draining `.job` scripts against the
//! shared `Store`.
//!
//! Grounded in `dispatch_threads`/`get_file`/`run_job` from the reference:
//! workers share one directory handle behind a mutex (the "cursor"), claim
//! one job file at a time, and interpret its commands until EOF.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::consts::{DELETE_MISS, JOB_EXT, MAX_STRING_SIZE, MAX_WRITE_SIZE, OUT_EXT, READ_MISS};
use crate::server::ServerContext;

/// Spawn `max_threads` workers sharing one directory cursor over
/// `jobs_directory`, and a coordinator thread that joins them all. The
/// returned handle completes once every `.job` file present at startup has
/// been drained.
pub fn spawn_job_runner(
    ctx: Arc<ServerContext>,
    jobs_directory: PathBuf,
    max_threads: usize,
) -> Result<thread::JoinHandle<()>> {
    let entries = std::fs::read_dir(&jobs_directory)
        .with_context(|| format!("open jobs directory {jobs_directory:?}"))?;
    let cursor = Arc::new(Mutex::new(entries));

    let coordinator = thread::Builder::new()
        .name("job-runner".into())
        .spawn(move || {
            let mut workers = Vec::with_capacity(max_threads);
            for i in 0..max_threads {
                let ctx = ctx.clone();
                let cursor = cursor.clone();
                let handle = thread::Builder::new()
                    .name(format!("job-worker-{i}"))
                    .spawn(move || worker_loop(ctx, cursor))
                    .expect("failed to spawn job worker thread");
                workers.push(handle);
            }
            for w in workers {
                let _ = w.join();
            }
        })
        .context("failed to spawn job runner coordinator")?;
    Ok(coordinator)
}

fn worker_loop(ctx: Arc<ServerContext>, cursor: Arc<Mutex<std::fs::ReadDir>>) {
    loop {
        let next = {
            let mut entries = cursor.lock().unwrap_or_else(|e| e.into_inner());
            entries.next()
        };
        let entry = match next {
            Some(Ok(e)) => e,
            Some(Err(e)) => {
                warn!("job runner: failed to read directory entry: {e}");
                continue;
            }
            None => break,
        };

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(JOB_EXT) {
            continue;
        }

        if let Err(e) = run_job_file(&ctx, &path) {
            warn!("job runner: {path:?} failed: {e:#}");
        }
    }
}

fn out_path_for(job_path: &Path) -> PathBuf {
    job_path.with_extension(OUT_EXT)
}

fn run_job_file(ctx: &Arc<ServerContext>, job_path: &Path) -> Result<()> {
    let contents =
        std::fs::read_to_string(job_path).with_context(|| format!("read {job_path:?}"))?;
    let out_file = File::create(out_path_for(job_path))
        .with_context(|| format!("create {:?}", out_path_for(job_path)))?;
    let mut out = BufWriter::new(out_file);

    let mut backups_done = 0usize;
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = run_line(ctx, job_path, line, &mut out, &mut backups_done) {
            warn!("job runner: {job_path:?}: {e:#}");
        }
    }
    out.flush().ok();
    info!("job runner: finished {job_path:?}");
    Ok(())
}

fn run_line(
    ctx: &Arc<ServerContext>,
    job_path: &Path,
    line: &str,
    out: &mut impl Write,
    backups_done: &mut usize,
) -> Result<()> {
    let (cmd, rest) = split_command(line);
    match cmd {
        "WRITE" => {
            let pairs = parse_pairs(rest);
            if pairs.is_empty() {
                writeln!(out, "Invalid command. See HELP for usage")?;
                return Ok(());
            }
            let mut rendered = String::from("[");
            for (k, v) in &pairs {
                match ctx.store.put(&ctx.notifier, k, v) {
                    Ok(()) => rendered.push_str(&format!("({k},{v})")),
                    Err(_) => rendered.push_str(&format!("({k},{READ_MISS})")),
                }
            }
            rendered.push(']');
            writeln!(out, "{rendered}")?;
        }
        "READ" => {
            let keys = parse_keys(rest);
            if keys.is_empty() {
                writeln!(out, "Invalid command. See HELP for usage")?;
                return Ok(());
            }
            let mut rendered = String::from("[");
            for k in &keys {
                let value = ctx.store.get(k).unwrap_or(None);
                match value {
                    Some(v) => rendered.push_str(&format!("({k},{v})")),
                    None => rendered.push_str(&format!("({k},{READ_MISS})")),
                }
            }
            rendered.push(']');
            writeln!(out, "{rendered}")?;
        }
        "DELETE" => {
            let keys = parse_keys(rest);
            if keys.is_empty() {
                writeln!(out, "Invalid command. See HELP for usage")?;
                return Ok(());
            }
            let mut misses = String::new();
            for k in &keys {
                let removed = ctx.store.delete(&ctx.notifier, k).unwrap_or(false);
                if !removed {
                    misses.push_str(&format!("({k},{DELETE_MISS})"));
                }
            }
            if !misses.is_empty() {
                writeln!(out, "[{misses}]")?;
            }
        }
        "SHOW" => {
            let mut buf = Vec::new();
            ctx.store.show(&mut buf)?;
            out.write_all(&buf)?;
        }
        "WAIT" => match rest.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => thread::sleep(Duration::from_millis(ms)),
            Ok(_) => {}
            Err(_) => writeln!(out, "Invalid command. See HELP for usage")?,
        },
        "BACKUP" => {
            *backups_done += 1;
            let dest = crate::backup::BackupCounter::backup_path(
                job_path,
                *backups_done,
                ctx.config.backup_dir.as_deref(),
            );
            if let Err(e) = ctx.backups.run(&ctx.store, &dest) {
                warn!("job runner: BACKUP failed for {job_path:?}: {e:#}");
            }
        }
        "HELP" => {
            writeln!(
                out,
                "Available commands:\n  WRITE [(key,value)(key2,value2),...]\n  READ [key,key2,...]\n  DELETE [key,key2,...]\n  SHOW\n  WAIT <delay_ms>\n  BACKUP\n  HELP"
            )?;
        }
        _ => {
            writeln!(out, "Invalid command. See HELP for usage")?;
        }
    }
    Ok(())
}

fn split_command(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    }
}

/// Truncate `s` to at most `max` bytes, on a char boundary, matching the
/// reference's fixed `[MAX_STRING_SIZE]` buffers (`strncpy`-style clipping
/// rather than rejecting the whole command).
fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Parse `[(k1,v1)(k2,v2)...]` into pairs, tolerating missing brackets.
/// Stops after `MAX_WRITE_SIZE` pairs and clips each key/value to
/// `MAX_STRING_SIZE` bytes, mirroring `parse_write`'s fixed
/// `[MAX_WRITE_SIZE][MAX_STRING_SIZE]` buffers in the reference.
fn parse_pairs(s: &str) -> Vec<(String, String)> {
    let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
    let mut out = Vec::new();
    let mut chars = inner.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if out.len() >= MAX_WRITE_SIZE {
            break;
        }
        if c != '(' {
            continue;
        }
        if let Some(end) = inner[i..].find(')') {
            let body = &inner[i + 1..i + end];
            if let Some((k, v)) = body.split_once(',') {
                out.push((
                    truncate_str(k.trim(), MAX_STRING_SIZE),
                    truncate_str(v.trim(), MAX_STRING_SIZE),
                ));
            }
        }
    }
    out
}

/// Parse `[k1,k2,...]` into bare keys, tolerating missing brackets. Stops
/// after `MAX_WRITE_SIZE` keys and clips each to `MAX_STRING_SIZE` bytes,
/// mirroring `parse_read_delete`'s buffers in the reference.
fn parse_keys(s: &str) -> Vec<String> {
    let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .take(MAX_WRITE_SIZE)
        .map(|k| truncate_str(k, MAX_STRING_SIZE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write_pairs() {
        assert_eq!(
            parse_pairs("[(a,1)(b,2)]"),
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn parses_key_list() {
        assert_eq!(parse_keys("[a,b,c]"), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_command_separates_verb_from_args() {
        assert_eq!(split_command("WRITE [(a,1)]"), ("WRITE", "[(a,1)]"));
        assert_eq!(split_command("SHOW"), ("SHOW", ""));
    }
}
