use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use pipekv::config::ServerConfig;
use pipekv::jobs::spawn_job_runner;
use pipekv::server::ServerContext;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("pipekvtest-{prefix}-{pid}-{t}-{id}"))
}

fn write_job(dir: &PathBuf, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn write_then_read_reports_hit_and_miss() -> Result<()> {
    let root = unique_root("write-read");
    fs::create_dir_all(&root)?;
    write_job(&root, "a.job", "WRITE [(a,1)(b,2)]\nREAD [a,b,c]\n");

    let config = ServerConfig::new(root.clone(), 2, 1, root.join("register"));
    let ctx = ServerContext::new(config);
    let handle = spawn_job_runner(ctx.clone(), root.clone(), 2)?;
    handle.join().unwrap();

    let out = fs::read_to_string(root.join("a.out"))?;
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("[(a,1)(b,2)]"));
    assert_eq!(lines.next(), Some("[(a,1)(b,2)(c,KVSERROR)]"));
    Ok(())
}

#[test]
fn delete_reports_misses_only() -> Result<()> {
    let root = unique_root("delete");
    fs::create_dir_all(&root)?;
    write_job(&root, "a.job", "WRITE [(a,1)]\nDELETE [a,z]\n");

    let config = ServerConfig::new(root.clone(), 1, 1, root.join("register"));
    let ctx = ServerContext::new(config);
    let handle = spawn_job_runner(ctx.clone(), root.clone(), 1)?;
    handle.join().unwrap();

    let out = fs::read_to_string(root.join("a.out"))?;
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("[(a,1)]"));
    assert_eq!(lines.next(), Some("[(z,CFE)]"));
    assert!(!ctx.store.exists("a"));
    Ok(())
}

#[test]
fn show_emits_every_live_pair() -> Result<()> {
    let root = unique_root("show");
    fs::create_dir_all(&root)?;
    write_job(&root, "a.job", "WRITE [(a,1)(b,2)]\nSHOW\n");

    let config = ServerConfig::new(root.clone(), 1, 1, root.join("register"));
    let ctx = ServerContext::new(config);
    let handle = spawn_job_runner(ctx.clone(), root.clone(), 1)?;
    handle.join().unwrap();

    let out = fs::read_to_string(root.join("a.out"))?;
    assert!(out.contains("(a,1)"));
    assert!(out.contains("(b,2)"));
    Ok(())
}

#[test]
fn backup_produces_a_snapshot_file() -> Result<()> {
    let root = unique_root("backup");
    fs::create_dir_all(&root)?;
    write_job(&root, "a.job", "WRITE [(a,1)]\nBACKUP\n");

    let config = ServerConfig::new(root.clone(), 1, 2, root.join("register"));
    let ctx = ServerContext::new(config);
    let handle = spawn_job_runner(ctx.clone(), root.clone(), 1)?;
    handle.join().unwrap();

    // Give the forked child a moment to flush and exit.
    std::thread::sleep(std::time::Duration::from_millis(200));

    let backup_path = root.join("a-1.bck");
    assert!(backup_path.exists(), "expected {backup_path:?} to exist");
    let contents = fs::read_to_string(&backup_path)?;
    assert!(contents.contains("(a,1)"));
    Ok(())
}

#[test]
fn invalid_key_write_is_reported_inline() -> Result<()> {
    let root = unique_root("invalid-key");
    fs::create_dir_all(&root)?;
    write_job(&root, "a.job", "WRITE [(!bad,1)(a,2)]\n");

    let config = ServerConfig::new(root.clone(), 1, 1, root.join("register"));
    let ctx = ServerContext::new(config);
    let handle = spawn_job_runner(ctx.clone(), root.clone(), 1)?;
    handle.join().unwrap();

    let out = fs::read_to_string(root.join("a.out"))?;
    assert_eq!(out.lines().next(), Some("[(!bad,KVSERROR)(a,2)]"));
    Ok(())
}
