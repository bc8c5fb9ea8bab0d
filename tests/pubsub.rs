use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;

use pipekv::client::Client;
use pipekv::config::{ClientConfig, ServerConfig};
use pipekv::ipc::prepare_registration_pipe;
use pipekv::registrar::run_registrar;
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

/// Read whatever is available on `f` within `timeout`, polling since the
/// pipe is opened non-blocking.
fn read_within(f: &mut fs::File, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    let mut collected = String::new();
    let mut buf = [0u8; 256];
    while Instant::now() < deadline {
        match f.read(&mut buf) {
            Ok(0) => thread::sleep(Duration::from_millis(10)),
            Ok(n) => collected.push_str(&String::from_utf8_lossy(&buf[..n])),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(_) => break,
        }
        if !collected.is_empty() {
            // Give a trailing beat for a second write to land too.
            thread::sleep(Duration::from_millis(20));
        }
    }
    collected
}

fn start_server(root: &PathBuf) -> (std::sync::Arc<ServerContext>, PathBuf) {
    let register_path = root.join("register");
    let config = ServerConfig::new(root.clone(), 1, 1, register_path.clone());
    let ctx = ServerContext::new(config);
    prepare_registration_pipe(&register_path).unwrap();

    let registrar_ctx = ctx.clone();
    let registrar_path = register_path.clone();
    thread::spawn(move || run_registrar(registrar_ctx, registrar_path));
    // Give the registrar a beat to start blocking on its open().
    thread::sleep(Duration::from_millis(50));

    (ctx, register_path)
}

#[test]
fn subscribe_then_notify_then_delete() -> Result<()> {
    let root = unique_root("pubsub");
    fs::create_dir_all(&root)?;
    let (ctx, register_path) = start_server(&root);
    ctx.store.put(&ctx.notifier, "a", "1")?;

    let client_config = ClientConfig::new("pstest1".to_string(), register_path);
    let client = Client::connect(client_config)?;
    let mut notif = client.open_notifications()?;

    assert_eq!(client.subscribe("a")?, 1, "subscribe to an existing key succeeds");
    assert_eq!(client.subscribe("a")?, 0, "duplicate subscribe fails");

    ctx.store.put(&ctx.notifier, "a", "2")?;
    let text = read_within(&mut notif, Duration::from_millis(500));
    assert!(text.contains("(a,2)\n"), "expected a write notification, got {text:?}");

    ctx.store.delete(&ctx.notifier, "a")?;
    let text = read_within(&mut notif, Duration::from_millis(500));
    assert!(text.contains("(a,DELETED)\n"), "expected a delete notification, got {text:?}");

    assert_eq!(client.unsubscribe("a")?, 0);
    assert_eq!(client.unsubscribe("a")?, 1);
    assert_eq!(client.disconnect()?, 0);
    Ok(())
}

#[test]
fn subscribe_to_missing_key_fails() -> Result<()> {
    let root = unique_root("pubsub-missing");
    fs::create_dir_all(&root)?;
    let (_ctx, register_path) = start_server(&root);

    let client_config = ClientConfig::new("pstest2".to_string(), register_path);
    let client = Client::connect(client_config)?;
    assert_eq!(client.subscribe("z")?, 0);
    assert_eq!(client.disconnect()?, 0);
    Ok(())
}
