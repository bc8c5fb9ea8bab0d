use std::io::BufRead;

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

use pipekv::client::{notification_loop, Client};
use pipekv::config::ClientConfig;

fn init_logger() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Interactive client for the pipekv server.
#[derive(Parser, Debug)]
#[command(name = "pipekv-client")]
struct Args {
    /// Unique tag identifying this session's pipes (/tmp/req<tag>, etc.).
    session_tag: String,
    /// Path of the server's registration FIFO.
    register_pipe_path: std::path::PathBuf,
}

fn main() {
    init_logger();
    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = ClientConfig::new(args.session_tag, args.register_pipe_path);

    let client = Client::connect(config)?;
    println!("connected");

    let notif_pipe = client.open_notifications()?;
    std::thread::spawn(move || notification_loop(notif_pipe));

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next().unwrap_or("").trim();

        match cmd.to_ascii_uppercase().as_str() {
            "DISCONNECT" => {
                let result = client.disconnect()?;
                println!("Server returned {result} for operation: disconnect");
                return Ok(());
            }
            "SUBSCRIBE" => {
                if arg.is_empty() {
                    eprintln!("Invalid command. See HELP for usage");
                    continue;
                }
                let result = client.subscribe(arg)?;
                println!("Server returned {result} for operation: subscribe");
            }
            "UNSUBSCRIBE" => {
                if arg.is_empty() {
                    eprintln!("Invalid command. See HELP for usage");
                    continue;
                }
                let result = client.unsubscribe(arg)?;
                println!("Server returned {result} for operation: unsubscribe");
            }
            "HELP" => {
                println!(
                    "Available commands:\n  SUBSCRIBE <key>\n  UNSUBSCRIBE <key>\n  DISCONNECT"
                );
            }
            _ => eprintln!("Invalid command. See HELP for usage"),
        }
    }

    Ok(())
}
