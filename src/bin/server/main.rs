use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

use pipekv::ServerConfig;

fn init_logger() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Sharded in-memory key-value server.
#[derive(Parser, Debug)]
#[command(name = "pipekv-server")]
struct Args {
    /// Directory scanned for `.job` files.
    jobs_directory: PathBuf,
    /// Number of job-runner worker threads.
    max_threads: usize,
    /// Maximum concurrent BACKUP children before a worker blocks.
    max_backups: usize,
    /// Path of the well-known registration FIFO.
    register_pipe_path: PathBuf,
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

    let config = ServerConfig::new(
        args.jobs_directory,
        args.max_threads,
        args.max_backups,
        args.register_pipe_path,
    )
    .with_env_overrides();

    pipekv::run_server(config)
}
