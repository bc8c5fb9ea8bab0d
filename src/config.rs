//! Centralized configuration for the server binary.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - The four positional CLI args map straight onto fields here; `from_env()`
//!   layers the handful of env-only knobs on top, the way the reference's
//!   config module layers env overrides onto CLI-provided values.

use std::fmt;
use std::path::PathBuf;

/// Top-level server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub jobs_directory: PathBuf,
    pub max_threads: usize,
    pub max_backups: usize,
    pub register_pipe_path: PathBuf,

    /// Directory `.bck` files are written to.
    /// Env: KVS_BACKUP_DIR (default: alongside the source `.job` file).
    pub backup_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(
        jobs_directory: PathBuf,
        max_threads: usize,
        max_backups: usize,
        register_pipe_path: PathBuf,
    ) -> Self {
        Self {
            jobs_directory,
            max_threads,
            max_backups,
            register_pipe_path,
            backup_dir: None,
        }
    }

    /// Layer env-only overrides on top of the positionally-constructed config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("KVS_BACKUP_DIR") {
            if !v.trim().is_empty() {
                self.backup_dir = Some(PathBuf::from(v));
            }
        }
        self
    }

    pub fn with_backup_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.backup_dir = dir;
        self
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServerConfig {{ jobs_directory: {}, max_threads: {}, max_backups: {}, register_pipe_path: {}, backup_dir: {} }}",
            self.jobs_directory.display(),
            self.max_threads,
            self.max_backups,
            self.register_pipe_path.display(),
            self.backup_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(alongside job file)".to_string())
        )
    }
}

/// Client-side configuration (session tag + registration pipe path).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub session_tag: String,
    pub register_pipe_path: PathBuf,
}

impl ClientConfig {
    pub fn new(session_tag: String, register_pipe_path: PathBuf) -> Self {
        Self {
            session_tag,
            register_pipe_path,
        }
    }

    pub fn req_path(&self) -> PathBuf {
        PathBuf::from(format!("/tmp/req{}", self.session_tag))
    }

    pub fn resp_path(&self) -> PathBuf {
        PathBuf::from(format!("/tmp/resp{}", self.session_tag))
    }

    pub fn notif_path(&self) -> PathBuf {
        PathBuf::from(format!("/tmp/notif{}", self.session_tag))
    }
}
