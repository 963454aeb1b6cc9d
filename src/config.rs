//! Startup configuration: command-line flags, env fallbacks, timing knobs.
//!
//! DESIGN
//! ======
//! Everything is read once in `main` and validated there. The rename
//! settings (`RenameConfig`) and the scheduler timing (`Timing`) are plain
//! values handed to the services; nothing re-reads the environment later.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

pub const DEFAULT_PREFIX: &str = "01_02Houdini_";
pub const CANVAS_EXTENSION: &str = ".canvas";

const DEFAULT_TICK_INTERVAL_MS: u64 = 5000;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_PASTE_DELAY_MS: u64 = 1500;
const DEFAULT_PASTE_RETRY_LIMIT: u32 = 1;
const DEFAULT_TRIGGER_QUEUE_CAPACITY: usize = 64;
const DEFAULT_PORT: u16 = 3000;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "canvas-autorename", about = "Rename canvas images after their grid position")]
pub struct Cli {
    /// Directory the canvas and its attachments live in.
    #[arg(long, env = "CANVAS_VAULT_ROOT", default_value = ".")]
    pub vault_root: PathBuf,

    /// Vault-relative path of the canvas to maintain.
    #[arg(long, env = "CANVAS_TARGET")]
    pub target: Option<String>,

    /// Filename prefix for renamed images.
    #[arg(long, env = "CANVAS_PREFIX")]
    pub prefix: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Rename on a timer and on paste events until interrupted.
    Watch {
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Print the pending renames without touching any file.
    Plan,
    /// Run one rename pass and print its report.
    Apply,
    /// List the canvas documents in the vault.
    Documents,
}

/// `watch` when no subcommand is given; `PORT` applies as it does to
/// `watch` itself.
impl Default for Command {
    fn default() -> Self {
        Self::Watch { port: env_parse("PORT", DEFAULT_PORT) }
    }
}

// =============================================================================
// RENAME CONFIG
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing target canvas; pass --target or set CANVAS_TARGET")]
    MissingTarget,
    #[error("target is not a canvas document: {0}")]
    NotCanvas(String),
    #[error("target must be relative to the vault root: {0}")]
    AbsoluteTarget(String),
    #[error("prefix must not contain '/': {0}")]
    InvalidPrefix(String),
}

/// Which document to maintain and how to name its images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameConfig {
    pub target: String,
    pub prefix: String,
}

impl RenameConfig {
    /// Validate raw settings. An absent or blank prefix falls back to
    /// [`DEFAULT_PREFIX`].
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for a missing, absolute, or non-canvas target,
    /// or a prefix that would move files into another directory.
    pub fn new(target: Option<&str>, prefix: Option<&str>) -> Result<Self, ConfigError> {
        let target = target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingTarget)?;
        let target = target.strip_prefix("./").unwrap_or(target);
        if target.starts_with('/') {
            return Err(ConfigError::AbsoluteTarget(target.to_owned()));
        }
        if !target.to_ascii_lowercase().ends_with(CANVAS_EXTENSION) {
            return Err(ConfigError::NotCanvas(target.to_owned()));
        }

        let prefix = match prefix.map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => DEFAULT_PREFIX,
        };
        if prefix.contains('/') {
            return Err(ConfigError::InvalidPrefix(prefix.to_owned()));
        }

        Ok(Self { target: target.to_owned(), prefix: prefix.to_owned() })
    }

    /// Directory prefix renamed images are placed under.
    #[must_use]
    pub fn document_dir(&self) -> String {
        crate::planner::directory_prefix(&self.target)
    }
}

// =============================================================================
// TIMING
// =============================================================================

/// Scheduler timing, loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Interval between periodic passes.
    pub tick_interval: Duration,
    /// Delay before a source-missing entry or an empty paste pass is retried.
    pub retry_delay: Duration,
    /// Delay between a paste event and its pass.
    pub paste_delay: Duration,
    /// Extra passes allowed after a paste pass finds no images.
    pub paste_retry_limit: u32,
    /// Bounded trigger queue capacity.
    pub queue_capacity: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            paste_delay: Duration::from_millis(DEFAULT_PASTE_DELAY_MS),
            paste_retry_limit: DEFAULT_PASTE_RETRY_LIMIT,
            queue_capacity: DEFAULT_TRIGGER_QUEUE_CAPACITY,
        }
    }
}

impl Timing {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            tick_interval: Duration::from_millis(env_parse("TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS).max(1)),
            retry_delay: Duration::from_millis(env_parse("RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)),
            paste_delay: Duration::from_millis(env_parse("PASTE_DELAY_MS", DEFAULT_PASTE_DELAY_MS)),
            paste_retry_limit: env_parse("PASTE_RETRY_LIMIT", DEFAULT_PASTE_RETRY_LIMIT),
            queue_capacity: env_parse("TRIGGER_QUEUE_CAPACITY", DEFAULT_TRIGGER_QUEUE_CAPACITY).max(1),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
