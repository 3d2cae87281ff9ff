//! Per-process thread budget for the numerical kernel.
//!
//! Every worker process runs its own kernel thread pool. The pools know
//! nothing about their siblings, so the budget handed to each one has to be
//! derived from the core count and the number of processes sharing it:
//! `max(1, floor(cores / processes))`. Without the cap P processes would each
//! start P threads and contend for the same cores.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{EmuError, ErrorInfo};

/// Environment variable bounding the kernel's internal parallelism.
pub const THREADS_ENV: &str = "OMP_NUM_THREADS";

/// Requested kernel thread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThreadSetting {
    /// Derive the budget from the core count and the process count.
    #[default]
    Auto,
    /// Use an explicit positive thread count (capped when it would oversubscribe).
    Explicit(usize),
}

impl ThreadSetting {
    /// Parses the raw value of [`THREADS_ENV`].
    pub fn parse(raw: &str) -> Result<Self, EmuError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(ThreadSetting::Auto);
        }
        match trimmed.parse::<usize>() {
            Ok(value) if value > 0 => Ok(ThreadSetting::Explicit(value)),
            _ => Err(EmuError::Config(
                ErrorInfo::new(
                    "config_threads_env",
                    "thread count must be a positive integer",
                )
                .with_context("variable", THREADS_ENV)
                .with_context("value", trimmed),
            )),
        }
    }

    /// Reads the setting from the process environment at startup.
    pub fn from_env() -> Result<Self, EmuError> {
        match std::env::var(THREADS_ENV) {
            Ok(raw) => Self::parse(&raw),
            Err(std::env::VarError::NotPresent) => Ok(ThreadSetting::Auto),
            Err(err) => Err(EmuError::Config(
                ErrorInfo::new("config_threads_env", err.to_string())
                    .with_context("variable", THREADS_ENV),
            )),
        }
    }
}

/// Effective thread budget applied to one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadBudget {
    /// Threads the kernel may use inside this process.
    pub threads: usize,
    /// Physical or logical cores visible to the run.
    pub cores: usize,
    /// Number of worker processes sharing those cores.
    pub processes: usize,
    /// True when an explicit request was lowered to avoid oversubscription.
    pub capped: bool,
}

impl ThreadBudget {
    /// Budget derived purely from the core and process counts.
    pub fn auto(cores: usize, processes: usize) -> Self {
        Self {
            threads: auto_threads(cores, processes),
            cores: cores.max(1),
            processes: processes.max(1),
            capped: false,
        }
    }

    /// Resolves a setting against the machine shape.
    pub fn resolve(setting: ThreadSetting, cores: usize, processes: usize) -> Self {
        let auto = Self::auto(cores, processes);
        match setting {
            ThreadSetting::Auto => auto,
            ThreadSetting::Explicit(requested) => {
                if requested.saturating_mul(auto.processes) > auto.cores
                    && requested > auto.threads
                {
                    warn!(
                        requested,
                        processes = auto.processes,
                        cores = auto.cores,
                        threads = auto.threads,
                        "kernel thread request oversubscribes cores; capping"
                    );
                    Self {
                        capped: true,
                        ..auto
                    }
                } else {
                    Self {
                        threads: requested.max(1),
                        ..auto
                    }
                }
            }
        }
    }

    /// Resolves the budget for this machine, reading [`THREADS_ENV`].
    pub fn for_processes(processes: usize) -> Result<Self, EmuError> {
        let setting = ThreadSetting::from_env()?;
        Ok(Self::resolve(setting, available_cores(), processes))
    }

    /// Total kernel threads across every process of the run.
    pub fn total_threads(&self) -> usize {
        self.threads * self.processes
    }
}

/// `max(1, floor(cores / processes))`.
pub fn auto_threads(cores: usize, processes: usize) -> usize {
    (cores / processes.max(1)).max(1)
}

/// Number of cores visible to this process.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
