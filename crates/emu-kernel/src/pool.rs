use std::fmt;

use emu_core::{EmuError, ErrorInfo, Rank, ThreadBudget};

/// Rayon pool sized to the per-process thread budget.
///
/// Kernel work never runs on the global rayon pool, which would size itself
/// to every core of the machine regardless of sibling processes.
pub struct KernelPool {
    pool: rayon::ThreadPool,
    budget: ThreadBudget,
}

impl KernelPool {
    /// Builds the pool for one worker process.
    pub fn new(rank: Rank, budget: ThreadBudget) -> Result<Self, EmuError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(budget.threads.max(1))
            .thread_name(move |idx| format!("emu-kernel-{rank}-{idx}"))
            .build()
            .map_err(|err| {
                EmuError::Config(
                    ErrorInfo::new("config_thread_pool", err.to_string())
                        .with_context("rank", rank)
                        .with_context("threads", budget.threads),
                )
            })?;
        Ok(Self { pool, budget })
    }

    /// Runs `op` inside the pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Number of threads actually running in the pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Budget the pool was built from.
    pub fn budget(&self) -> ThreadBudget {
        self.budget
    }
}

impl fmt::Debug for KernelPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelPool")
            .field("threads", &self.threads())
            .field("budget", &self.budget)
            .finish()
    }
}
