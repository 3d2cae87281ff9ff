use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use emu_core::{EmuError, ErrorInfo, Rank};
use tracing::{debug, error};

use crate::comm::Communicator;
use crate::transport::{LocalTransport, Transport};

/// Failures that only follow from another rank giving up first.
fn is_consequential(err: &EmuError) -> bool {
    matches!(err.code(), "comm_peer_aborted" | "comm_disconnected")
}

fn rank_panicked(rank: Rank, payload: &(dyn std::any::Any + Send)) -> EmuError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "rank panicked".to_string());
    EmuError::Comm(ErrorInfo::new("comm_rank_panicked", message).with_context("rank", rank))
}

/// Launches the ranks of a run as named threads of the current process.
///
/// Ranks only talk through their [`Communicator`]; every payload is encoded,
/// so nothing is shared between them except the channels.
#[derive(Debug, Clone, Copy)]
pub struct LocalCluster {
    size: usize,
    timeout: Duration,
}

impl LocalCluster {
    /// Describes a cluster of `size` ranks with the given receive timeout.
    pub fn new(size: usize, timeout: Duration) -> Result<Self, EmuError> {
        if size == 0 {
            return Err(EmuError::Comm(
                ErrorInfo::new("comm_no_ranks", "a run needs at least one rank")
                    .with_context("size", size),
            ));
        }
        Ok(Self { size, timeout })
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `body` on every rank and returns the per-rank results in rank order.
    ///
    /// A rank that fails or panics aborts its peers. The returned error is the
    /// lowest-rank failure that is not a consequence of another rank's abort
    /// or exit.
    pub fn run<F, R>(&self, body: F) -> Result<Vec<R>, EmuError>
    where
        F: Fn(Communicator<LocalTransport>) -> Result<R, EmuError> + Sync,
        R: Send,
    {
        let endpoints = LocalTransport::mesh(self.size, self.timeout);
        let body = &body;
        let outcomes: Vec<Result<R, EmuError>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.size);
            for endpoint in endpoints {
                let rank = endpoint.rank();
                let aborter = endpoint.abort_handle();
                let spawned = thread::Builder::new()
                    .name(format!("emu-rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        debug!(rank, "rank started");
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            body(Communicator::new(endpoint))
                        }))
                        .unwrap_or_else(|payload| Err(rank_panicked(rank, payload.as_ref())));
                        if let Err(err) = &outcome {
                            if !is_consequential(err) {
                                error!(rank, code = err.code(), "rank failed: {err}");
                            }
                            aborter.abort(&err.to_string());
                        }
                        debug!(rank, ok = outcome.is_ok(), "rank finished");
                        outcome
                    });
                handles.push((rank, spawned));
            }
            handles
                .into_iter()
                .map(|(rank, spawned)| {
                    let handle = spawned.map_err(|err| {
                        EmuError::Comm(
                            ErrorInfo::new("comm_spawn", err.to_string()).with_context("rank", rank),
                        )
                    })?;
                    handle
                        .join()
                        .unwrap_or_else(|payload| Err(rank_panicked(rank, payload.as_ref())))
                })
                .collect()
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error: Option<EmuError> = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    let replace = match &first_error {
                        None => true,
                        Some(current) => is_consequential(current) && !is_consequential(&err),
                    };
                    if replace {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    /// Shorthand for `LocalCluster::new(size, timeout)?.run(body)`.
    pub fn launch<F, R>(size: usize, timeout: Duration, body: F) -> Result<Vec<R>, EmuError>
    where
        F: Fn(Communicator<LocalTransport>) -> Result<R, EmuError> + Sync,
        R: Send,
    {
        Self::new(size, timeout)?.run(body)
    }
}
