use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use emu_core::{EmuError, ErrorInfo, Rank};
use tracing::{debug, trace};

/// Message tag distinguishing interleaved collectives.
pub type Tag = u64;

fn comm_error(code: &str, message: impl Into<String>) -> EmuError {
    EmuError::Comm(ErrorInfo::new(code, message.into()))
}

/// Unit of transfer between two ranks.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Serialized payload.
    Data {
        /// Sending rank.
        source: Rank,
        /// Collective tag.
        tag: Tag,
        /// Encoded message body.
        payload: Vec<u8>,
    },
    /// The sender gave up; every later receive on the peer fails.
    Abort {
        /// Sending rank.
        source: Rank,
        /// Error that made the sender give up.
        reason: String,
    },
}

/// Point-to-point byte transport between the ranks of one run.
pub trait Transport: Send {
    /// Rank of the local endpoint.
    fn rank(&self) -> Rank;

    /// Number of ranks in the run.
    fn size(&self) -> usize;

    /// Sends `payload` to `dest` without waiting for it to be received.
    fn send(&self, dest: Rank, tag: Tag, payload: Vec<u8>) -> Result<(), EmuError>;

    /// Blocks until a payload from `source` with `tag` arrives, failing with
    /// `comm_timeout` once the transport's receive timeout has passed.
    fn recv(&mut self, source: Rank, tag: Tag) -> Result<Vec<u8>, EmuError>;

    /// Like [`Transport::recv`] but without a deadline. Only an abort from a
    /// peer ends the wait early.
    fn recv_blocking(&mut self, source: Rank, tag: Tag) -> Result<Vec<u8>, EmuError>;

    /// Tells every peer that this rank gave up.
    fn abort(&self, reason: &str);
}

/// Handle that can abort the peers of a rank after its transport was moved.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    rank: Rank,
    peers: Vec<Sender<Envelope>>,
}

impl AbortHandle {
    /// Sends an abort envelope to every other rank.
    pub fn abort(&self, reason: &str) {
        for (dest, peer) in self.peers.iter().enumerate() {
            if dest == self.rank {
                continue;
            }
            // a peer that already left has nothing left to abort
            let _ = peer.send(Envelope::Abort {
                source: self.rank,
                reason: reason.to_string(),
            });
        }
    }
}

/// In-process transport: one mpsc inbox per rank.
#[derive(Debug)]
pub struct LocalTransport {
    rank: Rank,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    stash: VecDeque<(Rank, Tag, Vec<u8>)>,
    aborted: Option<(Rank, String)>,
    timeout: Duration,
}

impl LocalTransport {
    /// Creates a fully connected set of `size` endpoints.
    pub fn mesh(size: usize, timeout: Duration) -> Vec<LocalTransport> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| mpsc::channel()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalTransport {
                rank,
                peers: senders.clone(),
                inbox,
                stash: VecDeque::new(),
                aborted: None,
                timeout,
            })
            .collect()
    }

    /// Handle used to abort peers once this endpoint has been moved away.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            rank: self.rank,
            peers: self.peers.clone(),
        }
    }

    /// Receive timeout applied by [`Transport::recv`].
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn take_stashed(&mut self, source: Rank, tag: Tag) -> Option<Vec<u8>> {
        let position = self
            .stash
            .iter()
            .position(|(from, stashed_tag, _)| *from == source && *stashed_tag == tag)?;
        self.stash.remove(position).map(|(_, _, payload)| payload)
    }

    fn peer_aborted(&self, peer: Rank, reason: &str) -> EmuError {
        comm_error("comm_peer_aborted", "a peer rank aborted the run")
            .with_context("rank", self.rank)
            .with_context("peer", peer)
            .with_context("reason", reason)
    }

    fn recv_until(
        &mut self,
        source: Rank,
        tag: Tag,
        deadline: Option<Instant>,
    ) -> Result<Vec<u8>, EmuError> {
        self.check_rank(source)?;
        if let Some(payload) = self.take_stashed(source, tag) {
            return Ok(payload);
        }
        if let Some((peer, reason)) = &self.aborted {
            return Err(self.peer_aborted(*peer, reason));
        }
        loop {
            let received = match deadline {
                Some(deadline) => self
                    .inbox
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self.inbox.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(Envelope::Data {
                    source: from,
                    tag: got,
                    payload,
                }) => {
                    if from == source && got == tag {
                        trace!(rank = self.rank, source, tag, bytes = payload.len(), "recv");
                        return Ok(payload);
                    }
                    self.stash.push_back((from, got, payload));
                }
                Ok(Envelope::Abort { source: peer, reason }) => {
                    debug!(rank = self.rank, peer, %reason, "peer aborted");
                    let err = self.peer_aborted(peer, &reason);
                    self.aborted = Some((peer, reason));
                    return Err(err);
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(comm_error("comm_timeout", "no message before the receive timeout")
                        .with_context("rank", self.rank)
                        .with_context("source", source)
                        .with_context("tag", tag)
                        .with_context("timeout_ms", self.timeout.as_millis()));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(comm_error("comm_disconnected", "every sender has exited")
                        .with_context("rank", self.rank)
                        .with_context("source", source));
                }
            }
        }
    }

    fn check_rank(&self, peer: Rank) -> Result<(), EmuError> {
        if peer >= self.peers.len() {
            return Err(comm_error("comm_invalid_rank", "rank outside the communicator")
                .with_context("rank", peer)
                .with_context("size", self.peers.len()));
        }
        Ok(())
    }
}

impl Transport for LocalTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, dest: Rank, tag: Tag, payload: Vec<u8>) -> Result<(), EmuError> {
        self.check_rank(dest)?;
        trace!(rank = self.rank, dest, tag, bytes = payload.len(), "send");
        self.peers[dest]
            .send(Envelope::Data {
                source: self.rank,
                tag,
                payload,
            })
            .map_err(|_| {
                comm_error("comm_disconnected", "destination rank has already exited")
                    .with_context("rank", self.rank)
                    .with_context("dest", dest)
                    .with_context("tag", tag)
            })
    }

    fn recv(&mut self, source: Rank, tag: Tag) -> Result<Vec<u8>, EmuError> {
        let deadline = Instant::now() + self.timeout;
        self.recv_until(source, tag, Some(deadline))
    }

    fn recv_blocking(&mut self, source: Rank, tag: Tag) -> Result<Vec<u8>, EmuError> {
        self.recv_until(source, tag, None)
    }

    fn abort(&self, reason: &str) {
        self.abort_handle().abort(reason);
    }
}
