use emu_core::{EmuError, ErrorInfo, Rank, World};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::transport::{Tag, Transport};

fn encode<M: Serialize>(value: &M) -> Result<Vec<u8>, EmuError> {
    bincode::serialize(value)
        .map_err(|err| EmuError::Comm(ErrorInfo::new("comm_encode", err.to_string())))
}

fn decode<M: DeserializeOwned>(bytes: &[u8], source: Rank) -> Result<M, EmuError> {
    bincode::deserialize(bytes).map_err(|err| {
        EmuError::Comm(ErrorInfo::new("comm_decode", err.to_string()).with_context("source", source))
    })
}

fn protocol_violation(message: impl Into<String>) -> EmuError {
    EmuError::Comm(ErrorInfo::new("comm_protocol_violation", message.into()))
}

/// Typed collectives rooted at the coordinator rank.
///
/// Every rank must issue the same collectives in the same order: each call
/// consumes the next tag of a per-communicator sequence.
///
/// Only the coordinator's receives in [`Communicator::gather`] carry the
/// transport timeout; a worker that does not answer in time fails the run
/// with `comm_timeout`. Workers wait on the coordinator without a deadline,
/// since it may spend arbitrarily long evaluating the model between
/// collectives.
#[derive(Debug)]
pub struct Communicator<T: Transport> {
    transport: T,
    sequence: Tag,
}

impl<T: Transport> Communicator<T> {
    /// Wraps a connected transport endpoint.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sequence: 0,
        }
    }

    /// Position of this rank in the run.
    pub fn world(&self) -> World {
        World {
            rank: self.transport.rank(),
            size: self.transport.size(),
        }
    }

    /// Rank of this endpoint.
    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.transport.size()
    }

    /// True on the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.world().is_coordinator()
    }

    /// Tells every peer that this rank gave up.
    pub fn abort(&self, reason: &str) {
        self.transport.abort(reason);
    }

    fn next_tag(&mut self) -> Tag {
        self.sequence += 1;
        self.sequence
    }

    /// Sends the coordinator's `value` to every rank and returns it everywhere.
    ///
    /// Workers pass `None`; the coordinator must pass `Some`.
    pub fn broadcast<M>(&mut self, value: Option<M>) -> Result<M, EmuError>
    where
        M: Serialize + DeserializeOwned,
    {
        let tag = self.next_tag();
        if self.is_coordinator() {
            let value = value.ok_or_else(|| protocol_violation("coordinator broadcast without a value"))?;
            let bytes = encode(&value)?;
            for dest in 1..self.size() {
                self.transport.send(dest, tag, bytes.clone())?;
            }
            trace!(tag, bytes = bytes.len(), "broadcast");
            Ok(value)
        } else {
            let bytes = self.transport.recv_blocking(World::COORDINATOR, tag)?;
            decode(&bytes, World::COORDINATOR)
        }
    }

    /// Hands part `r` of the coordinator's `parts` to rank `r`.
    pub fn scatter<M>(&mut self, parts: Option<Vec<M>>) -> Result<M, EmuError>
    where
        M: Serialize + DeserializeOwned,
    {
        let tag = self.next_tag();
        if self.is_coordinator() {
            let parts = parts.ok_or_else(|| protocol_violation("coordinator scatter without parts"))?;
            if parts.len() != self.size() {
                return Err(protocol_violation("scatter needs exactly one part per rank")
                    .with_context("parts", parts.len())
                    .with_context("size", self.size()));
            }
            let mut parts = parts.into_iter();
            let own = parts
                .next()
                .ok_or_else(|| protocol_violation("scatter without a coordinator part"))?;
            for (dest, part) in (1..).zip(parts) {
                self.transport.send(dest, tag, encode(&part)?)?;
            }
            Ok(own)
        } else {
            let bytes = self.transport.recv_blocking(World::COORDINATOR, tag)?;
            decode(&bytes, World::COORDINATOR)
        }
    }

    /// Collects one value per rank on the coordinator, in rank order.
    ///
    /// Returns `Some` on the coordinator and `None` on workers.
    pub fn gather<M>(&mut self, value: M) -> Result<Option<Vec<M>>, EmuError>
    where
        M: Serialize + DeserializeOwned,
    {
        let tag = self.next_tag();
        if self.is_coordinator() {
            let mut values = Vec::with_capacity(self.size());
            values.push(value);
            for source in 1..self.size() {
                let bytes = self.transport.recv(source, tag)?;
                values.push(decode(&bytes, source)?);
            }
            Ok(Some(values))
        } else {
            self.transport
                .send(World::COORDINATOR, tag, encode(&value)?)?;
            Ok(None)
        }
    }

    /// Returns once every rank has entered the barrier.
    pub fn barrier(&mut self) -> Result<(), EmuError> {
        self.gather(())?;
        let coordinator = if self.is_coordinator() { Some(()) } else { None };
        self.broadcast(coordinator)
    }
}
