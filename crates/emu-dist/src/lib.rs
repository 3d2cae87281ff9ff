#![deny(missing_docs)]
#![doc = "Work partitioning and the message-passing runtime that spreads emulator systems over worker ranks."]

/// In-process launcher for the ranks of a run.
pub mod cluster;
/// Typed collectives over a transport.
pub mod comm;
/// Assignment of emulator systems to ranks.
pub mod partition;
/// Modeled evaluation rate of a partition.
pub mod throughput;
/// Point-to-point byte transport.
pub mod transport;

pub use cluster::LocalCluster;
pub use comm::Communicator;
pub use partition::{partition, Block, CostBalanced, Partition, PartitionStrategy, RoundRobin, StrategyKind};
pub use throughput::{estimate, predicted_eval_rate, ThroughputEstimate};
pub use transport::{AbortHandle, Envelope, LocalTransport, Tag, Transport};
