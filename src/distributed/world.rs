//! The replica world: how many replicas exist and which one this is.

use super::backend::CollectiveBackend;

/// The process's view of the training topology, decided once at startup.
///
/// Frameworks often expose this as ambient global state ("query the runtime,
/// catch the error if it was never initialized"). Here it is an explicit
/// value passed into the gatherer: an uninitialized or absent distributed
/// runtime is simply [`ReplicaWorld::Standalone`], and the gatherer's no-op
/// path is a visible branch on this enum rather than an absorbed failure.
#[derive(Debug)]
pub enum ReplicaWorld<B> {
    /// Single-replica training (including "the runtime was never set up").
    Standalone,
    /// One replica among `world_size() >= 1` peers, with a live collective
    /// backend.
    Distributed(B),
}

impl<B> ReplicaWorld<B>
where
    B: CollectiveBackend,
{
    /// Returns the number of active replicas (1 when standalone).
    pub fn world_size(&self) -> usize {
        match self {
            ReplicaWorld::Standalone => 1,
            ReplicaWorld::Distributed(backend) => backend.world_size(),
        }
    }

    /// Returns this replica's rank (0 when standalone).
    pub fn rank(&self) -> usize {
        match self {
            ReplicaWorld::Standalone => 0,
            ReplicaWorld::Distributed(backend) => backend.rank(),
        }
    }
}
