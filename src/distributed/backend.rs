//! Abstraction for a distributed communication backend.

use crate::tensor::{Tensor, TensorElem, TensorError};
use thiserror::Error;

/// Error type for collective operations.
///
/// Any of these ends the training step; a collective cannot be retried by one
/// participant without deadlocking the others, so callers are expected to
/// treat every variant as fatal.
#[derive(Error, Debug)]
pub enum CollectiveError {
    /// A ring neighbor hung up mid-collective (its replica died or finished
    /// its step count early).
    #[error("rank {rank}: ring peer disconnected during collective")]
    Disconnected { rank: usize },
    /// A received shard's byte length disagrees with the local tensor, which
    /// means the replicas called the collective with mismatched shapes or
    /// dtypes.
    #[error("shard from rank {from_rank} has {got} bytes, expected {expected}: mismatched tensor shape or dtype across replicas")]
    ShardSizeMismatch {
        from_rank: usize,
        expected: usize,
        got: usize,
    },
    /// Reassembling a shard into a tensor failed.
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, CollectiveError>;

/// Abstraction for a distributed communication backend.
///
/// Implementations cover different transports — an NCCL-style GPU collective
/// in production, [`RingBackend`](super::RingBackend) over channels for
/// in-process simulation — behind the three queries the gatherer needs.
pub trait CollectiveBackend: Send + Sync {
    /// Returns the rank of the current replica, in `[0, world_size)`.
    fn rank(&self) -> usize;

    /// Returns the total number of replicas.
    fn world_size(&self) -> usize;

    /// Performs a blocking all-gather: every replica sends its local tensor
    /// and receives every replica's tensor, returned in ascending rank order
    /// (so `result[self.rank()]` holds a copy of `tensor`).
    ///
    /// This call suspends until all `world_size` participants have both sent
    /// and received. If any participant never calls it for this step, all
    /// participants block indefinitely.
    ///
    /// The returned tensors are plain data with no gradient history; restoring
    /// the local slice's history is the caller's job (see
    /// [`crate::gather::all_gather_anchor_positive_pairs`]).
    fn all_gather<T: TensorElem>(&self, tensor: &Tensor<T, 2>) -> Result<Vec<Tensor<T, 2>>>;
}
