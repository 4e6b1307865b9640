//! A channel-based collective backend.
//!
//! Implements **ring all-gather** over `crossbeam` channels: the `W` replicas
//! form a ring, and in each of `W - 1` steps every replica sends one shard to
//! its right neighbor and receives one from its left. After the last step
//! every replica holds all `W` shards. This simulates the data movement NCCL
//! performs between GPUs, with threads standing in for processes.

use super::backend::{CollectiveBackend, CollectiveError, Result};
use crate::tensor::{Tensor, TensorElem};
use crossbeam::channel::{unbounded, Receiver, Sender};

/// A collective backend for one replica in an in-process ring.
///
/// Shards travel as raw bytes; each hop validates the byte length against the
/// local tensor, so a replica that joined the collective with a mismatched
/// shape or dtype surfaces as [`CollectiveError::ShardSizeMismatch`] instead
/// of corrupt data.
pub struct RingBackend {
    rank: usize,
    world_size: usize,
    left_rx: Receiver<Vec<u8>>, // Receive from rank - 1
    right_tx: Sender<Vec<u8>>,  // Send to rank + 1
}

impl RingBackend {
    pub fn new(
        rank: usize,
        world_size: usize,
        left_rx: Receiver<Vec<u8>>,
        right_tx: Sender<Vec<u8>>,
    ) -> Self {
        Self {
            rank,
            world_size,
            left_rx,
            right_tx,
        }
    }

    /// Wires a complete ring of `world_size` backends, one per simulated
    /// replica, in rank order. Channel `i` carries messages from rank `i` to
    /// rank `(i + 1) % world_size`.
    pub fn ring(world_size: usize) -> Vec<RingBackend> {
        let (txs, rxs): (Vec<_>, Vec<_>) = (0..world_size).map(|_| unbounded()).unzip();

        (0..world_size)
            .map(|rank| {
                let left = (rank + world_size - 1) % world_size;
                RingBackend::new(rank, world_size, rxs[left].clone(), txs[rank].clone())
            })
            .collect()
    }

    fn send_shard<T: TensorElem>(&self, shard: &[T]) -> Result<()> {
        let bytes = unsafe {
            std::slice::from_raw_parts(shard.as_ptr() as *const u8, std::mem::size_of_val(shard))
        };
        self.right_tx
            .send(bytes.to_vec())
            .map_err(|_| CollectiveError::Disconnected { rank: self.rank })
    }

    fn recv_shard<T: TensorElem>(&self, from_rank: usize, expected_bytes: usize) -> Result<Vec<T>> {
        let bytes = self
            .left_rx
            .recv()
            .map_err(|_| CollectiveError::Disconnected { rank: self.rank })?;

        if bytes.len() != expected_bytes {
            return Err(CollectiveError::ShardSizeMismatch {
                from_rank,
                expected: expected_bytes,
                got: bytes.len(),
            });
        }

        // The incoming Vec<u8> is not necessarily aligned for T; copy into a
        // properly aligned Vec<T>.
        let mut shard = vec![T::zero(); bytes.len() / std::mem::size_of::<T>()];
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                shard.as_mut_ptr() as *mut u8,
                bytes.len(),
            );
        }
        Ok(shard)
    }
}

impl CollectiveBackend for RingBackend {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn all_gather<T: TensorElem>(&self, tensor: &Tensor<T, 2>) -> Result<Vec<Tensor<T, 2>>> {
        let shape = *tensor.shape();
        let expected_bytes = tensor.size() * std::mem::size_of::<T>();

        let mut slots: Vec<Vec<T>> = vec![Vec::new(); self.world_size];
        slots[self.rank] = tensor.data().to_vec();

        // In step s, rank r forwards the shard of rank (r - s) % W, which is
        // the shard it received in step s - 1 (its own shard for s = 0), and
        // receives the shard of rank (r - s - 1) % W from its left neighbor.
        for step in 0..self.world_size.saturating_sub(1) {
            let send_idx = (self.rank as isize - step as isize)
                .rem_euclid(self.world_size as isize) as usize;
            let recv_idx = (self.rank as isize - step as isize - 1)
                .rem_euclid(self.world_size as isize) as usize;

            self.send_shard(&slots[send_idx])?;
            slots[recv_idx] = self.recv_shard(recv_idx, expected_bytes)?;
        }

        slots
            .into_iter()
            .map(|data| Tensor::new(data, shape).map_err(CollectiveError::from))
            .collect()
    }
}
