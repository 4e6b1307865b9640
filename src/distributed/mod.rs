//! # Distributed replica coordination
//!
//! Synchronous data-parallel contrastive training runs one replica per
//! process (or per thread, when simulated), each holding a full copy of the
//! encoder and its own shard of the data. The only cross-replica traffic this
//! crate generates is the per-step all-gather of anchor/positive embeddings.
//!
//! ## Module Contents
//!
//! * [`CollectiveBackend`](backend::CollectiveBackend): the communication
//!   interface — rank, world size, and a blocking all-gather.
//! * [`RingBackend`](ring::RingBackend): an in-process backend that moves
//!   shards around a ring of `crossbeam` channels, one hop per step. This is
//!   the same data movement NCCL performs on GPUs, runnable in a unit test.
//! * [`ReplicaWorld`](world::ReplicaWorld): the explicit
//!   `Standalone | Distributed` decision, made once at process start and
//!   passed into the gatherer instead of queried from ambient global state.
//!
//! ## Deadlock contract
//!
//! The all-gather is a barrier: every replica must call it exactly once per
//! training step with matching tensor shape and dtype. A replica that skips a
//! step (or calls with a mismatched shape) stalls or kills the whole world.
//! There is no timeout and no retry; step-level synchronization is the
//! caller's responsibility.

pub mod backend;
pub mod ring;
pub mod world;

pub use backend::{CollectiveBackend, CollectiveError};
pub use ring::RingBackend;
pub use world::ReplicaWorld;
