//! # contrast-rs
//!
//! `contrast-rs` implements the distributed sampling and cross-device
//! aggregation logic used to train a contrastive text encoder:
//!
//! 1. [`sampler::sample_anchor_positive_pairs`] draws two distinct candidate
//!    spans per step and splits a token batch into an **anchor** sub-batch and
//!    a **positive** sub-batch.
//! 2. An external encoder (out of scope here) maps each sub-batch to an
//!    embedding [`Variable`].
//! 3. [`gather::all_gather_anchor_positive_pairs`] assembles the full
//!    cross-replica batch of embedding pairs so the contrastive loss sees
//!    every replica's negatives — without losing the gradient path back to
//!    the local encoder.
//!
//! Call 1 and 3 once each per training step, in that order, on every replica.
//!
//! ## Modules
//!
//! - [`mod@tensor`]: CPU tensor with const-generic rank.
//! - [`autograd`]: tape-based reverse-mode AD (`Variable`, graph nodes).
//! - [`text`]: typed token field batches (ids, mask, type ids).
//! - [`sampler`]: anchor/positive span pair sampling.
//! - [`distributed`]: collective backend, channel ring, replica world.
//! - [`gather`]: the gradient-preserving cross-replica all-gather.
//!
//! ## Example
//!
//! ```rust
//! use contrast_rs::distributed::{ReplicaWorld, RingBackend};
//! use contrast_rs::gather::all_gather_anchor_positive_pairs;
//! use contrast_rs::sampler::sample_anchor_positive_pairs;
//! use contrast_rs::tensor::Tensor;
//! use contrast_rs::text::TokenFields;
//! use contrast_rs::Variable;
//!
//! // A batch of 2 examples with 3 candidate spans of length 4 each.
//! let ids = Tensor::<i64, 3>::new((0..24).collect(), [2, 3, 4]).unwrap();
//! let batch = TokenFields::new(ids.clone(), ids.clone(), ids).unwrap();
//! let (anchors, positives) = sample_anchor_positive_pairs(&batch).unwrap();
//! assert_eq!(anchors.token_ids.shape(), &[2, 4]);
//!
//! // ... encode anchors and positives (external) ...
//! let anchor_emb = Variable::new(Tensor::<f32, 2>::ones([2, 8]));
//! let positive_emb = Variable::new(Tensor::<f32, 2>::ones([2, 8]));
//!
//! // Single-replica training: the gather is an exact no-op.
//! let world = ReplicaWorld::<RingBackend>::Standalone;
//! let (anchor_emb, positive_emb) =
//!     all_gather_anchor_positive_pairs(&world, anchor_emb, positive_emb).unwrap();
//! assert_eq!(anchor_emb.data.shape(), &[2, 8]);
//! # drop(positive_emb);
//! ```

pub mod autograd;
pub mod distributed;
pub mod gather;
pub mod sampler;
pub mod tensor;
pub mod text;

pub use autograd::Variable;
pub use gather::all_gather_anchor_positive_pairs;
pub use sampler::sample_anchor_positive_pairs;
pub use tensor::{Tensor, TensorElem, TensorError};
pub use text::{SpanBatch, TokenBatch, TokenFields};
