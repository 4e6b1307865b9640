//! Gradient-preserving cross-replica gathering of embedding pairs.
//!
//! # Why gather at all?
//!
//! A contrastive loss trains against every *other* pair in the batch as a
//! negative. With data-parallel training the batch is split across `W`
//! replicas, so a loss computed on local embeddings alone sees
//! `2 * (batch / W - 1)` negatives instead of the `2 * (batch - 1)` a single
//! device would. Gathering all replicas' anchor/positive embeddings before
//! the loss restores the full negative set.
//!
//! # Why a naive all-gather is wrong
//!
//! A collective exchange returns plain data: the copies every replica
//! receives — *including the copy of its own shard* — carry no gradient
//! history. Feed those to the loss and backpropagation delivers nothing to
//! the local encoder: training silently stops learning. The fix is to splice
//! the original, gradient-carrying local tensors back in at this replica's
//! rank position before concatenation
//! ([`splice_gathered_rows`](crate::autograd::ops::splice_gathered_rows)).
//! Gradient then flows through exactly the local slice; the other slices need
//! none, since each peer computes its own gradients on its own replica.

use crate::autograd::ops::splice_gathered_rows;
use crate::autograd::Variable;
use crate::distributed::backend::Result;
use crate::distributed::{CollectiveBackend, ReplicaWorld};
use crate::tensor::TensorElem;

/// Gathers anchor/positive embedding pairs across all replicas, preserving
/// the gradient path for the locally produced slice.
///
/// With fewer than 2 replicas (including [`ReplicaWorld::Standalone`]) this
/// returns its inputs unchanged — the same `Variable`s, same gradient cells,
/// no copy — so call sites never need to branch on the topology. Otherwise
/// every replica receives `(world_size * batch) × dim` variables holding the
/// rank-ordered concatenation of all replicas' embeddings, with rows
/// `[rank * batch, (rank + 1) * batch)` wired back to the original inputs.
///
/// # Blocking
///
/// On the multi-replica path this performs two blocking collectives (anchors,
/// then positives). Every replica must call this function on every training
/// step; a replica that skips it deadlocks the world. See
/// [`crate::distributed`] for the full contract.
///
/// # Errors
///
/// Transport failures and cross-replica shape/dtype mismatches surface as
/// [`CollectiveError`](crate::distributed::CollectiveError). They are fatal
/// to the step; this function never retries a collective.
pub fn all_gather_anchor_positive_pairs<T, B>(
    world: &ReplicaWorld<B>,
    anchors: Variable<T, 2>,
    positives: Variable<T, 2>,
) -> Result<(Variable<T, 2>, Variable<T, 2>)>
where
    T: TensorElem + 'static,
    B: CollectiveBackend,
{
    let backend = match world {
        ReplicaWorld::Standalone => return Ok((anchors, positives)),
        ReplicaWorld::Distributed(backend) if backend.world_size() < 2 => {
            return Ok((anchors, positives))
        }
        ReplicaWorld::Distributed(backend) => backend,
    };

    let rank = backend.rank();

    // Two independent collectives; the shards come back in rank order and
    // without gradient history.
    let anchor_shards = backend.all_gather(&anchors.data)?;
    let positive_shards = backend.all_gather(&positives.data)?;

    let anchors = splice_gathered_rows(anchor_shards, &anchors, rank)?;
    let positives = splice_gathered_rows(positive_shards, &positives, rank)?;

    Ok((anchors, positives))
}
