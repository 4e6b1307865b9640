//! Anchor/positive span pair sampling.
//!
//! Contrastive training of a text encoder needs two different views of every
//! training example. Upstream preprocessing stores several candidate spans per
//! example; this module draws two of them per step and splits the batch into
//! an "anchor" sub-batch and a "positive" sub-batch.
//!
//! The draw is a single pair of indices shared by the whole batch, not a
//! per-example draw: every example contributes its span at the same two
//! positions. Replicas sample independently — nothing requires two replicas
//! to agree on which span positions they each picked.

use rand::Rng;
use thiserror::Error;

use crate::tensor::{TensorElem, TensorError};
use crate::text::{SpanBatch, TokenBatch};

/// Error type for span sampling.
#[derive(Error, Debug)]
pub enum SampleError {
    /// Fewer than 2 candidate spans: an anchor/positive pair of distinct spans
    /// cannot be drawn. The batch is malformed upstream; not retryable.
    #[error("cannot sample an anchor/positive span pair: need at least 2 candidate spans, got {available}")]
    InsufficientSpans { available: usize },
    /// A field tensor rejected the selection.
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// Samples an anchor/positive pair of sub-batches from a raw span batch.
///
/// Draws two distinct span indices uniformly at random (without replacement)
/// from `[0, num_spans)` using the thread-local RNG, then selects those span
/// slices from every field. **Convention: the first drawn index becomes the
/// anchor, the second the positive.** The symmetric contrastive loss does not
/// care which is which, but a fixed convention keeps sampled sequences
/// reproducible under a fixed seed (see
/// [`sample_anchor_positive_pairs_with`]).
///
/// Both returned batches have the span dimension removed, the input's batch
/// size, and independent storage.
///
/// # Errors
///
/// Returns [`SampleError::InsufficientSpans`] if the batch holds fewer than 2
/// candidate spans.
///
/// # Example
///
/// ```rust
/// use contrast_rs::sampler::sample_anchor_positive_pairs;
/// use contrast_rs::tensor::Tensor;
/// use contrast_rs::text::TokenFields;
///
/// // 2 examples, 3 candidate spans, sequence length 4
/// let ids = Tensor::<i64, 3>::new((0..24).collect(), [2, 3, 4]).unwrap();
/// let batch = TokenFields::new(ids.clone(), ids.clone(), ids).unwrap();
///
/// let (anchors, positives) = sample_anchor_positive_pairs(&batch).unwrap();
/// assert_eq!(anchors.token_ids.shape(), &[2, 4]);
/// assert_eq!(positives.token_ids.shape(), &[2, 4]);
/// ```
pub fn sample_anchor_positive_pairs<T>(
    tokens: &SpanBatch<T>,
) -> Result<(TokenBatch<T>, TokenBatch<T>), SampleError>
where
    T: TensorElem,
{
    sample_anchor_positive_pairs_with(&mut rand::rng(), tokens)
}

/// Like [`sample_anchor_positive_pairs`], but drawing from a caller-provided
/// RNG, for seeded reproducibility.
pub fn sample_anchor_positive_pairs_with<T, R>(
    rng: &mut R,
    tokens: &SpanBatch<T>,
) -> Result<(TokenBatch<T>, TokenBatch<T>), SampleError>
where
    T: TensorElem,
    R: Rng + ?Sized,
{
    let num_spans = tokens.num_spans();
    if num_spans < 2 {
        return Err(SampleError::InsufficientSpans {
            available: num_spans,
        });
    }

    let drawn = rand::seq::index::sample(rng, num_spans, 2);
    let (anchor_span, positive_span) = (drawn.index(0), drawn.index(1));

    let anchors = tokens.select_span(anchor_span)?;
    let positives = tokens.select_span(positive_span)?;

    Ok((anchors, positives))
}
