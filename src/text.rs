//! Typed token field batches.
//!
//! A tokenized text batch travels as three parallel tensors: the token ids,
//! the attention mask, and the token type ids. Upstream frameworks often ship
//! these as nested string-keyed maps (`"tokens" -> "token_ids" -> tensor`);
//! here the set is an explicit struct, so a missing field or a shape skew
//! between fields is caught at construction instead of at some later lookup.
//!
//! Two layouts appear in the pipeline:
//!
//! - [`SpanBatch`]: rank 3, `[batch, num_candidate_spans, sequence_length]` —
//!   the raw input carrying every candidate span per example.
//! - [`TokenBatch`]: rank 2, `[batch, sequence_length]` — an anchor or
//!   positive sub-batch after span sampling removed the span dimension.

use crate::tensor::{Result, Tensor, TensorElem, TensorError};

/// A set of parallel token field tensors.
///
/// Invariant (enforced by [`TokenFields::new`]): all three tensors share one
/// shape, batch dimension first. Each tensor owns its storage, so two
/// `TokenFields` never alias each other.
#[derive(Clone, Debug)]
pub struct TokenFields<T, const RANK: usize>
where
    T: TensorElem,
{
    /// Vocabulary ids, one per token position.
    pub token_ids: Tensor<T, RANK>,
    /// Attention mask: nonzero where a real token is present, zero for padding.
    pub mask: Tensor<T, RANK>,
    /// Segment / token type ids.
    pub type_ids: Tensor<T, RANK>,
}

/// A raw token batch with the candidate-span dimension still present:
/// `[batch, num_candidate_spans, sequence_length]`.
pub type SpanBatch<T> = TokenFields<T, 3>;

/// A sampled token batch with the span dimension removed:
/// `[batch, sequence_length]`.
pub type TokenBatch<T> = TokenFields<T, 2>;

impl<T, const RANK: usize> TokenFields<T, RANK>
where
    T: TensorElem,
{
    /// Builds a field set, validating that all three tensors share one shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` naming the offending field's shape
    /// if `mask` or `type_ids` disagree with `token_ids`.
    pub fn new(
        token_ids: Tensor<T, RANK>,
        mask: Tensor<T, RANK>,
        type_ids: Tensor<T, RANK>,
    ) -> Result<Self> {
        for other in [&mask, &type_ids] {
            if other.shape() != token_ids.shape() {
                return Err(TensorError::ShapeMismatch {
                    expected: token_ids.shape().to_vec(),
                    got: other.shape().to_vec(),
                });
            }
        }

        Ok(Self {
            token_ids,
            mask,
            type_ids,
        })
    }

    /// Returns the batch size (size of dimension 0).
    pub fn batch_size(&self) -> usize {
        self.token_ids.shape()[0]
    }
}

impl<T> SpanBatch<T>
where
    T: TensorElem,
{
    /// Returns the number of candidate spans (size of dimension 1).
    pub fn num_spans(&self) -> usize {
        self.token_ids.shape()[1]
    }

    /// Selects one candidate span from every field, removing the span
    /// dimension. The result is an independent copy.
    pub(crate) fn select_span(&self, span: usize) -> Result<TokenBatch<T>> {
        Ok(TokenFields {
            token_ids: self.token_ids.select_span(span)?,
            mask: self.mask.select_span(span)?,
            type_ids: self.type_ids.select_span(span)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_shapes() {
        let ids = Tensor::<i64, 3>::zeros([2, 3, 4]);
        let mask = Tensor::<i64, 3>::zeros([2, 3, 4]);
        let skewed = Tensor::<i64, 3>::zeros([2, 3, 5]);

        assert!(TokenFields::new(ids.clone(), mask.clone(), mask.clone()).is_ok());

        let err = TokenFields::new(ids, mask, skewed);
        assert!(matches!(err, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_dims() {
        let t = Tensor::<i64, 3>::zeros([2, 5, 4]);
        let batch = TokenFields::new(t.clone(), t.clone(), t).unwrap();
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.num_spans(), 5);
    }

    #[test]
    fn test_select_span_applies_to_every_field() {
        let ids = Tensor::<i64, 3>::new((0..12).collect(), [2, 3, 2]).unwrap();
        let mask = Tensor::<i64, 3>::ones([2, 3, 2]);
        let types = Tensor::<i64, 3>::zeros([2, 3, 2]);
        let batch = TokenFields::new(ids, mask, types).unwrap();

        let sub = batch.select_span(2).unwrap();
        assert_eq!(sub.token_ids.shape(), &[2, 2]);
        assert_eq!(sub.token_ids.data(), &[4, 5, 10, 11]);
        assert_eq!(sub.mask.data(), &[1, 1, 1, 1]);
        assert_eq!(sub.type_ids.data(), &[0, 0, 0, 0]);
    }
}
