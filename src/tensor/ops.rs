//! Tensor operations.
//!
//! # Overview
//!
//! The small set of operations the sampling and gathering pipeline needs:
//!
//! - **Element-wise arithmetic**: `+` and `*` (strict shapes, no broadcasting),
//!   parallelized across CPU cores with `rayon`. These back the gradient
//!   accumulation in [`crate::autograd`].
//! - **Span selection**: [`Tensor::select_span`] slices one candidate span out
//!   of a rank-3 token batch and drops the span dimension.
//! - **Batch concatenation**: [`Tensor::cat_rows`] stitches per-replica
//!   embedding shards together along the batch dimension;
//!   [`Tensor::slice_rows`] cuts a rank's slice back out of the result.
//!
//! Shapes must match exactly for element-wise operations; a mismatch is a
//! `TensorError::ShapeMismatch`, never silent broadcasting.

use super::{compute_strides, Result, Tensor, TensorElem, TensorError};

use rayon::prelude::*;
use std::ops::{Add, Mul, Range};

/// Implements a binary arithmetic operation trait (e.g., `Add`) for `&Tensor`.
///
/// Handles the boilerplate of:
/// 1. Checking shape compatibility.
/// 2. Creating a new output tensor.
/// 3. Performing the element-wise operation in parallel using `rayon`.
macro_rules! impl_bin_op {
    ($trait:ident, $method:ident) => {
        impl<T, const RANK: usize> $trait for &Tensor<T, RANK>
        where
            T: TensorElem,
        {
            type Output = Result<Tensor<T, RANK>>;

            fn $method(self, rhs: Self) -> Self::Output {
                if self.shape != rhs.shape {
                    return Err(TensorError::ShapeMismatch {
                        expected: self.shape.to_vec(),
                        got: rhs.shape.to_vec(),
                    });
                }

                let mut out = Tensor::zeros(self.shape);
                out.data
                    .par_iter_mut()
                    .zip(self.data.par_iter())
                    .zip(rhs.data.par_iter())
                    .for_each(|((o, a), b)| {
                        *o = a.$method(*b);
                    });

                Ok(out)
            }
        }
    };
}

impl_bin_op!(Add, add);
impl_bin_op!(Mul, mul);

impl<T> Tensor<T, 3>
where
    T: TensorElem,
{
    /// Selects a single candidate span from a `[batch, num_spans, seq_len]`
    /// tensor, removing the span dimension.
    ///
    /// Every example in the batch contributes its slice at span position
    /// `span`; the result is an independent `[batch, seq_len]` copy.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if `span >= num_spans`.
    pub fn select_span(&self, span: usize) -> Result<Tensor<T, 2>> {
        let [batch, num_spans, seq_len] = self.shape;
        if span >= num_spans {
            return Err(TensorError::IndexOutOfBounds {
                index: vec![span],
                shape: self.shape.to_vec(),
            });
        }

        let mut data = Vec::with_capacity(batch * seq_len);
        for b in 0..batch {
            let start = b * self.strides[0] + span * self.strides[1];
            data.extend_from_slice(&self.data[start..start + seq_len]);
        }

        Tensor::new(data, [batch, seq_len])
    }
}

impl<T> Tensor<T, 2>
where
    T: TensorElem,
{
    /// Concatenates rank-2 tensors along the batch dimension (dimension 0),
    /// in the order given.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::Unsupported` for an empty input, and
    /// `TensorError::ShapeMismatch` if the parts disagree on the number of
    /// columns.
    pub fn cat_rows(parts: &[Tensor<T, 2>]) -> Result<Tensor<T, 2>> {
        let first = parts
            .first()
            .ok_or_else(|| TensorError::Unsupported("cat_rows of zero tensors".to_string()))?;
        let cols = first.shape[1];

        let mut rows = 0;
        for part in parts {
            if part.shape[1] != cols {
                return Err(TensorError::ShapeMismatch {
                    expected: first.shape.to_vec(),
                    got: part.shape.to_vec(),
                });
            }
            rows += part.shape[0];
        }

        let mut data = Vec::with_capacity(rows * cols);
        for part in parts {
            data.extend_from_slice(&part.data);
        }

        Tensor::new(data, [rows, cols])
    }

    /// Copies out the row range `rows` as a new `[len, cols]` tensor.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if the range exceeds the
    /// number of rows.
    pub fn slice_rows(&self, rows: Range<usize>) -> Result<Tensor<T, 2>> {
        let [n_rows, cols] = self.shape;
        if rows.end > n_rows || rows.start > rows.end {
            return Err(TensorError::IndexOutOfBounds {
                index: vec![rows.start, rows.end],
                shape: self.shape.to_vec(),
            });
        }

        let len = rows.end - rows.start;
        let data = self.data[rows.start * cols..rows.end * cols].to_vec();
        let shape = [len, cols];
        let strides = compute_strides(&shape);
        Ok(Tensor {
            shape,
            strides,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Tensor::<f32, 1>::new(vec![1.0, 2.0], [2]).unwrap();
        let b = Tensor::<f32, 1>::new(vec![3.0, 4.0], [2]).unwrap();

        let c = (&a + &b).unwrap();
        assert_eq!(c.data(), &[4.0, 6.0]);

        let d = (&a * &b).unwrap();
        assert_eq!(d.data(), &[3.0, 8.0]);

        let f = Tensor::<f32, 1>::new(vec![1.0, 2.0, 3.0], [3]).unwrap();
        assert!(matches!(&a + &f, Err(TensorError::ShapeMismatch { .. })));
        assert!(matches!(&a * &f, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_select_span() {
        // [batch=2, spans=3, seq=2]; element = 100*b + 10*s + position
        let data: Vec<i64> = (0..2)
            .flat_map(|b| (0..3).flat_map(move |s| (0..2).map(move |p| 100 * b + 10 * s + p)))
            .collect();
        let t = Tensor::<i64, 3>::new(data, [2, 3, 2]).unwrap();

        let s1 = t.select_span(1).unwrap();
        assert_eq!(s1.shape(), &[2, 2]);
        assert_eq!(s1.data(), &[10, 11, 110, 111]);

        let err = t.select_span(3);
        assert!(matches!(err, Err(TensorError::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_select_span_is_a_copy() {
        let t = Tensor::<i64, 3>::ones([2, 2, 2]);
        let a = t.select_span(0).unwrap();
        let b = t.select_span(0).unwrap();
        // Owned storage: the two selections never alias.
        assert_ne!(a.data().as_ptr(), b.data().as_ptr());
    }

    #[test]
    fn test_cat_rows() {
        let a = Tensor::<f32, 2>::new(vec![1.0, 2.0], [1, 2]).unwrap();
        let b = Tensor::<f32, 2>::new(vec![3.0, 4.0, 5.0, 6.0], [2, 2]).unwrap();

        let c = Tensor::cat_rows(&[a, b]).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        assert_eq!(c.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_cat_rows_errors() {
        let empty: &[Tensor<f32, 2>] = &[];
        assert!(matches!(
            Tensor::cat_rows(empty),
            Err(TensorError::Unsupported(_))
        ));

        let a = Tensor::<f32, 2>::zeros([1, 2]);
        let b = Tensor::<f32, 2>::zeros([1, 3]);
        assert!(matches!(
            Tensor::cat_rows(&[a, b]),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_slice_rows() {
        let t = Tensor::<f32, 2>::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [3, 2]).unwrap();
        let s = t.slice_rows(1..3).unwrap();
        assert_eq!(s.shape(), &[2, 2]);
        assert_eq!(s.data(), &[3.0, 4.0, 5.0, 6.0]);

        let err = t.slice_rows(2..4);
        assert!(matches!(err, Err(TensorError::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_cat_then_slice_round_trip() {
        let a = Tensor::<f32, 2>::new(vec![1.0, 2.0], [1, 2]).unwrap();
        let b = Tensor::<f32, 2>::new(vec![3.0, 4.0], [1, 2]).unwrap();
        let c = Tensor::cat_rows(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(c.slice_rows(0..1).unwrap().data(), a.data());
        assert_eq!(c.slice_rows(1..2).unwrap().data(), b.data());
    }
}
