//! Core Tensor implementation.
//!
//! # What is a Tensor here?
//!
//! A **Tensor** is a multi-dimensional array: the carrier for token id batches,
//! attention masks, and encoder embeddings. `contrast-rs` only ever deals with
//! two layouts:
//!
//! - **Rank 3**: `[batch, num_candidate_spans, sequence_length]` — a raw batch
//!   of token fields before span sampling.
//! - **Rank 2**: `[batch, embedding_dim]` or `[batch, sequence_length]` — an
//!   embedding batch, or a token field after the span dimension is removed.
//!
//! A `Tensor` is defined by:
//! 1. **Data**: a flat, owned `Vec<T>` (CPU, row-major).
//! 2. **Shape**: an array of dimensions, with the batch dimension first.
//! 3. **Strides**: how to step through the flat data to traverse dimensions.
//!
//! ## Example: Creating and Inspecting a Tensor
//!
//! ```rust
//! use contrast_rs::tensor::Tensor;
//!
//! // A batch of 2 embeddings of dimension 3
//! let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let tensor = Tensor::<f32, 2>::new(data, [2, 3]).unwrap();
//!
//! assert_eq!(tensor.shape(), &[2, 3]);
//! assert_eq!(tensor.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! ```
//!
//! > [!NOTE]
//! > Storage is always contiguous and owned. Operations like
//! > [`Tensor::select_span`] and [`Tensor::cat_rows`] return independent
//! > copies, never aliasing views. The gatherer relies on this: a shard
//! > received from a peer replica can be mutated or dropped without touching
//! > any other replica's data.

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod ops;

/// Error type for Tensor operations.
#[derive(Error, Debug)]
pub enum TensorError {
    /// The shape of the data does not match the expected shape.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// An index is out of bounds for the given shape.
    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },
    /// The requested operation is not supported for this input.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Trait bound for elements that can be stored in a Tensor.
///
/// # Requirements
/// - `Copy + Clone`: contiguous storage in a `Vec<T>` and fast element access.
/// - `Num + ...`: the numeric operations tensor math needs.
/// - `Send + Sync`: required for parallel execution via `rayon` and for
///   shipping raw shard bytes between replica threads.
pub trait TensorElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> TensorElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}

/// The core Tensor struct.
///
/// Represents an N-dimensional array of elements on the CPU.
///
/// # Generics
///
/// - `T`: The element type (must implement [`TensorElem`]).
/// - `RANK`: The number of dimensions (const generic).
///
/// The rank is part of the type, so "the span dimension was removed" is a
/// compile-time fact: span sampling maps `Tensor<T, 3>` to `Tensor<T, 2>`, and
/// a function expecting a sampled batch cannot receive an unsampled one.
/// Dimension *sizes* (batch size, sequence length) stay dynamic, which keeps
/// variable batch sizes free of type-level arithmetic.
#[derive(Clone, Debug)]
pub struct Tensor<T, const RANK: usize>
where
    T: TensorElem,
{
    shape: [usize; RANK],
    strides: [usize; RANK],
    data: Vec<T>,
}

/// Computes row-major strides for a shape.
pub(crate) fn compute_strides<const RANK: usize>(shape: &[usize; RANK]) -> [usize; RANK] {
    let mut strides = [1; RANK];
    for i in (0..RANK.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

impl<T, const RANK: usize> Tensor<T, RANK>
where
    T: TensorElem,
{
    /// Creates a new Tensor from a vector of data and a shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the length of `data` does not
    /// match the product of `shape`.
    pub fn new(data: Vec<T>, shape: [usize; RANK]) -> Result<Self> {
        let size: usize = shape.iter().product();
        if data.len() != size {
            return Err(TensorError::ShapeMismatch {
                expected: vec![size],
                got: vec![data.len()],
            });
        }

        let strides = compute_strides(&shape);
        Ok(Self {
            shape,
            strides,
            data,
        })
    }

    /// Creates a new Tensor filled with zeros.
    pub fn zeros(shape: [usize; RANK]) -> Self {
        let size: usize = shape.iter().product();
        let strides = compute_strides(&shape);
        Self {
            shape,
            strides,
            data: vec![T::zero(); size],
        }
    }

    /// Creates a new Tensor filled with ones.
    pub fn ones(shape: [usize; RANK]) -> Self {
        let size: usize = shape.iter().product();
        let strides = compute_strides(&shape);
        Self {
            shape,
            strides,
            data: vec![T::one(); size],
        }
    }

    /// Returns the flat data slice (row-major).
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns the shape.
    pub fn shape(&self) -> &[usize; RANK] {
        &self.shape
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
