//! Automatic Differentiation (Autograd) module.
//!
//! # Why the gatherer needs a tape
//!
//! The cross-replica gatherer's whole job is to return tensors that still
//! backpropagate into the local encoder. That makes "gradient history" a
//! first-class object in this crate: a [`Variable`] wraps a
//! [`Tensor`](crate::tensor::Tensor) together with a gradient cell and a link
//! to the operation that produced it.
//!
//! `contrast-rs` implements **Reverse-Mode AD** with a tape formed implicitly
//! by `Rc<dyn GraphNode>` links between variables (define-by-run):
//!
//! 1. **Forward pass**: operations on `Variable`s build a DAG of graph nodes.
//! 2. **Backward pass**: `.backward()` traverses the DAG in reverse
//!    topological order, applying the chain rule at each node.
//!
//! # Example: Simple Gradient Computation
//!
//! Derivative of $f(x) = x^2$ at $x = 3$ is $2x = 6$.
//!
//! ```rust
//! use contrast_rs::tensor::Tensor;
//! use contrast_rs::autograd::Variable;
//!
//! let x = Variable::new(Tensor::new(vec![3.0], [1]).unwrap());
//! let y = x.clone() * x.clone();
//! y.backward();
//!
//! let grad = x.grad.borrow();
//! assert_eq!(grad.as_ref().unwrap().data()[0], 6.0);
//! ```
//!
//! The op set is deliberately small: element-wise `Add`/`Mul` (enough to build
//! a differentiable loss downstream of the gatherer) and
//! [`ops::splice_gathered_rows`], the one operation the gatherer is built on.

use crate::tensor::{Tensor, TensorElem};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

pub mod engine;
pub mod ops;

/// A node in the computation graph.
///
/// This trait represents an operation that can be backpropagated through.
pub trait GraphNode: Debug {
    /// Computes the gradient for this node and propagates it to its parents.
    fn backward(&self);
    /// Returns the parent nodes of this node.
    fn parents(&self) -> Vec<Rc<dyn GraphNode>>;
}

/// A variable in the computation graph.
///
/// Wraps a `Tensor` and tracks its gradient and the operation that created it.
/// Cloning a `Variable` is cheap and shares the gradient cell: the gatherer's
/// no-op path returns its inputs with their `Rc` cells untouched, which is what
/// "gradient history preserved exactly" means here.
#[derive(Clone, Debug)]
pub struct Variable<T, const RANK: usize>
where
    T: TensorElem,
{
    /// The actual tensor data.
    pub data: Tensor<T, RANK>,
    /// The gradient of the loss with respect to this variable.
    pub grad: Rc<RefCell<Option<Tensor<T, RANK>>>>,
    /// The node in the computation graph that produced this variable.
    pub node: Option<Rc<dyn GraphNode>>,
}

impl<T, const RANK: usize> Variable<T, RANK>
where
    T: TensorElem + 'static,
{
    /// Creates a new leaf variable.
    ///
    /// Leaf variables are the inputs to the computation graph (e.g., the
    /// embeddings an external encoder produced). They have no parent node.
    pub fn new(data: Tensor<T, RANK>) -> Self {
        Self {
            data,
            grad: Rc::new(RefCell::new(None)),
            node: None,
        }
    }

    /// Creates a new variable with an associated graph node.
    ///
    /// Used internally by operations to create output variables.
    pub fn with_node(data: Tensor<T, RANK>, node: Rc<dyn GraphNode>) -> Self {
        Self {
            data,
            grad: Rc::new(RefCell::new(None)),
            node: Some(node),
        }
    }

    /// Triggers the backward pass starting from this variable.
    ///
    /// If no gradient has been seeded yet, seeds it with ones (the usual
    /// starting point when this variable is the loss).
    pub fn backward(&self) {
        if self.grad.borrow().is_none() {
            *self.grad.borrow_mut() = Some(Tensor::ones(*self.data.shape()));
        }

        engine::backward(self.node.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_creation() {
        let data = Tensor::new(vec![1.0, 2.0], [2]).unwrap();
        let var = Variable::new(data.clone());

        assert_eq!(var.data.data(), data.data());
        assert!(var.grad.borrow().is_none());
        assert!(var.node.is_none());
    }

    #[test]
    fn test_variable_backward_seed() {
        let var = Variable::new(Tensor::new(vec![1.0], [1]).unwrap());

        // Backward on a leaf just seeds the gradient.
        var.backward();

        assert!(var.grad.borrow().is_some());
        assert_eq!(var.grad.borrow().as_ref().unwrap().data()[0], 1.0);
    }

    #[test]
    fn test_clone_shares_grad_cell() {
        let var = Variable::new(Tensor::<f32, 1>::zeros([2]));
        let alias = var.clone();
        assert!(Rc::ptr_eq(&var.grad, &alias.grad));
    }
}
