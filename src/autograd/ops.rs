//! Operations for the autograd system.
//!
//! Defines the nodes in the computation graph (Add, Mul, and the row-splice
//! used by the cross-replica gatherer) and implements the `backward` pass for
//! each.

use super::{GraphNode, Variable};
use crate::tensor::{Result, Tensor, TensorElem, TensorError};
use std::cell::RefCell;
use std::fmt::Debug;
use std::ops::{Add, Mul};
use std::rc::Rc;

// --- Add Node ---
/// A node representing element-wise addition in the computation graph.
#[derive(Debug)]
struct AddNode<T: TensorElem, const RANK: usize> {
    /// Gradient of the left-hand side operand.
    lhs_grad: Rc<RefCell<Option<Tensor<T, RANK>>>>,
    /// Gradient of the right-hand side operand.
    rhs_grad: Rc<RefCell<Option<Tensor<T, RANK>>>>,
    /// Gradient of the output (received from the node above).
    out_grad: Rc<RefCell<Option<Tensor<T, RANK>>>>,
    /// Parent nodes in the computation graph.
    parents: Vec<Rc<dyn GraphNode>>,
}

impl<T: TensorElem, const RANK: usize> GraphNode for AddNode<T, RANK> {
    fn backward(&self) {
        if let Some(grad) = self.out_grad.borrow().as_ref() {
            // d(x+y)/dx = 1 * grad
            // d(x+y)/dy = 1 * grad

            {
                let mut lhs = self.lhs_grad.borrow_mut();
                if let Some(l) = lhs.as_mut() {
                    *l = (l.add(grad)).unwrap();
                } else {
                    *lhs = Some(grad.clone());
                }
            }

            {
                let mut rhs = self.rhs_grad.borrow_mut();
                if let Some(r) = rhs.as_mut() {
                    *r = (r.add(grad)).unwrap();
                } else {
                    *rhs = Some(grad.clone());
                }
            }
        }
    }

    fn parents(&self) -> Vec<Rc<dyn GraphNode>> {
        self.parents.clone()
    }
}

impl<T: TensorElem + 'static, const RANK: usize> Add for Variable<T, RANK> {
    type Output = Variable<T, RANK>;

    /// Adds two variables element-wise, creating a new graph node.
    fn add(self, rhs: Self) -> Self::Output {
        let data = (&self.data + &rhs.data).unwrap();

        let mut parents = Vec::new();
        if let Some(p) = &self.node {
            parents.push(p.clone());
        }
        if let Some(p) = &rhs.node {
            parents.push(p.clone());
        }

        let out_grad = Rc::new(RefCell::new(None));

        // Leaf operands have no creator node; traversal simply stops there,
        // while their grad cells are still updated through the Rc handles.
        let node = Rc::new(AddNode {
            lhs_grad: self.grad.clone(),
            rhs_grad: rhs.grad.clone(),
            out_grad: out_grad.clone(),
            parents,
        });

        Variable {
            data,
            grad: out_grad,
            node: Some(node),
        }
    }
}

// --- Mul Node ---
/// A node representing element-wise multiplication in the computation graph.
#[derive(Debug)]
struct MulNode<T: TensorElem, const RANK: usize> {
    /// Data of the left-hand side operand (needed for gradient calculation).
    lhs_data: Tensor<T, RANK>,
    /// Data of the right-hand side operand (needed for gradient calculation).
    rhs_data: Tensor<T, RANK>,
    lhs_grad: Rc<RefCell<Option<Tensor<T, RANK>>>>,
    rhs_grad: Rc<RefCell<Option<Tensor<T, RANK>>>>,
    out_grad: Rc<RefCell<Option<Tensor<T, RANK>>>>,
    parents: Vec<Rc<dyn GraphNode>>,
}

impl<T: TensorElem, const RANK: usize> GraphNode for MulNode<T, RANK> {
    fn backward(&self) {
        if let Some(grad) = self.out_grad.borrow().as_ref() {
            // d(x*y)/dx = y * grad
            // d(x*y)/dy = x * grad

            {
                let mut lhs = self.lhs_grad.borrow_mut();
                let dl_dx = (&self.rhs_data * grad).unwrap();
                if let Some(l) = lhs.as_mut() {
                    *l = (l.add(&dl_dx)).unwrap();
                } else {
                    *lhs = Some(dl_dx);
                }
            }

            {
                let mut rhs = self.rhs_grad.borrow_mut();
                let dr_dy = (&self.lhs_data * grad).unwrap();
                if let Some(r) = rhs.as_mut() {
                    *r = (r.add(&dr_dy)).unwrap();
                } else {
                    *rhs = Some(dr_dy);
                }
            }
        }
    }

    fn parents(&self) -> Vec<Rc<dyn GraphNode>> {
        self.parents.clone()
    }
}

impl<T: TensorElem + 'static, const RANK: usize> Mul for Variable<T, RANK> {
    type Output = Variable<T, RANK>;

    /// Multiplies two variables element-wise, creating a new graph node.
    fn mul(self, rhs: Self) -> Self::Output {
        let data = (&self.data * &rhs.data).unwrap();

        let mut parents = Vec::new();
        if let Some(p) = &self.node {
            parents.push(p.clone());
        }
        if let Some(p) = &rhs.node {
            parents.push(p.clone());
        }

        let out_grad = Rc::new(RefCell::new(None));

        let node = Rc::new(MulNode {
            lhs_data: self.data.clone(),
            rhs_data: rhs.data.clone(),
            lhs_grad: self.grad.clone(),
            rhs_grad: rhs.grad.clone(),
            out_grad: out_grad.clone(),
            parents,
        });

        Variable {
            data,
            grad: out_grad,
            node: Some(node),
        }
    }
}

// --- Row Splice Node ---
/// A node representing the concatenation of per-replica shards with the local
/// shard spliced in at its rank position.
///
/// Forward: `out = cat_rows(shards[0], ..., local, ..., shards[W-1])` where
/// `local` replaces `shards[rank]`. Only `local` is differentiable; the peer
/// shards came out of a collective with no history. Backward therefore slices
/// the output gradient at rows `[row_start, row_start + rows)` and accumulates
/// it into the local operand's gradient, the rest of the gradient has no
/// destination on this replica.
#[derive(Debug)]
struct RowSpliceNode<T: TensorElem> {
    /// First output row owned by the local shard (`rank * local_batch`).
    row_start: usize,
    /// Number of rows in the local shard.
    rows: usize,
    /// Gradient cell of the local (differentiable) operand.
    local_grad: Rc<RefCell<Option<Tensor<T, 2>>>>,
    out_grad: Rc<RefCell<Option<Tensor<T, 2>>>>,
    parents: Vec<Rc<dyn GraphNode>>,
}

impl<T: TensorElem> GraphNode for RowSpliceNode<T> {
    fn backward(&self) {
        if let Some(grad) = self.out_grad.borrow().as_ref() {
            let local_slice = grad
                .slice_rows(self.row_start..self.row_start + self.rows)
                .unwrap();

            let mut local = self.local_grad.borrow_mut();
            if let Some(l) = local.as_mut() {
                *l = (l.add(&local_slice)).unwrap();
            } else {
                *local = Some(local_slice);
            }
        }
    }

    fn parents(&self) -> Vec<Rc<dyn GraphNode>> {
        self.parents.clone()
    }
}

/// Concatenates gathered per-rank shards along the batch dimension, splicing
/// the local differentiable `Variable` in at index `rank` in place of the
/// history-less copy the collective returned.
///
/// This is the composition pattern the gatherer is built on: a collective
/// exchange yields read-only peer values; the caller wires its own
/// locally-owned value back in at its own index before concatenation, so the
/// resulting graph carries gradient for exactly the local slice.
///
/// # Errors
///
/// Returns `TensorError::IndexOutOfBounds` if `rank` is not a valid shard
/// index, and `TensorError::ShapeMismatch` if any shard's shape differs from
/// the local tensor's.
pub fn splice_gathered_rows<T: TensorElem + 'static>(
    mut shards: Vec<Tensor<T, 2>>,
    local: &Variable<T, 2>,
    rank: usize,
) -> Result<Variable<T, 2>> {
    if rank >= shards.len() {
        return Err(TensorError::IndexOutOfBounds {
            index: vec![rank],
            shape: vec![shards.len()],
        });
    }
    for shard in &shards {
        if shard.shape() != local.data.shape() {
            return Err(TensorError::ShapeMismatch {
                expected: local.data.shape().to_vec(),
                got: shard.shape().to_vec(),
            });
        }
    }

    shards[rank] = local.data.clone();
    let data = Tensor::cat_rows(&shards)?;

    let [local_rows, _] = *local.data.shape();

    let mut parents = Vec::new();
    if let Some(p) = &local.node {
        parents.push(p.clone());
    }

    let out_grad = Rc::new(RefCell::new(None));
    let node = Rc::new(RowSpliceNode {
        row_start: rank * local_rows,
        rows: local_rows,
        local_grad: local.grad.clone(),
        out_grad: out_grad.clone(),
        parents,
    });

    Ok(Variable {
        data,
        grad: out_grad,
        node: Some(node),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_backward() {
        let a = Variable::new(Tensor::new(vec![2.0], [1]).unwrap());
        let b = Variable::new(Tensor::new(vec![3.0], [1]).unwrap());
        let c = a.clone() + b.clone();

        c.backward();

        assert_eq!(a.grad.borrow().as_ref().unwrap().data()[0], 1.0);
        assert_eq!(b.grad.borrow().as_ref().unwrap().data()[0], 1.0);
    }

    #[test]
    fn test_mul_backward() {
        let a = Variable::new(Tensor::new(vec![2.0], [1]).unwrap());
        let b = Variable::new(Tensor::new(vec![3.0], [1]).unwrap());
        let c = a.clone() * b.clone();

        c.backward();

        assert_eq!(a.grad.borrow().as_ref().unwrap().data()[0], 3.0);
        assert_eq!(b.grad.borrow().as_ref().unwrap().data()[0], 2.0);
    }

    #[test]
    fn test_chain_rule() {
        // y = (a + b) * c with a=2, b=3, c=4
        // dy/da = c = 4, dy/db = c = 4, dy/dc = a + b = 5
        let a = Variable::new(Tensor::new(vec![2.0], [1]).unwrap());
        let b = Variable::new(Tensor::new(vec![3.0], [1]).unwrap());
        let c = Variable::new(Tensor::new(vec![4.0], [1]).unwrap());

        let y = (a.clone() + b.clone()) * c.clone();
        y.backward();

        assert_eq!(a.grad.borrow().as_ref().unwrap().data()[0], 4.0);
        assert_eq!(b.grad.borrow().as_ref().unwrap().data()[0], 4.0);
        assert_eq!(c.grad.borrow().as_ref().unwrap().data()[0], 5.0);
    }

    #[test]
    fn test_add_accumulation() {
        // y = x + x + x, dy/dx = 3
        let x = Variable::new(Tensor::new(vec![3.0], [1]).unwrap());
        let y = x.clone() + x.clone() + x.clone();

        y.backward();

        assert_eq!(x.grad.borrow().as_ref().unwrap().data()[0], 3.0);
    }

    #[test]
    fn test_splice_backward_routes_only_local_rows() {
        // Two shards of shape [2, 2]; local is spliced at rank 1.
        let peer = Tensor::new(vec![10.0, 20.0, 30.0, 40.0], [2, 2]).unwrap();
        let local = Variable::new(Tensor::new(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap());

        let out = splice_gathered_rows(vec![peer.clone(), Tensor::zeros([2, 2])], &local, 1)
            .unwrap();

        assert_eq!(out.data.shape(), &[4, 2]);
        assert_eq!(&out.data.data()[0..4], peer.data());
        assert_eq!(&out.data.data()[4..8], local.data.data());

        // Seed a distinct gradient per row and backprop.
        let seed = Tensor::new(vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0], [4, 2]).unwrap();
        *out.grad.borrow_mut() = Some(seed);
        out.backward();

        // Only rows 2..4 of the output gradient land on the local shard.
        let g = local.grad.borrow();
        assert_eq!(g.as_ref().unwrap().data(), &[3.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_splice_backward_flows_through_upstream_node() {
        // local = x * x, then spliced at rank 0 of a 2-shard world.
        // loss gradient seeded with ones: d/dx over the local rows = 2x.
        let x = Variable::new(Tensor::new(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap());
        let local = x.clone() * x.clone();

        let out = splice_gathered_rows(vec![Tensor::zeros([2, 2]), Tensor::ones([2, 2])], &local, 0)
            .unwrap();
        out.backward();

        let g = x.grad.borrow();
        assert_eq!(g.as_ref().unwrap().data(), &[2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_splice_shape_validation() {
        let local = Variable::new(Tensor::<f32, 2>::zeros([2, 2]));

        let err = splice_gathered_rows(vec![Tensor::zeros([2, 3])], &local, 0);
        assert!(matches!(err, Err(TensorError::ShapeMismatch { .. })));

        let err = splice_gathered_rows(vec![Tensor::zeros([2, 2])], &local, 1);
        assert!(matches!(err, Err(TensorError::IndexOutOfBounds { .. })));
    }
}
