//! Backward-pass engine: reverse topological traversal of the tape.

use super::GraphNode;
use std::collections::HashSet;
use std::rc::Rc;

/// Runs the backward pass from `root`, visiting each node exactly once in
/// reverse topological order. A `None` root (leaf variable) is a no-op.
pub fn backward(root: Option<Rc<dyn GraphNode>>) {
    let Some(root) = root else { return };

    let mut topo = Vec::new();
    let mut visited = HashSet::new();

    // Nodes are identified by their data pointer; `Rc::as_ptr` is stable for
    // the lifetime of the Rc, which is all the traversal needs.
    build_topo(root, &mut topo, &mut visited);

    for node in topo.into_iter().rev() {
        node.backward();
    }
}

fn build_topo(
    node: Rc<dyn GraphNode>,
    topo: &mut Vec<Rc<dyn GraphNode>>,
    visited: &mut HashSet<*const ()>,
) {
    let ptr = Rc::as_ptr(&node) as *const ();
    if visited.contains(&ptr) {
        return;
    }
    visited.insert(ptr);

    for parent in node.parents() {
        build_topo(parent, topo, visited);
    }

    topo.push(node);
}
