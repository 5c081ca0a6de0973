//! Breadth-first stage traversal.
//!
//! Stage classification walks the dataflow graph backward from a stage root,
//! collecting every tensor that belongs to the stage and stopping at stage
//! boundaries (placeholders, or tensors tagged for a different stage). The
//! graph is a DAG, not a tree: a tensor reachable through several paths must
//! appear exactly once, so visited-tracking goes through tensor identity.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::tensor::{Tensor, TensorKey};

/// Collect the sub-tensors of one stage, rooted at `root`.
///
/// Traverses input (producer) edges breadth-first starting from `root`'s
/// inputs. A tensor is recorded and expanded the first time it is seen,
/// unless `stop` returns true for it — stopped tensors are neither recorded
/// nor descended into. `root` itself is never part of the result.
///
/// Runs in O(V + E) over the reachable subgraph. An empty result is valid:
/// a stage whose root reads only placeholders has no intermediate tensors.
pub fn crawl<F>(root: &Arc<Tensor>, mut stop: F) -> HashMap<String, Arc<Tensor>>
where
    F: FnMut(&Arc<Tensor>) -> bool,
{
    let mut found = HashMap::new();
    let mut visited: HashSet<TensorKey> = HashSet::new();
    visited.insert(TensorKey(Arc::clone(root)));

    let mut queue: VecDeque<Arc<Tensor>> = root.inputs().iter().cloned().collect();
    while let Some(tensor) = queue.pop_front() {
        if !visited.insert(TensorKey(Arc::clone(&tensor))) {
            continue;
        }
        if stop(&tensor) {
            continue;
        }
        for input in tensor.inputs() {
            queue.push_back(Arc::clone(input));
        }
        found.insert(tensor.name().to_owned(), tensor);
    }

    found
}
