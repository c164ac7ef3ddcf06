//! Node selection strategies for transfer and auto-recovery.
//!
//! The resource manager asks a [`NodeSelector`] which members of a source
//! group should move. Balancing heuristics plug in here; the manager only
//! executes the moves.

use nodepool_state::NodeId;

/// Chooses up to `count` nodes out of `candidates`.
///
/// `candidates` are the source group's live members in ascending id order.
/// Returned ids that are not candidates are ignored by the caller.
pub trait NodeSelector: Send + Sync {
    fn select(&self, candidates: &[NodeId], count: usize) -> Vec<NodeId>;
}

/// Takes candidates in order, with no cost model.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstNodes;

impl NodeSelector for FirstNodes {
    fn select(&self, candidates: &[NodeId], count: usize) -> Vec<NodeId> {
        candidates.iter().take(count).copied().collect()
    }
}

impl<F> NodeSelector for F
where
    F: Fn(&[NodeId], usize) -> Vec<NodeId> + Send + Sync,
{
    fn select(&self, candidates: &[NodeId], count: usize) -> Vec<NodeId> {
        self(candidates, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_nodes_takes_prefix() {
        assert_eq!(FirstNodes.select(&[1, 2, 3], 2), vec![1, 2]);
        assert_eq!(FirstNodes.select(&[1], 4), vec![1]);
        assert!(FirstNodes.select(&[], 1).is_empty());
    }

    #[test]
    fn closures_are_selectors() {
        let last = |candidates: &[NodeId], count: usize| -> Vec<NodeId> {
            candidates.iter().rev().take(count).copied().collect()
        };
        assert_eq!(last.select(&[1, 2, 3], 1), vec![3]);
    }
}
