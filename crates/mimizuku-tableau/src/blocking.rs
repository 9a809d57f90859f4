//! 停止性を保証するブロッキング

use crate::graph::{CompletionGraph, NodeId};
use mimizuku_core::Bp;
use std::collections::BTreeSet;

/// How blocker candidates are searched and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingConfig {
    /// Candidates anywhere earlier in the graph, or ancestors only.
    /// Downgraded to ancestors when fairness constraints are present.
    pub anywhere: bool,
    /// Pairwise label equality instead of subset. Subset blocking is only
    /// sound for logics without inverses and number restrictions.
    pub equality: bool,
}

fn label_set(graph: &CompletionGraph, node: NodeId) -> BTreeSet<Bp> {
    graph.node(node).label_iter().map(|e| e.bp).collect()
}

fn labels_admit_block(
    graph: &CompletionGraph,
    node: NodeId,
    witness: NodeId,
    cfg: BlockingConfig,
) -> bool {
    let node_label = label_set(graph, node);
    let witness_label = label_set(graph, witness);
    if cfg.equality {
        node_label == witness_label
    } else {
        node_label.is_subset(&witness_label)
    }
}

fn admits_witness(graph: &CompletionGraph, cand: NodeId) -> bool {
    let c = graph.node(cand);
    !c.is_nominal && !c.is_data && c.blocked_by.is_none() && c.merged_to.is_none()
}

/// Find a witness that blocks `node`, if any.
///
/// Only blockable nodes get blocked; the witness may be any older
/// non-nominal node (the root included), itself unblocked and unmerged,
/// whose label subsumes (or equals) the node's label.
pub fn find_blocker(graph: &CompletionGraph, node: NodeId, cfg: BlockingConfig) -> Option<NodeId> {
    if !graph.node(node).is_blockable() {
        return None;
    }
    if cfg.anywhere {
        (0..node).find(|&cand| {
            admits_witness(graph, cand) && labels_admit_block(graph, node, cand, cfg)
        })
    } else {
        graph.ancestors(node).into_iter().find(|&cand| {
            admits_witness(graph, cand) && labels_admit_block(graph, node, cand, cfg)
        })
    }
}

/// Re-evaluate the blocked status of every node; returns the nodes whose
/// deferred expansions must be re-enqueued because they became unblocked.
pub fn retest_blocked(graph: &mut CompletionGraph, cfg: BlockingConfig) -> Vec<NodeId> {
    let mut unblocked = Vec::new();
    for id in 0..graph.node_count() {
        if graph.node(id).merged_to.is_some() {
            continue;
        }
        let was = graph.node(id).blocked_by;
        let now = find_blocker(graph, id, cfg);
        graph.node_mut(id).blocked_by = now;
        if was.is_some() && now.is_none() {
            unblocked.push(id);
        }
    }
    unblocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LabelKind;
    use mimizuku_core::DepSet;
    use mimizuku_rbox::RoleBox;

    fn chain_of_three() -> (CompletionGraph, NodeId, NodeId, NodeId) {
        let mut rbox = RoleBox::new();
        let r = rbox.ensure_role("R", false).unwrap();
        rbox.close();
        let mut g = CompletionGraph::new();
        let root = g.init_node(false, 0);
        let (a, _) = g.new_successor(root, r, DepSet::empty(), false, 0);
        let (b, _) = g.new_successor(a, r, DepSet::empty(), false, 0);
        (g, root, a, b)
    }

    #[test]
    fn test_subset_blocking_finds_ancestor_witness() {
        let (mut g, _root, a, b) = chain_of_three();
        let bp = Bp::new(2, true);
        g.add_concept(a, bp, DepSet::empty(), LabelKind::Simple);
        g.add_concept(a, Bp::new(3, true), DepSet::empty(), LabelKind::Simple);
        g.add_concept(b, bp, DepSet::empty(), LabelKind::Simple);
        let cfg = BlockingConfig { anywhere: false, equality: false };
        assert_eq!(find_blocker(&g, b, cfg), Some(a));
    }

    #[test]
    fn test_equality_blocking_rejects_proper_subset() {
        let (mut g, _root, a, b) = chain_of_three();
        let bp = Bp::new(2, true);
        g.add_concept(a, bp, DepSet::empty(), LabelKind::Simple);
        g.add_concept(a, Bp::new(3, true), DepSet::empty(), LabelKind::Simple);
        g.add_concept(b, bp, DepSet::empty(), LabelKind::Simple);
        let cfg = BlockingConfig { anywhere: false, equality: true };
        assert_eq!(find_blocker(&g, b, cfg), None);
        g.add_concept(b, Bp::new(3, true), DepSet::empty(), LabelKind::Simple);
        assert_eq!(find_blocker(&g, b, cfg), Some(a));
    }

    #[test]
    fn test_root_is_never_blocked() {
        let (g, root, _a, _b) = chain_of_three();
        let cfg = BlockingConfig { anywhere: true, equality: false };
        assert_eq!(find_blocker(&g, root, cfg), None);
    }

    #[test]
    fn test_anywhere_blocking_sees_non_ancestors() {
        let mut rbox = RoleBox::new();
        let r = rbox.ensure_role("R", false).unwrap();
        rbox.close();
        let mut g = CompletionGraph::new();
        let root = g.init_node(false, 0);
        let (a, _) = g.new_successor(root, r, DepSet::empty(), false, 0);
        let (b, _) = g.new_successor(root, r, DepSet::empty(), false, 0);
        let bp = Bp::new(2, true);
        g.add_concept(a, bp, DepSet::empty(), LabelKind::Simple);
        g.add_concept(b, bp, DepSet::empty(), LabelKind::Simple);

        let ancestor_only = BlockingConfig { anywhere: false, equality: false };
        assert_eq!(find_blocker(&g, b, ancestor_only), None);
        let anywhere = BlockingConfig { anywhere: true, equality: false };
        assert_eq!(find_blocker(&g, b, anywhere), Some(a));
    }

    #[test]
    fn test_retest_reports_unblocked_nodes() {
        let (mut g, _root, a, b) = chain_of_three();
        let bp = Bp::new(2, true);
        g.add_concept(a, bp, DepSet::empty(), LabelKind::Simple);
        g.add_concept(b, bp, DepSet::empty(), LabelKind::Simple);
        let cfg = BlockingConfig { anywhere: false, equality: false };
        assert!(retest_blocked(&mut g, cfg).is_empty());
        assert_eq!(g.node(b).blocked_by, Some(a));

        // the node outgrows its witness
        g.add_concept(b, Bp::new(3, true), DepSet::empty(), LabelKind::Simple);
        let unblocked = retest_blocked(&mut g, cfg);
        assert_eq!(unblocked, vec![b]);
        assert_eq!(g.node(b).blocked_by, None);
    }
}
