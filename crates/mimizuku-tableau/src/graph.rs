//! 完成グラフ (completion graph)

use mimizuku_core::{Bp, DepSet, RoleId};
use mimizuku_rbox::RoleBox;

pub type NodeId = usize;
pub type EdgeId = usize;

/// A label entry: a concept pointer with the branching levels it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptWDep {
    pub bp: Bp,
    pub dep: DepSet,
}

/// Which of the two label lists an entry lives in. Simple entries are
/// leaves (names, nominals, data); complex entries drive expansion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Simple,
    Complex,
}

/// Outcome of a label insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddResult {
    Added(usize),
    AlreadyPresent,
    /// The negation is present; the set is the union of both entries' deps.
    Clash(DepSet),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Tree parent for nodes created by the generating rules.
    pub parent: Option<NodeId>,
    pub is_nominal: bool,
    pub is_data: bool,
    pub simple: Vec<ConceptWDep>,
    pub complex: Vec<ConceptWDep>,
    /// Outgoing edges. Every logical edge exists as an inverse pair, so
    /// incoming edges are the twins of some neighbour's outgoing ones.
    pub succ: Vec<EdgeId>,
    /// Incoming edges (twins of entries in some `succ` list).
    pub pred: Vec<EdgeId>,
    pub cached: bool,
    pub blocked_by: Option<NodeId>,
    pub merged_to: Option<NodeId>,
    /// Branching level at which the node was created.
    pub init_level: u32,
}

impl Node {
    pub fn label(&self, kind: LabelKind) -> &[ConceptWDep] {
        match kind {
            LabelKind::Simple => &self.simple,
            LabelKind::Complex => &self.complex,
        }
    }

    /// All label entries, simple first.
    pub fn label_iter(&self) -> impl Iterator<Item = &ConceptWDep> {
        self.simple.iter().chain(self.complex.iter())
    }

    pub fn label_contains(&self, bp: Bp) -> bool {
        self.label_iter().any(|e| e.bp == bp)
    }

    pub fn label_dep(&self, bp: Bp) -> Option<&DepSet> {
        self.label_iter().find(|e| e.bp == bp).map(|e| &e.dep)
    }

    /// Blockable nodes are the blank tree nodes the generating rules create.
    pub fn is_blockable(&self) -> bool {
        !self.is_nominal && !self.is_data && self.parent.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub role: RoleId,
    pub dep: DepSet,
    /// Set on the half of the pair that points back toward the creator.
    pub is_pred: bool,
    pub twin: EdgeId,
}

#[derive(Debug, Clone)]
struct NodeSnap {
    n_simple: usize,
    n_complex: usize,
    n_succ: usize,
    n_pred: usize,
    cached: bool,
    blocked_by: Option<NodeId>,
    merged_to: Option<NodeId>,
}

/// One `save()` delta: global counts plus per-node list sizes.
#[derive(Debug, Clone)]
struct Snapshot {
    n_nodes: usize,
    n_edges: usize,
    n_distinct: usize,
    nodes: Vec<NodeSnap>,
}

/// The labelled graph of individuals a satisfiability session builds.
///
/// Arena-allocated, indices are stable. Within one branching level the
/// structure only grows; `restore` truncates back to a `save` point
/// (monotone-until-restore).
#[derive(Debug, Clone, Default)]
pub struct CompletionGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Inequality constraints `x ≠ y` with the deps they rest on.
    distinct: Vec<(NodeId, NodeId, DepSet)>,
    snapshots: Vec<Snapshot>,
    n_node_saves: usize,
    n_node_restores: usize,
}

impl CompletionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.distinct.clear();
        self.snapshots.clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Follow the merge chain to the surviving node.
    pub fn resolve(&self, mut id: NodeId) -> NodeId {
        while let Some(next) = self.nodes[id].merged_to {
            id = next;
        }
        id
    }

    pub fn is_merged(&self, id: NodeId) -> bool {
        self.nodes[id].merged_to.is_some()
    }

    /// Create a root-level node (query root or nominal root).
    pub fn init_node(&mut self, is_nominal: bool, level: u32) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            parent: None,
            is_nominal,
            is_data: false,
            simple: Vec::new(),
            complex: Vec::new(),
            succ: Vec::new(),
            pred: Vec::new(),
            cached: false,
            blocked_by: None,
            merged_to: None,
            init_level: level,
        });
        id
    }

    /// Create a fresh successor together with the inverse-paired edges.
    pub fn new_successor(
        &mut self,
        parent: NodeId,
        role: RoleId,
        dep: DepSet,
        is_data: bool,
        level: u32,
    ) -> (NodeId, EdgeId) {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            is_nominal: false,
            is_data,
            simple: Vec::new(),
            complex: Vec::new(),
            succ: Vec::new(),
            pred: Vec::new(),
            cached: false,
            blocked_by: None,
            merged_to: None,
            init_level: level,
        });
        let e = self.add_edge(parent, id, role, dep);
        (id, e)
    }

    /// Install the inverse pair `(from,to,R)` / `(to,from,R⁻)` with one
    /// shared DepSet; both halves are restored together.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, role: RoleId, dep: DepSet) -> EdgeId {
        let e1 = self.edges.len();
        let e2 = e1 + 1;
        self.edges.push(Edge {
            from,
            to,
            role,
            dep: dep.clone(),
            is_pred: false,
            twin: e2,
        });
        self.edges.push(Edge {
            from: to,
            to: from,
            role: RoleBox::inverse(role),
            dep,
            is_pred: true,
            twin: e1,
        });
        self.nodes[from].succ.push(e1);
        self.nodes[to].pred.push(e1);
        self.nodes[to].succ.push(e2);
        self.nodes[from].pred.push(e2);
        e1
    }

    /// Append a concept to a node label; detects duplicates and clashes
    /// against the negated entry.
    pub fn add_concept(
        &mut self,
        node: NodeId,
        bp: Bp,
        dep: DepSet,
        kind: LabelKind,
    ) -> AddResult {
        let inv = bp.inverse();
        let list = match kind {
            LabelKind::Simple => &self.nodes[node].simple,
            LabelKind::Complex => &self.nodes[node].complex,
        };
        for entry in list {
            if entry.bp == bp {
                return AddResult::AlreadyPresent;
            }
            if entry.bp == inv {
                return AddResult::Clash(entry.dep.unioned(&dep));
            }
        }
        let list = match kind {
            LabelKind::Simple => &mut self.nodes[node].simple,
            LabelKind::Complex => &mut self.nodes[node].complex,
        };
        list.push(ConceptWDep { bp, dep });
        AddResult::Added(list.len() - 1)
    }

    pub fn add_distinct(&mut self, a: NodeId, b: NodeId, dep: DepSet) {
        self.distinct.push((a, b, dep));
    }

    /// Inequality between the nodes (up to merging), with its DepSet.
    pub fn are_distinct(&self, a: NodeId, b: NodeId) -> Option<&DepSet> {
        let (ra, rb) = (self.resolve(a), self.resolve(b));
        self.distinct.iter().find_map(|(x, y, dep)| {
            let (rx, ry) = (self.resolve(*x), self.resolve(*y));
            if (rx == ra && ry == rb) || (rx == rb && ry == ra) {
                Some(dep)
            } else {
                None
            }
        })
    }

    /// Ancestor chain of a node, nearest first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.nodes[node].parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self.nodes[p].parent;
        }
        out
    }

    // ---- save / restore ------------------------------------------------

    /// Push a delta header; returns the snapshot index.
    pub fn save(&mut self) -> usize {
        let snap = Snapshot {
            n_nodes: self.nodes.len(),
            n_edges: self.edges.len(),
            n_distinct: self.distinct.len(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSnap {
                    n_simple: n.simple.len(),
                    n_complex: n.complex.len(),
                    n_succ: n.succ.len(),
                    n_pred: n.pred.len(),
                    cached: n.cached,
                    blocked_by: n.blocked_by,
                    merged_to: n.merged_to,
                })
                .collect(),
        };
        self.snapshots.push(snap);
        self.n_node_saves += 1;
        self.snapshots.len() - 1
    }

    /// Truncate back to snapshot `index`, which stays on the stack so the
    /// level can try its next option.
    pub fn restore(&mut self, index: usize) {
        debug_assert!(index < self.snapshots.len());
        self.snapshots.truncate(index + 1);
        let snap = self.snapshots[index].clone();
        self.nodes.truncate(snap.n_nodes);
        self.edges.truncate(snap.n_edges);
        self.distinct.truncate(snap.n_distinct);
        for (node, ns) in self.nodes.iter_mut().zip(snap.nodes.iter()) {
            node.simple.truncate(ns.n_simple);
            node.complex.truncate(ns.n_complex);
            node.succ.truncate(ns.n_succ);
            node.pred.truncate(ns.n_pred);
            node.cached = ns.cached;
            node.blocked_by = ns.blocked_by;
            node.merged_to = ns.merged_to;
        }
        self.n_node_restores += 1;
    }

    /// Drop the top snapshot without touching the graph (its level is done).
    pub fn pop_snapshot(&mut self) {
        self.snapshots.pop();
    }

    pub fn snapshot_depth(&self) -> usize {
        self.snapshots.len()
    }

    pub fn save_count(&self) -> usize {
        self.n_node_saves
    }

    pub fn restore_count(&self) -> usize {
        self.n_node_restores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimizuku_rbox::RoleBox;

    fn two_roles() -> (RoleBox, RoleId) {
        let mut rbox = RoleBox::new();
        let r = rbox.ensure_role("R", false).unwrap();
        rbox.close();
        (rbox, r)
    }

    mod label_tests {
        use super::*;

        #[test]
        fn test_add_concept_detects_duplicate() {
            let mut g = CompletionGraph::new();
            let n = g.init_node(false, 0);
            let bp = Bp::new(2, true);
            assert_eq!(g.add_concept(n, bp, DepSet::empty(), LabelKind::Simple), AddResult::Added(0));
            assert_eq!(
                g.add_concept(n, bp, DepSet::from_level(1), LabelKind::Simple),
                AddResult::AlreadyPresent
            );
        }

        #[test]
        fn test_add_concept_detects_clash_with_union_dep() {
            let mut g = CompletionGraph::new();
            let n = g.init_node(false, 0);
            let bp = Bp::new(2, true);
            g.add_concept(n, bp, DepSet::from_level(1), LabelKind::Simple);
            match g.add_concept(n, bp.inverse(), DepSet::from_level(2), LabelKind::Simple) {
                AddResult::Clash(dep) => {
                    assert_eq!(dep.iter().collect::<Vec<_>>(), vec![1, 2]);
                }
                r => panic!("expected clash, got {:?}", r),
            }
        }
    }

    mod edge_tests {
        use super::*;

        #[test]
        fn test_edges_come_in_inverse_pairs() {
            let (_rbox, r) = two_roles();
            let mut g = CompletionGraph::new();
            let a = g.init_node(false, 0);
            let (b, e) = g.new_successor(a, r, DepSet::from_level(1), false, 1);
            let edge = g.edge(e).clone();
            let twin = g.edge(edge.twin).clone();
            assert_eq!(edge.from, a);
            assert_eq!(edge.to, b);
            assert_eq!(twin.from, b);
            assert_eq!(twin.to, a);
            assert_eq!(twin.role, RoleBox::inverse(r));
            assert_eq!(edge.dep, twin.dep);
            assert!(twin.is_pred);
            assert!(!edge.is_pred);
        }
    }

    mod save_restore_tests {
        use super::*;

        #[test]
        fn test_save_restore_is_idempotent_when_nothing_changed() {
            let (_rbox, r) = two_roles();
            let mut g = CompletionGraph::new();
            let a = g.init_node(false, 0);
            g.new_successor(a, r, DepSet::empty(), false, 0);
            let before_nodes = g.node_count();
            let before_edges = g.edge_count();
            let s = g.save();
            g.restore(s);
            assert_eq!(g.node_count(), before_nodes);
            assert_eq!(g.edge_count(), before_edges);
        }

        #[test]
        fn test_restore_truncates_labels_and_structure() {
            let (_rbox, r) = two_roles();
            let mut g = CompletionGraph::new();
            let a = g.init_node(false, 0);
            let bp = Bp::new(2, true);
            g.add_concept(a, bp, DepSet::empty(), LabelKind::Simple);
            let s = g.save();

            g.add_concept(a, Bp::new(3, true), DepSet::from_level(1), LabelKind::Simple);
            let (b, _) = g.new_successor(a, r, DepSet::from_level(1), false, 1);
            g.add_distinct(a, b, DepSet::from_level(1));
            g.restore(s);

            assert_eq!(g.node(a).simple.len(), 1);
            assert_eq!(g.node_count(), 1);
            assert_eq!(g.edge_count(), 0);
            assert!(g.are_distinct(a, 0).is_none());
        }

        #[test]
        fn test_restore_removes_paired_edges_together() {
            let (_rbox, r) = two_roles();
            let mut g = CompletionGraph::new();
            let a = g.init_node(false, 0);
            let s = g.save();
            g.new_successor(a, r, DepSet::from_level(1), false, 1);
            assert_eq!(g.edge_count(), 2);
            g.restore(s);
            assert_eq!(g.edge_count(), 0);
            assert!(g.node(a).succ.is_empty());
            assert!(g.node(a).pred.is_empty());
        }

        #[test]
        fn test_restore_resets_merge_marks() {
            let (_rbox, _r) = two_roles();
            let mut g = CompletionGraph::new();
            let a = g.init_node(true, 0);
            let b = g.init_node(true, 0);
            let s = g.save();
            g.node_mut(b).merged_to = Some(a);
            assert_eq!(g.resolve(b), a);
            g.restore(s);
            assert_eq!(g.resolve(b), b);
        }
    }

    mod distinct_tests {
        use super::*;

        #[test]
        fn test_distinct_follows_merge_chain() {
            let mut g = CompletionGraph::new();
            let a = g.init_node(true, 0);
            let b = g.init_node(true, 0);
            let c = g.init_node(true, 0);
            g.add_distinct(a, b, DepSet::empty());
            g.node_mut(c).merged_to = Some(b);
            assert!(g.are_distinct(a, c).is_some());
        }
    }
}
