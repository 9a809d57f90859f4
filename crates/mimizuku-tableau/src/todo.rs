//! 展開規則の待ち行列 (to-do list)

use crate::graph::{LabelKind, NodeId};
use mimizuku_core::DagVertex;

/// Number of priority buckets; lower index is served first.
pub const N_PRIORITIES: usize = 7;

/// Expansion priority of a label entry, derived from the vertex tag and the
/// pointer sign. Nominals and datatypes come first, generating rules before
/// propagating ones, branching last.
pub fn priority(vertex: &DagVertex, positive: bool) -> usize {
    match vertex {
        DagVertex::Nominal { .. } => 0,
        DagVertex::DataType { .. } | DagVertex::DataValue { .. } => 1,
        DagVertex::Top | DagVertex::CName { .. } | DagVertex::Collection { .. } => 2,
        DagVertex::And { .. } => {
            if positive {
                2
            } else {
                6 // disjunction
            }
        }
        DagVertex::Forall { .. } => {
            if positive {
                4
            } else {
                3 // existential
            }
        }
        DagVertex::AtMost { .. } => {
            if positive {
                5
            } else {
                3 // at-least is generating
            }
        }
        DagVertex::Choose { .. } => 6,
    }
}

/// A queued expansion: a label entry addressed by node, list and offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToDoEntry {
    pub node: NodeId,
    pub kind: LabelKind,
    pub offset: usize,
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    entries: Vec<ToDoEntry>,
    head: usize,
}

#[derive(Debug, Clone, Copy)]
struct BucketSnap {
    head: usize,
    len: usize,
}

/// Multi-bucket FIFO. `save`/`restore` record and truncate `(head, len)`
/// per bucket, in step with the completion graph snapshots.
#[derive(Debug, Clone, Default)]
pub struct ToDoList {
    buckets: [Bucket; N_PRIORITIES],
    snapshots: Vec<[BucketSnap; N_PRIORITIES]>,
}

impl ToDoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        for b in &mut self.buckets {
            b.entries.clear();
            b.head = 0;
        }
        self.snapshots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.head >= b.entries.len())
    }

    pub fn add(&mut self, entry: ToDoEntry, priority: usize) {
        self.buckets[priority].entries.push(entry);
    }

    /// Head of the highest-priority non-empty bucket.
    pub fn next(&mut self) -> Option<ToDoEntry> {
        for b in &mut self.buckets {
            if b.head < b.entries.len() {
                let e = b.entries[b.head];
                b.head += 1;
                return Some(e);
            }
        }
        None
    }

    pub fn save(&mut self) -> usize {
        let snap = std::array::from_fn(|i| BucketSnap {
            head: self.buckets[i].head,
            len: self.buckets[i].entries.len(),
        });
        self.snapshots.push(snap);
        self.snapshots.len() - 1
    }

    pub fn restore(&mut self, index: usize) {
        debug_assert!(index < self.snapshots.len());
        self.snapshots.truncate(index + 1);
        let snap = self.snapshots[index];
        for (b, s) in self.buckets.iter_mut().zip(snap.iter()) {
            b.entries.truncate(s.len);
            b.head = s.head;
        }
    }

    pub fn pop_snapshot(&mut self) {
        self.snapshots.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(node: NodeId) -> ToDoEntry {
        ToDoEntry {
            node,
            kind: LabelKind::Simple,
            offset: 0,
        }
    }

    #[test]
    fn test_priority_order() {
        let mut todo = ToDoList::new();
        todo.add(entry(1), 4);
        todo.add(entry(2), 0);
        todo.add(entry(3), 4);
        assert_eq!(todo.next().unwrap().node, 2);
        assert_eq!(todo.next().unwrap().node, 1);
        assert_eq!(todo.next().unwrap().node, 3);
        assert!(todo.next().is_none());
    }

    #[test]
    fn test_fifo_within_bucket() {
        let mut todo = ToDoList::new();
        for n in 0..4 {
            todo.add(entry(n), 3);
        }
        for n in 0..4 {
            assert_eq!(todo.next().unwrap().node, n);
        }
    }

    #[test]
    fn test_save_restore_rewinds_consumption() {
        let mut todo = ToDoList::new();
        todo.add(entry(1), 2);
        let s = todo.save();
        todo.add(entry(2), 2);
        assert_eq!(todo.next().unwrap().node, 1);
        assert_eq!(todo.next().unwrap().node, 2);
        assert!(todo.is_empty());
        todo.restore(s);
        assert!(!todo.is_empty());
        assert_eq!(todo.next().unwrap().node, 1);
        assert!(todo.is_empty());
    }

    #[test]
    fn test_generating_before_propagating() {
        use mimizuku_core::{ConceptId, Dag, DagVertex, RoleId};
        let mut dag = Dag::new();
        let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
        let all = dag.forall(RoleId(0), 0, a);
        let some = dag.exists(RoleId(0), a);
        let p_all = priority(dag.get(all), all.is_positive());
        let p_some = priority(dag.get(some), some.is_positive());
        assert!(p_some < p_all);
    }
}
