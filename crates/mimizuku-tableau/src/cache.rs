//! モデルキャッシュ (per-concept cached witness models)

use crate::graph::{CompletionGraph, NodeId};
use crate::tbox::Tbox;
use mimizuku_core::{Bp, DagVertex, DepSet};
use mimizuku_rbox::RoleBox;
use std::collections::{BTreeSet, HashMap};

/// Coarse state of a cached model or of a merge attempt.
///
/// `Failed` means the fast check could not decide; it folds into `Unknown`
/// at the query boundary and the engine falls back to full expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Valid,
    Invalid,
    Failed,
    Unknown,
}

/// Set-based cache of one witness model root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IanCache {
    /// Named concepts occurring positively with an empty DepSet.
    pub pos_det: BTreeSet<u32>,
    /// Named concepts occurring positively under branching choices.
    pub pos_nondet: BTreeSet<u32>,
    pub neg_det: BTreeSet<u32>,
    pub neg_nondet: BTreeSet<u32>,
    /// Role indices of outgoing edges (with their ancestors).
    pub exists_roles: BTreeSet<u32>,
    /// Role indices constrained by `∀` entries (with automaton labels).
    pub forall_roles: BTreeSet<u32>,
    /// Role indices bounded by `≤`/functional entries.
    pub func_roles: BTreeSet<u32>,
    pub has_nominal: bool,
}

impl IanCache {
    /// Build the cache of a completed node from its label and arcs.
    pub fn from_node(graph: &CompletionGraph, node: NodeId, tbox: &Tbox) -> Self {
        let mut cache = IanCache::default();
        let n = graph.node(node);
        for entry in n.label_iter() {
            cache.process_entry(entry.bp, entry.dep.is_empty(), tbox);
        }
        for &e in &n.succ {
            let edge = graph.edge(e);
            cache.add_exists_role(edge.role, &tbox.rbox);
        }
        cache
    }

    fn process_entry(&mut self, bp: Bp, det: bool, tbox: &Tbox) {
        let pos = bp.is_positive();
        match tbox.dag.get(bp) {
            DagVertex::CName { concept } => {
                let set = match (pos, det) {
                    (true, true) => &mut self.pos_det,
                    (true, false) => &mut self.pos_nondet,
                    (false, true) => &mut self.neg_det,
                    (false, false) => &mut self.neg_nondet,
                };
                set.insert(concept.0);
            }
            DagVertex::Nominal { .. } => {
                self.has_nominal = true;
            }
            DagVertex::Forall { role, .. } => {
                if pos {
                    self.forall_roles.insert(role.0);
                } else {
                    // an unexpanded ∃; count the role as existential
                    self.exists_roles.insert(role.0);
                }
            }
            DagVertex::AtMost { role, .. } => {
                if pos {
                    self.func_roles.insert(role.0);
                } else {
                    self.exists_roles.insert(role.0);
                }
            }
            _ => {}
        }
    }

    /// Record an outgoing edge role together with its ancestors; a
    /// functional ancestor also lands in the functional set.
    pub fn add_exists_role(&mut self, role: mimizuku_core::RoleId, rbox: &RoleBox) {
        for &anc in &rbox.role(role).ancestors {
            self.exists_roles.insert(anc.0);
            if rbox.role(anc).functional {
                self.func_roles.insert(anc.0);
            }
        }
    }

    fn pos_all(&self) -> impl Iterator<Item = &u32> {
        self.pos_det.iter().chain(self.pos_nondet.iter())
    }

    fn neg_all(&self) -> impl Iterator<Item = &u32> {
        self.neg_det.iter().chain(self.neg_nondet.iter())
    }

    /// Fast merge check of two cached models.
    pub fn can_merge_with(&self, other: &IanCache, flag_nominals: bool) -> CacheState {
        if flag_nominals && (self.has_nominal || other.has_nominal) {
            return CacheState::Failed;
        }
        // a deterministic contradiction refutes the merge outright
        if !self.pos_det.is_disjoint(&other.neg_det) || !self.neg_det.is_disjoint(&other.pos_det) {
            return CacheState::Invalid;
        }
        // a functional role with an existential on both sides forces a
        // successor merge the fast check cannot vouch for
        for f in self.func_roles.union(&other.func_roles) {
            if self.exists_roles.contains(f) && other.exists_roles.contains(f) {
                return CacheState::Invalid;
            }
        }
        // non-deterministic overlaps are undecided here
        if self.pos_all().any(|c| other.neg_all().any(|d| c == d))
            || self.neg_all().any(|c| other.pos_all().any(|d| c == d))
        {
            return CacheState::Failed;
        }
        // ∀ on one side meeting ∃ on the other needs real propagation
        if !self.forall_roles.is_disjoint(&other.exists_roles)
            || !other.forall_roles.is_disjoint(&self.exists_roles)
        {
            return CacheState::Failed;
        }
        CacheState::Valid
    }

    /// Absorb another cache (used while accumulating a node's label).
    pub fn absorb(&mut self, other: &IanCache) {
        self.pos_det.extend(other.pos_det.iter().copied());
        self.pos_nondet.extend(other.pos_nondet.iter().copied());
        self.neg_det.extend(other.neg_det.iter().copied());
        self.neg_nondet.extend(other.neg_nondet.iter().copied());
        self.exists_roles.extend(other.exists_roles.iter().copied());
        self.forall_roles.extend(other.forall_roles.iter().copied());
        self.func_roles.extend(other.func_roles.iter().copied());
        self.has_nominal |= other.has_nominal;
    }
}

/// A cached witness model for one concept pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCache {
    /// ⊤ (trivially satisfiable) or ⊥ (trivially not).
    Const { sat: bool },
    /// A single named concept occurrence; `bp` keeps the sign.
    Singleton { bp: Bp },
    Ian(IanCache),
}

impl ModelCache {
    pub fn state(&self) -> CacheState {
        match self {
            ModelCache::Const { sat: true } => CacheState::Valid,
            ModelCache::Const { sat: false } => CacheState::Invalid,
            ModelCache::Singleton { .. } => CacheState::Valid,
            ModelCache::Ian(_) => CacheState::Valid,
        }
    }

    /// View as a set cache for merging; singletons expand on the fly.
    pub fn as_ian(&self, tbox: &Tbox) -> Option<IanCache> {
        match self {
            ModelCache::Const { sat: true } => Some(IanCache::default()),
            ModelCache::Const { sat: false } => None,
            ModelCache::Singleton { bp } => {
                let mut cache = IanCache::default();
                cache.process_entry(*bp, true, tbox);
                Some(cache)
            }
            ModelCache::Ian(c) => Some(c.clone()),
        }
    }
}

/// Lazily grown store of per-concept caches, keyed by signed pointer.
/// Entries are immutable once inserted; the store is owned by the kernel
/// and shared across satisfiability sessions.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    slots: HashMap<Bp, ModelCache>,
}

impl CacheStore {
    pub fn new() -> Self {
        let mut store = Self::default();
        store.slots.insert(Bp::TOP, ModelCache::Const { sat: true });
        store.slots.insert(Bp::BOTTOM, ModelCache::Const { sat: false });
        store
    }

    pub fn get(&self, bp: Bp) -> Option<&ModelCache> {
        self.slots.get(&bp)
    }

    /// First insertion wins; caches are immutable thereafter.
    pub fn insert(&mut self, bp: Bp, cache: ModelCache) {
        self.slots.entry(bp).or_insert(cache);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Merge the caches of all label entries of `node`; the accumulated
    /// DepSet is reported with an `Invalid` outcome so the engine can
    /// raise a precise clash.
    pub fn try_cache_node(
        &self,
        graph: &CompletionGraph,
        node: NodeId,
        tbox: &Tbox,
        flag_nominals: bool,
    ) -> (CacheState, DepSet) {
        let mut acc = IanCache::default();
        let mut dep = DepSet::empty();
        for entry in graph.node(node).label_iter() {
            let Some(cache) = self.get(entry.bp) else {
                return (CacheState::Failed, dep);
            };
            dep.union(&entry.dep);
            let Some(ian) = cache.as_ian(tbox) else {
                return (CacheState::Invalid, dep);
            };
            match acc.can_merge_with(&ian, flag_nominals) {
                CacheState::Valid => acc.absorb(&ian),
                CacheState::Invalid => return (CacheState::Invalid, dep),
                _ => return (CacheState::Failed, dep),
            }
        }
        (CacheState::Valid, dep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn singleton(id: u32, positive: bool) -> IanCache {
        let mut c = IanCache::default();
        if positive {
            c.pos_det.insert(id);
        } else {
            c.neg_det.insert(id);
        }
        c
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_deterministic_contradiction_is_invalid() {
            let a = singleton(0, true);
            let b = singleton(0, false);
            assert_eq!(a.can_merge_with(&b, false), CacheState::Invalid);
            assert_eq!(b.can_merge_with(&a, false), CacheState::Invalid);
        }

        #[test]
        fn test_disjoint_signatures_are_valid() {
            let a = singleton(0, true);
            let b = singleton(1, true);
            assert_eq!(a.can_merge_with(&b, false), CacheState::Valid);
        }

        #[test]
        fn test_nondeterministic_overlap_is_undecided() {
            let mut a = IanCache::default();
            a.pos_nondet.insert(0);
            let b = singleton(0, false);
            assert_eq!(a.can_merge_with(&b, false), CacheState::Failed);
        }

        #[test]
        fn test_functional_role_with_two_existentials_is_invalid() {
            let mut a = IanCache::default();
            a.exists_roles.insert(4);
            a.func_roles.insert(4);
            let mut b = IanCache::default();
            b.exists_roles.insert(4);
            assert_eq!(a.can_merge_with(&b, false), CacheState::Invalid);
        }

        #[test]
        fn test_nominal_with_flag_fails() {
            let mut a = IanCache::default();
            a.has_nominal = true;
            let b = IanCache::default();
            assert_eq!(a.can_merge_with(&b, true), CacheState::Failed);
            assert_eq!(a.can_merge_with(&b, false), CacheState::Valid);
        }

        #[test]
        fn test_forall_meeting_exists_is_undecided() {
            let mut a = IanCache::default();
            a.forall_roles.insert(2);
            let mut b = IanCache::default();
            b.exists_roles.insert(2);
            assert_eq!(a.can_merge_with(&b, false), CacheState::Failed);
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn test_store_initialised_with_poles() {
            let store = CacheStore::new();
            assert_eq!(store.get(Bp::TOP).unwrap().state(), CacheState::Valid);
            assert_eq!(store.get(Bp::BOTTOM).unwrap().state(), CacheState::Invalid);
        }

        #[test]
        fn test_first_insertion_wins() {
            let mut store = CacheStore::new();
            let bp = Bp::new(5, true);
            store.insert(bp, ModelCache::Const { sat: true });
            store.insert(bp, ModelCache::Const { sat: false });
            assert_eq!(store.get(bp).unwrap().state(), CacheState::Valid);
        }
    }
}
