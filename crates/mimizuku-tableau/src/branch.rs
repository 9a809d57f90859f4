//! 分岐スタックと依存集合追跡

use crate::graph::{ConceptWDep, NodeId};
use mimizuku_core::{Bp, DepSet};

/// The options a non-deterministic rule saved for later.
#[derive(Debug, Clone)]
pub enum BranchKind {
    /// Disjuncts of an `Or`, tried left to right with semantic branching.
    Or { options: Vec<Bp> },
    /// Candidate merge pairs of a `≤ n` violation, oldest pair first.
    AtMost { pairs: Vec<(NodeId, NodeId)> },
    /// Successor counts `1..=limit` guessed by the NN interaction.
    Nn { limit: u32 },
    /// Disjoint renamings of a split definition.
    Choose { options: Vec<Bp> },
}

impl BranchKind {
    pub fn option_count(&self) -> usize {
        match self {
            BranchKind::Or { options } => options.len(),
            BranchKind::AtMost { pairs } => pairs.len(),
            BranchKind::Nn { limit } => *limit as usize,
            BranchKind::Choose { options } => options.len(),
        }
    }
}

/// State saved when a non-deterministic rule fires.
///
/// `branch_dep` is the reason the branch exists; it grows with the clash
/// sets of failed options (restricted below this level), so an exhausted
/// context hands an exact clash set to the level below.
#[derive(Debug, Clone)]
pub struct BranchContext {
    pub kind: BranchKind,
    pub node: NodeId,
    pub concept: ConceptWDep,
    pub branch_dep: DepSet,
    pub next_option: usize,
    /// Used-marker log length at save time.
    pub used_mark: usize,
}

impl BranchContext {
    pub fn new(kind: BranchKind, node: NodeId, concept: ConceptWDep, branch_dep: DepSet, used_mark: usize) -> Self {
        Self {
            kind,
            node,
            concept,
            branch_dep,
            next_option: 0,
            used_mark,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.next_option >= self.kind.option_count()
    }

    /// Fold a failed option's clash set into the branch reason; everything
    /// at or above `level` is this level's own business and dropped.
    pub fn note_failure(&mut self, clash: &DepSet, level: u32) {
        let mut restricted = clash.clone();
        restricted.restrict(level.saturating_sub(1));
        self.branch_dep.union(&restricted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimizuku_core::Bp;

    fn or_context(n: usize) -> BranchContext {
        let options = (0..n).map(|i| Bp::new(i + 2, true)).collect();
        BranchContext::new(
            BranchKind::Or { options },
            0,
            ConceptWDep {
                bp: Bp::new(10, false),
                dep: DepSet::empty(),
            },
            DepSet::empty(),
            0,
        )
    }

    #[test]
    fn test_exhaustion() {
        let mut bc = or_context(2);
        assert!(!bc.exhausted());
        bc.next_option = 2;
        assert!(bc.exhausted());
    }

    #[test]
    fn test_note_failure_restricts_below_level() {
        let mut bc = or_context(2);
        let mut clash = DepSet::from_level(1);
        clash.insert(3);
        bc.note_failure(&clash, 3);
        assert_eq!(bc.branch_dep.iter().collect::<Vec<_>>(), vec![1]);
    }
}
