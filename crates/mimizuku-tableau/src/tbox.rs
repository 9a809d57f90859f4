//! 推論セッションへの入力 (TBox ビュー)

use mimizuku_core::{Bp, ConceptId, Dag, DagVertex, DepSet, IndividualId, RoleId};
use mimizuku_rbox::RoleBox;
use serde::{Deserialize, Serialize};

/// A registered named concept as the engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptInfo {
    pub name: String,
    /// Pointer to the `CName` vertex.
    pub bp: Bp,
    /// Told description, unfolded lazily: for a primitive concept this is a
    /// told-subsumer conjunction (`C ⊑ D`), for a defined one the definition
    /// body (`C ≡ D`).
    pub described: Option<Bp>,
    /// Primitive concepts unfold only on positive occurrences; defined ones
    /// unfold both polarities.
    pub primitive: bool,
}

/// A registered individual as the engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualInfo {
    pub name: String,
    /// Pointer to the `Nominal` vertex.
    pub bp: Bp,
}

/// A split definition: the choose-rule picks one of the disjoint renamings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitDef {
    /// The `Choose` vertex this split is attached to.
    pub choose_bp: Bp,
    /// Disjoint extensional renamings, one of which must hold.
    pub options: Vec<Bp>,
}

/// ABox content materialised into the completion graph at session start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AboxData {
    pub concept_assertions: Vec<(IndividualId, Bp)>,
    pub role_assertions: Vec<(IndividualId, RoleId, IndividualId)>,
    pub same: Vec<(IndividualId, IndividualId)>,
    pub different: Vec<Vec<IndividualId>>,
}

impl AboxData {
    pub fn is_empty(&self) -> bool {
        self.concept_assertions.is_empty()
            && self.role_assertions.is_empty()
            && self.same.is_empty()
            && self.different.is_empty()
    }
}

/// Result of the pluggable datatype check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataCheckResult {
    Ok,
    Clash(DepSet),
}

/// Pluggable datatype reasoner; receives the data labels of one data node.
pub trait DatatypeChecker {
    fn check(&mut self, dag: &Dag, entries: &[(Bp, DepSet)]) -> DataCheckResult;
}

/// Built-in checker: a data node denotes a single value, so two distinct
/// positive literals clash, as does a literal whose datatype contradicts a
/// required datatype.
#[derive(Debug, Default)]
pub struct SimpleDatatypeChecker;

impl DatatypeChecker for SimpleDatatypeChecker {
    fn check(&mut self, dag: &Dag, entries: &[(Bp, DepSet)]) -> DataCheckResult {
        let mut seen_value: Option<(&str, &str, &DepSet)> = None;
        let mut seen_type: Option<(&str, &DepSet)> = None;
        for (bp, dep) in entries {
            if !bp.is_positive() {
                continue;
            }
            match dag.get(*bp) {
                DagVertex::DataValue { datatype, literal } => {
                    if let Some((dt, lit, prev)) = seen_value {
                        if lit != literal || dt != datatype {
                            return DataCheckResult::Clash(prev.unioned(dep));
                        }
                    }
                    if let Some((dt, prev)) = seen_type {
                        if dt != datatype {
                            return DataCheckResult::Clash(prev.unioned(dep));
                        }
                    }
                    seen_value = Some((datatype, literal, dep));
                }
                DagVertex::DataType { name } => {
                    if let Some((dt, _, prev)) = seen_value {
                        if dt != name {
                            return DataCheckResult::Clash(prev.unioned(dep));
                        }
                    }
                    if let Some((dt, prev)) = seen_type {
                        if dt != name {
                            return DataCheckResult::Clash(prev.unioned(dep));
                        }
                    }
                    seen_type = Some((name, dep));
                }
                _ => {}
            }
        }
        DataCheckResult::Ok
    }
}

/// Read-only input of a satisfiability session: the DAG, the role box and
/// the registries, shared-immutable across tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tbox {
    pub dag: Dag,
    pub rbox: RoleBox,
    pub concepts: Vec<ConceptInfo>,
    pub individuals: Vec<IndividualInfo>,
    /// Internalised GCI conjunction, added to every node; `⊤` when none.
    pub gci: Bp,
    /// Fairness constraints: concepts that must recur on any infinite path.
    pub fairness: Vec<Bp>,
    pub splits: Vec<SplitDef>,
    pub abox: AboxData,
}

impl Tbox {
    pub fn new(dag: Dag, rbox: RoleBox) -> Self {
        Self {
            dag,
            rbox,
            concepts: Vec::new(),
            individuals: Vec::new(),
            gci: Bp::TOP,
            fairness: Vec::new(),
            splits: Vec::new(),
            abox: AboxData::default(),
        }
    }

    pub fn concept(&self, id: ConceptId) -> &ConceptInfo {
        &self.concepts[id.0 as usize]
    }

    pub fn individual(&self, id: IndividualId) -> &IndividualInfo {
        &self.individuals[id.0 as usize]
    }

    pub fn has_fairness_constraints(&self) -> bool {
        !self.fairness.is_empty()
    }

    /// Subset blocking is only sound without inverse roles and number
    /// restrictions; scan the DAG once to pick the label comparison.
    pub fn needs_equality_blocking(&self) -> bool {
        for i in 1..self.dag.len() {
            let bp = Bp::new(i, true);
            match self.dag.get(bp) {
                DagVertex::AtMost { .. } => return true,
                DagVertex::Forall { role, .. } => {
                    // an inverse role in the scope of a quantifier
                    if role.0 % 2 == 1 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        self.rbox.has_functional_roles()
    }

    pub fn split_for(&self, choose_bp: Bp) -> Option<&SplitDef> {
        self.splits.iter().find(|s| s.choose_bp == choose_bp)
    }

    /// Freeze the role box and pre-allocate everything the engine looks up
    /// read-only during expansion: the `≤1 R.⊤` vertex of every functional
    /// role and the full state ladder of every `∀` over a role with a
    /// non-trivial automaton.
    pub fn prepare_for_reasoning(&mut self) {
        if !self.rbox.is_closed() {
            self.rbox.close();
        }
        for i in (0..self.rbox.len() as u32).map(RoleId) {
            if self.rbox.role(i).functional && self.rbox.role(i).functional_vertex.is_none() {
                let fv = self.dag.at_most(1, i, Bp::TOP);
                self.rbox.role_mut(i).functional_vertex = Some(fv);
            }
        }
        // the DAG grows while we scan it; newly added states are themselves
        // rescanned until nothing is missing
        let mut i = 1;
        while i < self.dag.len() {
            let bp = Bp::new(i, true);
            if let DagVertex::Forall { role, filler, .. } = *self.dag.get(bp) {
                let n = self.rbox.automaton(role).n_states();
                for state in 0..n {
                    self.dag.add(DagVertex::Forall { role, state, filler });
                }
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimizuku_core::ConceptId;

    #[test]
    fn test_simple_datatype_checker_value_conflict() {
        let mut dag = Dag::new();
        let v1 = dag.add(DagVertex::DataValue {
            datatype: "string".into(),
            literal: "a".into(),
        });
        let v2 = dag.add(DagVertex::DataValue {
            datatype: "string".into(),
            literal: "b".into(),
        });
        let mut checker = SimpleDatatypeChecker;
        let entries = vec![(v1, DepSet::empty()), (v2, DepSet::from_level(2))];
        match checker.check(&dag, &entries) {
            DataCheckResult::Clash(dep) => assert_eq!(dep.max_level(), Some(2)),
            r => panic!("expected clash, got {:?}", r),
        }
    }

    #[test]
    fn test_simple_datatype_checker_type_mismatch() {
        let mut dag = Dag::new();
        let t = dag.add(DagVertex::DataType { name: "integer".into() });
        let v = dag.add(DagVertex::DataValue {
            datatype: "string".into(),
            literal: "x".into(),
        });
        let mut checker = SimpleDatatypeChecker;
        let entries = vec![(t, DepSet::empty()), (v, DepSet::empty())];
        assert!(matches!(checker.check(&dag, &entries), DataCheckResult::Clash(_)));
    }

    #[test]
    fn test_simple_datatype_checker_consistent() {
        let mut dag = Dag::new();
        let t = dag.add(DagVertex::DataType { name: "string".into() });
        let v = dag.add(DagVertex::DataValue {
            datatype: "string".into(),
            literal: "x".into(),
        });
        let mut checker = SimpleDatatypeChecker;
        let entries = vec![(t, DepSet::empty()), (v, DepSet::empty())];
        assert_eq!(checker.check(&dag, &entries), DataCheckResult::Ok);
    }

    #[test]
    fn test_needs_equality_blocking_on_atmost() {
        let mut dag = Dag::new();
        let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
        dag.at_most(1, RoleId(0), a);
        let tbox = Tbox::new(dag, RoleBox::new());
        assert!(tbox.needs_equality_blocking());
    }

    #[test]
    fn test_subset_blocking_for_plain_tbox() {
        let mut dag = Dag::new();
        let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
        dag.exists(RoleId(0), a);
        let tbox = Tbox::new(dag, RoleBox::new());
        assert!(!tbox.needs_equality_blocking());
    }
}
