//! 公理の登録と撤回

use mimizuku_core::{ConceptExpr, RoleExpr};
use serde::{Deserialize, Serialize};

/// Opaque handle returned on registration, usable for later retraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxiomHandle(pub usize);

/// Category of a registered name; mixing categories is a name clash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Concept,
    ObjectRole,
    DataRole,
    Individual,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Concept => "a concept",
            EntityKind::ObjectRole => "an object role",
            EntityKind::DataRole => "a data role",
            EntityKind::Individual => "an individual",
        };
        write!(f, "{}", s)
    }
}

/// Explicit name declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleFlag {
    Transitive,
    Symmetric,
    Asymmetric,
    Reflexive,
    Irreflexive,
    Functional,
    InverseFunctional,
}

/// One told axiom, stored verbatim until the KB is (re)built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axiom {
    Declare(Declaration),

    // concept axioms
    ImpliesConcepts(ConceptExpr, ConceptExpr),
    EqualConcepts(Vec<ConceptExpr>),
    DisjointConcepts(Vec<ConceptExpr>),

    // object role axioms
    ImpliesORoles(RoleExpr, RoleExpr),
    ImpliesORoleChain(Vec<RoleExpr>, RoleExpr),
    EqualORoles(Vec<RoleExpr>),
    DisjointORoles(RoleExpr, RoleExpr),
    InverseRoles(RoleExpr, RoleExpr),
    ORoleDomain(RoleExpr, ConceptExpr),
    ORoleRange(RoleExpr, ConceptExpr),
    ORoleFlag(RoleExpr, RoleFlag),

    // data role axioms
    ImpliesDRoles(String, String),
    DRoleDomain(String, ConceptExpr),
    DRoleFunctional(String),

    // individual assertions
    InstanceOf(String, ConceptExpr),
    RelatedTo(String, RoleExpr, String),
    RelatedToNot(String, RoleExpr, String),
    ValueOf(String, String, String, String),
    ValueOfNot(String, String, String, String),
    SameIndividuals(Vec<String>),
    DifferentIndividuals(Vec<String>),

    /// Concepts that must recur in any infinite model.
    FairnessConstraint(Vec<ConceptExpr>),
}

/// The told ontology: an append-only axiom list with retraction flags.
/// Any change flips `changed`, forcing a rebuild before the next query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ontology {
    axioms: Vec<(Axiom, bool)>,
    changed: bool,
}

impl Ontology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, axiom: Axiom) -> AxiomHandle {
        self.axioms.push((axiom, false));
        self.changed = true;
        AxiomHandle(self.axioms.len() - 1)
    }

    /// Retract an axiom by handle; unknown handles are ignored, matching
    /// the tell-and-forget contract of the bulk API.
    pub fn retract(&mut self, handle: AxiomHandle) {
        if let Some(slot) = self.axioms.get_mut(handle.0) {
            if !slot.1 {
                slot.1 = true;
                self.changed = true;
            }
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_processed(&mut self) {
        self.changed = false;
    }

    /// Live (non-retracted) axioms in declaration order.
    pub fn live(&self) -> impl Iterator<Item = &Axiom> {
        self.axioms
            .iter()
            .filter(|(_, retracted)| !retracted)
            .map(|(a, _)| a)
    }

    pub fn len(&self) -> usize {
        self.axioms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axioms.iter().all(|(_, retracted)| *retracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_retract() {
        let mut ont = Ontology::new();
        let h = ont.add(Axiom::ImpliesConcepts(
            ConceptExpr::name("A"),
            ConceptExpr::name("B"),
        ));
        assert_eq!(ont.live().count(), 1);
        assert!(ont.is_changed());
        ont.mark_processed();
        ont.retract(h);
        assert_eq!(ont.live().count(), 0);
        assert!(ont.is_changed());
    }

    #[test]
    fn test_retract_unknown_handle_is_noop() {
        let mut ont = Ontology::new();
        ont.mark_processed();
        ont.retract(AxiomHandle(42));
        assert!(!ont.is_changed());
    }

    #[test]
    fn test_live_preserves_declaration_order() {
        let mut ont = Ontology::new();
        ont.add(Axiom::ImpliesConcepts(
            ConceptExpr::name("A"),
            ConceptExpr::name("B"),
        ));
        let h = ont.add(Axiom::ImpliesConcepts(
            ConceptExpr::name("B"),
            ConceptExpr::name("C"),
        ));
        ont.add(Axiom::ImpliesConcepts(
            ConceptExpr::name("C"),
            ConceptExpr::name("D"),
        ));
        ont.retract(h);
        let names: Vec<String> = ont
            .live()
            .map(|a| match a {
                Axiom::ImpliesConcepts(ConceptExpr::Name(n), _) => n.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}
