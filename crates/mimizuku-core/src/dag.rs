//! 式 DAG とバイポーラポインタ (hash-consing)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a named concept in the knowledge base registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptId(pub u32);

/// Index of a role in the role box. Roles are registered in inverse pairs,
/// so the inverse of a role is always another valid `RoleId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub u32);

/// Index of a named individual in the knowledge base registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndividualId(pub u32);

/// Bipolar pointer: a signed handle into the DAG.
///
/// The sign encodes negation, so `inverse` is a sign flip and
/// `inverse(inverse(p)) == p` by construction. `TOP` and `BOTTOM` are the
/// two poles of vertex 1; index 0 is reserved and never addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bp(i32);

impl Bp {
    pub const TOP: Bp = Bp(1);
    pub const BOTTOM: Bp = Bp(-1);

    pub fn new(index: usize, positive: bool) -> Self {
        let i = index as i32;
        Bp(if positive { i } else { -i })
    }

    /// Logical negation: flip the sign.
    pub fn inverse(self) -> Self {
        Bp(-self.0)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// DAG vertex index this pointer addresses.
    pub fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }
}

impl std::fmt::Display for Bp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A DAG vertex in canonical form.
///
/// Only one constructor of each dual pair is stored; the other is reached
/// through the pointer sign: `Or` is negated `And`, `∃R.C` is negated
/// `∀R.¬C`, and `≥(n+1) R.C` is negated `≤n R.C`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DagVertex {
    /// ⊤; its negation is ⊥.
    Top,
    /// Named concept; definitions are unfolded lazily by the engine.
    CName { concept: ConceptId },
    /// Nominal `{o}`. Nominal status is carried here in the type, never
    /// derived from the spelling of a name.
    Nominal { individual: IndividualId },
    /// Conjunction; the negative pole is the disjunction of the negated ops.
    And { ops: Vec<Bp> },
    /// `∀R.C` at an automaton state of R; the negative pole is `∃R.¬C`.
    /// State 0 is the initial state of the role automaton.
    Forall { role: RoleId, state: u32, filler: Bp },
    /// `≤n R.C`; the negative pole is `≥(n+1) R.C`.
    AtMost { n: u32, role: RoleId, filler: Bp },
    /// Choose-vertex of a split definition.
    Choose { concept: Bp },
    /// Datatype leaf, checked by the pluggable datatype reasoner.
    DataType { name: String },
    /// Data value leaf.
    DataValue { datatype: String, literal: String },
    /// Conjunction-like container that never lands in a node label; the
    /// engine expands it in place.
    Collection { ops: Vec<Bp> },
}

impl DagVertex {
    /// Tag name for logging.
    pub fn tag_name(&self) -> &'static str {
        match self {
            DagVertex::Top => "TOP",
            DagVertex::CName { .. } => "CN",
            DagVertex::Nominal { .. } => "NOM",
            DagVertex::And { .. } => "AND",
            DagVertex::Forall { .. } => "ALL",
            DagVertex::AtMost { .. } => "LE",
            DagVertex::Choose { .. } => "CHOOSE",
            DagVertex::DataType { .. } => "DTYPE",
            DagVertex::DataValue { .. } => "DVALUE",
            DagVertex::Collection { .. } => "COLL",
        }
    }
}

/// Hash-consed store of sub-expressions addressed by bipolar pointers.
///
/// Logically equal terms share one vertex. The store only grows; once
/// reasoning has started it is treated as read-only by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dag {
    vertices: Vec<DagVertex>,
    #[serde(skip)]
    index: HashMap<DagVertex, usize>,
}

impl Dag {
    pub fn new() -> Self {
        let mut dag = Self {
            vertices: Vec::new(),
            index: HashMap::new(),
        };
        // vertex 0 is a reserved sentinel, vertex 1 is ⊤
        dag.vertices.push(DagVertex::Top);
        dag.vertices.push(DagVertex::Top);
        dag.index.insert(DagVertex::Top, 1);
        dag
    }

    /// Number of addressable vertices (including the two fixed ones).
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Intern a vertex, returning the positive pointer to it.
    pub fn add(&mut self, vertex: DagVertex) -> Bp {
        if let Some(&i) = self.index.get(&vertex) {
            return Bp::new(i, true);
        }
        let i = self.vertices.len();
        self.vertices.push(vertex.clone());
        self.index.insert(vertex, i);
        Bp::new(i, true)
    }

    /// Look up an already-interned vertex without allocating.
    pub fn find(&self, vertex: &DagVertex) -> Option<Bp> {
        self.index.get(vertex).map(|&i| Bp::new(i, true))
    }

    /// Vertex a pointer addresses; the sign is the caller's business.
    pub fn get(&self, bp: Bp) -> &DagVertex {
        &self.vertices[bp.index()]
    }

    /// Rebuild the hash-cons index after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .vertices
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, v)| (v.clone(), i))
            .collect();
        // vertex 1 wins for Top
        self.index.insert(DagVertex::Top, 1);
    }

    // ---- smart constructors -------------------------------------------

    /// Conjunction with the usual simplifications: ⊥ absorbs, ⊤ and
    /// duplicates vanish, singletons collapse, operands are sorted so that
    /// logically equal conjunctions intern to one vertex.
    pub fn and(&mut self, ops: Vec<Bp>) -> Bp {
        let mut flat = Vec::with_capacity(ops.len());
        for op in ops {
            if op == Bp::BOTTOM {
                return Bp::BOTTOM;
            }
            if op == Bp::TOP {
                continue;
            }
            flat.push(op);
        }
        flat.sort();
        flat.dedup();
        // C ⊓ ¬C is ⊥
        for w in flat.windows(2) {
            if w[0] == w[1].inverse() {
                return Bp::BOTTOM;
            }
        }
        match flat.len() {
            0 => Bp::TOP,
            1 => flat[0],
            _ => self.add(DagVertex::And { ops: flat }),
        }
    }

    /// Disjunction as the negated conjunction of negations.
    pub fn or(&mut self, ops: Vec<Bp>) -> Bp {
        let negated = ops.into_iter().map(Bp::inverse).collect();
        self.and(negated).inverse()
    }

    pub fn forall(&mut self, role: RoleId, state: u32, filler: Bp) -> Bp {
        if filler == Bp::TOP && state == 0 {
            // ∀R.⊤ carries no information at the initial state
            return Bp::TOP;
        }
        self.add(DagVertex::Forall { role, state, filler })
    }

    /// `∃R.C` as `¬∀R.¬C`.
    pub fn exists(&mut self, role: RoleId, filler: Bp) -> Bp {
        if filler == Bp::BOTTOM {
            return Bp::BOTTOM;
        }
        self.add(DagVertex::Forall {
            role,
            state: 0,
            filler: filler.inverse(),
        })
        .inverse()
    }

    pub fn at_most(&mut self, n: u32, role: RoleId, filler: Bp) -> Bp {
        if filler == Bp::BOTTOM {
            return Bp::TOP;
        }
        self.add(DagVertex::AtMost { n, role, filler })
    }

    /// `≥n R.C` as `¬≤(n-1) R.C`; `≥0` is trivially ⊤.
    pub fn at_least(&mut self, n: u32, role: RoleId, filler: Bp) -> Bp {
        if n == 0 {
            return Bp::TOP;
        }
        if filler == Bp::BOTTOM {
            return Bp::BOTTOM;
        }
        self.at_most(n - 1, role, filler).inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod bp_tests {
        use super::*;

        #[test]
        fn test_inverse_is_involution() {
            let p = Bp::new(5, true);
            assert_eq!(p.inverse().inverse(), p);
        }

        #[test]
        fn test_top_bottom_duality() {
            assert_eq!(Bp::TOP.inverse(), Bp::BOTTOM);
            assert_eq!(Bp::BOTTOM.inverse(), Bp::TOP);
            assert!(Bp::TOP.is_positive());
            assert!(Bp::BOTTOM.is_negative());
        }

        #[test]
        fn test_index_ignores_sign() {
            assert_eq!(Bp::new(7, true).index(), 7);
            assert_eq!(Bp::new(7, false).index(), 7);
        }
    }

    mod dag_tests {
        use super::*;

        #[test]
        fn test_hash_consing_shares_vertices() {
            let mut dag = Dag::new();
            let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
            let b = dag.add(DagVertex::CName { concept: ConceptId(0) });
            let c = dag.add(DagVertex::CName { concept: ConceptId(1) });
            assert_eq!(a, b);
            assert_ne!(a, c);
        }

        #[test]
        fn test_and_simplifications() {
            let mut dag = Dag::new();
            let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
            let b = dag.add(DagVertex::CName { concept: ConceptId(1) });

            assert_eq!(dag.and(vec![]), Bp::TOP);
            assert_eq!(dag.and(vec![a]), a);
            assert_eq!(dag.and(vec![a, Bp::TOP]), a);
            assert_eq!(dag.and(vec![a, Bp::BOTTOM]), Bp::BOTTOM);
            assert_eq!(dag.and(vec![a, a.inverse()]), Bp::BOTTOM);

            let ab = dag.and(vec![a, b]);
            let ba = dag.and(vec![b, a]);
            assert_eq!(ab, ba);
        }

        #[test]
        fn test_or_is_negated_and() {
            let mut dag = Dag::new();
            let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
            let b = dag.add(DagVertex::CName { concept: ConceptId(1) });
            let or = dag.or(vec![a, b]);
            assert!(or.is_negative());
            match dag.get(or) {
                DagVertex::And { ops } => {
                    assert_eq!(ops.len(), 2);
                    assert!(ops.contains(&a.inverse()));
                    assert!(ops.contains(&b.inverse()));
                }
                v => panic!("expected And vertex, got {:?}", v),
            }
        }

        #[test]
        fn test_exists_is_negated_forall() {
            let mut dag = Dag::new();
            let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
            let e = dag.exists(RoleId(0), a);
            assert!(e.is_negative());
            match dag.get(e) {
                DagVertex::Forall { role, state, filler } => {
                    assert_eq!(*role, RoleId(0));
                    assert_eq!(*state, 0);
                    assert_eq!(*filler, a.inverse());
                }
                v => panic!("expected Forall vertex, got {:?}", v),
            }
        }

        #[test]
        fn test_at_least_encoding() {
            let mut dag = Dag::new();
            let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
            assert_eq!(dag.at_least(0, RoleId(0), a), Bp::TOP);
            let ge2 = dag.at_least(2, RoleId(0), a);
            assert!(ge2.is_negative());
            match dag.get(ge2) {
                DagVertex::AtMost { n, .. } => assert_eq!(*n, 1),
                v => panic!("expected AtMost vertex, got {:?}", v),
            }
        }

        #[test]
        fn test_find_does_not_allocate() {
            let mut dag = Dag::new();
            let v = DagVertex::CName { concept: ConceptId(3) };
            assert!(dag.find(&v).is_none());
            let bp = dag.add(v.clone());
            assert_eq!(dag.find(&v), Some(bp));
        }

        #[test]
        fn test_rebuild_index_roundtrip() {
            let mut dag = Dag::new();
            let a = dag.add(DagVertex::CName { concept: ConceptId(0) });
            let json = serde_json::to_string(&dag).unwrap();
            let mut loaded: Dag = serde_json::from_str(&json).unwrap();
            loaded.rebuild_index();
            assert_eq!(loaded.find(&DagVertex::CName { concept: ConceptId(0) }), Some(a));
        }
    }
}
