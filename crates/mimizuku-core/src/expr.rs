//! フロントエンド式 AST

use serde::{Deserialize, Serialize};

/// Role expression as produced by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleExpr {
    Named(String),
    Inverse(Box<RoleExpr>),
}

impl RoleExpr {
    pub fn named<S: Into<String>>(name: S) -> Self {
        RoleExpr::Named(name.into())
    }

    pub fn inverse(self) -> Self {
        RoleExpr::Inverse(Box::new(self))
    }

    /// Resolve nested inversions to the underlying name and a parity flag.
    pub fn normalized(&self) -> (&str, bool) {
        match self {
            RoleExpr::Named(n) => (n, false),
            RoleExpr::Inverse(inner) => {
                let (n, inv) = inner.normalized();
                (n, !inv)
            }
        }
    }
}

impl std::fmt::Display for RoleExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, inverted) = self.normalized();
        if inverted {
            write!(f, "{}⁻", name)
        } else {
            write!(f, "{}", name)
        }
    }
}

/// Concept expression as produced by the front end.
///
/// Nominals carry their own variant; nothing downstream is allowed to guess
/// nominal status from the spelling of a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConceptExpr {
    Top,
    Bottom,
    Name(String),
    Nominal(String),
    Not(Box<ConceptExpr>),
    And(Vec<ConceptExpr>),
    Or(Vec<ConceptExpr>),
    Exists(RoleExpr, Box<ConceptExpr>),
    Forall(RoleExpr, Box<ConceptExpr>),
    AtLeast(u32, RoleExpr, Box<ConceptExpr>),
    AtMost(u32, RoleExpr, Box<ConceptExpr>),
    /// `∃T.d` for a data role T and datatype d.
    DataExists(String, String),
    /// `∃T.{v}` for a data role T and a typed literal v.
    DataHasValue {
        role: String,
        datatype: String,
        literal: String,
    },
}

impl ConceptExpr {
    pub fn name<S: Into<String>>(name: S) -> Self {
        ConceptExpr::Name(name.into())
    }

    pub fn nominal<S: Into<String>>(name: S) -> Self {
        ConceptExpr::Nominal(name.into())
    }

    pub fn not(self) -> Self {
        match self {
            ConceptExpr::Not(inner) => *inner,
            ConceptExpr::Top => ConceptExpr::Bottom,
            ConceptExpr::Bottom => ConceptExpr::Top,
            other => ConceptExpr::Not(Box::new(other)),
        }
    }

    pub fn exists(role: RoleExpr, filler: ConceptExpr) -> Self {
        ConceptExpr::Exists(role, Box::new(filler))
    }

    pub fn forall(role: RoleExpr, filler: ConceptExpr) -> Self {
        ConceptExpr::Forall(role, Box::new(filler))
    }

    pub fn is_top(&self) -> bool {
        matches!(self, ConceptExpr::Top)
    }

    /// Binary conjunction that suppresses ⊤ and identical operands. Query
    /// folding leans on this to keep the folded term small.
    pub fn and(self, other: ConceptExpr) -> Self {
        if self == other {
            return self;
        }
        match (self, other) {
            (ConceptExpr::Top, d) => d,
            (c, ConceptExpr::Top) => c,
            (ConceptExpr::And(mut ops), d) => {
                if !ops.contains(&d) {
                    ops.push(d);
                }
                ConceptExpr::And(ops)
            }
            (c, d) => ConceptExpr::And(vec![c, d]),
        }
    }
}

impl std::fmt::Display for ConceptExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConceptExpr::Top => write!(f, "⊤"),
            ConceptExpr::Bottom => write!(f, "⊥"),
            ConceptExpr::Name(n) => write!(f, "{}", n),
            ConceptExpr::Nominal(n) => write!(f, "{{{}}}", n),
            ConceptExpr::Not(c) => write!(f, "¬{}", c),
            ConceptExpr::And(ops) => {
                write!(f, "(")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ⊓ ")?;
                    }
                    write!(f, "{}", op)?;
                }
                write!(f, ")")
            }
            ConceptExpr::Or(ops) => {
                write!(f, "(")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ⊔ ")?;
                    }
                    write!(f, "{}", op)?;
                }
                write!(f, ")")
            }
            ConceptExpr::Exists(r, c) => write!(f, "∃{}.{}", r, c),
            ConceptExpr::Forall(r, c) => write!(f, "∀{}.{}", r, c),
            ConceptExpr::AtLeast(n, r, c) => write!(f, "≥{} {}.{}", n, r, c),
            ConceptExpr::AtMost(n, r, c) => write!(f, "≤{} {}.{}", n, r, c),
            ConceptExpr::DataExists(r, d) => write!(f, "∃{}.{}", r, d),
            ConceptExpr::DataHasValue { role, literal, .. } => {
                write!(f, "∃{}.{{{}}}", role, literal)
            }
        }
    }
}
