//! 質問データモデルと連結性検査

use mimizuku_core::{ConceptExpr, RoleExpr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub type VarId = usize;

/// Session-scoped variable factory; nothing here is process-wide.
#[derive(Debug, Clone, Default)]
pub struct VarFactory {
    names: Vec<String>,
    ids: HashMap<String, VarId>,
    copy_count: usize,
}

impl VarFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var<S: Into<String>>(&mut self, name: S) -> VarId {
        let name = name.into();
        if let Some(&id) = self.ids.get(&name) {
            return id;
        }
        let id = self.names.len();
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    /// Fresh copy of an existing variable, `x` becoming `x_1`, `x_2`, …
    pub fn copy_var(&mut self, original: VarId) -> VarId {
        self.copy_count += 1;
        let name = format!("{}_{}", self.names[original], self.copy_count);
        self.var(name)
    }

    pub fn name(&self, v: VarId) -> &str {
        &self.names[v]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One atom of the query body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryAtom {
    Role {
        role: RoleExpr,
        from: VarId,
        to: VarId,
    },
    Concept {
        concept: ConceptExpr,
        var: VarId,
    },
}

/// A connected conjunctive query with a designated set of free variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub body: Vec<QueryAtom>,
    pub free_vars: BTreeSet<VarId>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_role_atom(&mut self, role: RoleExpr, from: VarId, to: VarId) {
        self.body.push(QueryAtom::Role { role, from, to });
    }

    pub fn add_concept_atom(&mut self, concept: ConceptExpr, var: VarId) {
        self.body.push(QueryAtom::Concept { concept, var });
    }

    pub fn set_var_free(&mut self, var: VarId) {
        self.free_vars.insert(var);
    }

    pub fn is_free(&self, var: VarId) -> bool {
        self.free_vars.contains(&var)
    }

    /// Every variable some atom mentions.
    pub fn mentioned_vars(&self) -> BTreeSet<VarId> {
        let mut out = BTreeSet::new();
        for atom in &self.body {
            match atom {
                QueryAtom::Role { from, to, .. } => {
                    out.insert(*from);
                    out.insert(*to);
                }
                QueryAtom::Concept { var, .. } => {
                    out.insert(*var);
                }
            }
        }
        out
    }
}

/// Flood-fill connectedness over the variable-undirected graph in which an
/// edge joins the two arguments of each role atom. A concept atom keeps its
/// variable in the graph but adds no edges.
pub fn is_connected(query: &Query) -> bool {
    let vars = query.mentioned_vars();
    let Some(&start) = vars.first() else {
        return true;
    };
    let mut passed = BTreeSet::new();
    mark_vertex(query, start, &mut passed);
    vars.iter().all(|v| passed.contains(v))
}

fn mark_vertex(query: &Query, var: VarId, passed: &mut BTreeSet<VarId>) {
    passed.insert(var);
    for atom in &query.body {
        if let QueryAtom::Role { from, to, .. } = atom {
            let neighbour = if *from == var && *to != var {
                *to
            } else if *to == var && *from != var {
                *from
            } else {
                continue;
            };
            if !passed.contains(&neighbour) {
                mark_vertex(query, neighbour, passed);
            }
        }
    }
}
