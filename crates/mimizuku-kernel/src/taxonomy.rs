//! 概念分類階層 (taxonomy)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Callback consumed by the hierarchy walks; returning `false` stops the
/// iteration early.
pub trait TaxonomyActor {
    fn apply(&mut self, equivalents: &[String]) -> bool;
}

impl<F: FnMut(&[String]) -> bool> TaxonomyActor for F {
    fn apply(&mut self, equivalents: &[String]) -> bool {
        self(equivalents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyVertex {
    pub equivalents: Vec<String>,
    pub parents: BTreeSet<usize>,
    pub children: BTreeSet<usize>,
}

/// The subsumption hierarchy of named concepts, with ⊤ and ⊥ vertices at
/// the poles. Built once per classification; read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    vertices: Vec<TaxonomyVertex>,
    by_name: HashMap<String, usize>,
}

pub const TOP_VERTEX: usize = 0;
pub const BOTTOM_VERTEX: usize = 1;

impl Taxonomy {
    pub fn new() -> Self {
        let mut tax = Self {
            vertices: vec![
                TaxonomyVertex {
                    equivalents: vec!["TOP".to_string()],
                    parents: BTreeSet::new(),
                    children: BTreeSet::new(),
                },
                TaxonomyVertex {
                    equivalents: vec!["BOTTOM".to_string()],
                    parents: BTreeSet::new(),
                    children: BTreeSet::new(),
                },
            ],
            by_name: HashMap::new(),
        };
        tax.vertices[TOP_VERTEX].children.insert(BOTTOM_VERTEX);
        tax.vertices[BOTTOM_VERTEX].parents.insert(TOP_VERTEX);
        tax.by_name.insert("TOP".to_string(), TOP_VERTEX);
        tax.by_name.insert("BOTTOM".to_string(), BOTTOM_VERTEX);
        tax
    }

    pub fn vertex(&self, id: usize) -> &TaxonomyVertex {
        &self.vertices[id]
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Record `name` as equivalent to an existing vertex.
    pub fn add_synonym(&mut self, vertex: usize, name: &str) {
        self.vertices[vertex].equivalents.push(name.to_string());
        self.by_name.insert(name.to_string(), vertex);
    }

    /// Insert a fresh vertex between its direct parents and children,
    /// cutting any parent→child links it now mediates.
    pub fn insert(
        &mut self,
        name: &str,
        parents: &BTreeSet<usize>,
        children: &BTreeSet<usize>,
    ) -> usize {
        let id = self.vertices.len();
        self.vertices.push(TaxonomyVertex {
            equivalents: vec![name.to_string()],
            parents: parents.clone(),
            children: children.clone(),
        });
        self.by_name.insert(name.to_string(), id);
        for &p in parents {
            for &c in children {
                self.vertices[p].children.remove(&c);
                self.vertices[c].parents.remove(&p);
            }
        }
        for &p in parents {
            self.vertices[p].children.insert(id);
        }
        for &c in children {
            self.vertices[c].parents.insert(id);
        }
        id
    }

    fn closure(&self, start: usize, up: bool) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            let next = if up {
                &self.vertices[v].parents
            } else {
                &self.vertices[v].children
            };
            for &n in next {
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    pub fn ancestors(&self, v: usize) -> BTreeSet<usize> {
        self.closure(v, true)
    }

    pub fn descendants(&self, v: usize) -> BTreeSet<usize> {
        self.closure(v, false)
    }

    /// Walk the super-vertices (direct or transitive) through an actor.
    pub fn visit_supers(&self, v: usize, direct: bool, actor: &mut dyn TaxonomyActor) {
        let targets: BTreeSet<usize> = if direct {
            self.vertices[v].parents.clone()
        } else {
            self.ancestors(v)
        };
        for t in targets {
            if !actor.apply(&self.vertices[t].equivalents) {
                return;
            }
        }
    }

    pub fn visit_subs(&self, v: usize, direct: bool, actor: &mut dyn TaxonomyActor) {
        let targets: BTreeSet<usize> = if direct {
            self.vertices[v].children.clone()
        } else {
            self.descendants(v)
        };
        for t in targets {
            if !actor.apply(&self.vertices[t].equivalents) {
                return;
            }
        }
    }

    /// `sub ⊑ sup` according to the built hierarchy.
    pub fn subsumed_by(&self, sub: &str, sup: &str) -> Option<bool> {
        let (a, b) = (self.find(sub)?, self.find(sup)?);
        Some(a == b || self.ancestors(a).contains(&b))
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::new()
    }
}
