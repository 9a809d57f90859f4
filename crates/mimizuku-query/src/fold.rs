//! 三段階の畳み込み変換

use crate::query::{is_connected, Query, QueryAtom, VarFactory, VarId};
use crate::QueryError;
use mimizuku_core::{ConceptExpr, RoleExpr};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Output of the folding transformation.
///
/// Without nominals the query reduces to one satisfiability check of
/// `term`. With nominals, `obligations` lists `individual ⊑ φᵢ` pairs (the
/// last carrying the `¬Pₖ` marker); asserting them all yields a single
/// refutation-style consistency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldResult {
    pub term: ConceptExpr,
    pub obligations: Vec<(String, ConceptExpr)>,
}

impl FoldResult {
    /// Number of tableau tests the folded query costs.
    pub fn check_count(&self) -> usize {
        1
    }
}

/// Session-scoped folding context: the copy-variable map and the counters
/// for marker and propositional names live here, not in process state.
#[derive(Debug, Default)]
pub struct QueryFolder {
    new_var_map: HashMap<VarId, VarId>,
    marker_count: usize,
}

impl QueryFolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(
        &mut self,
        factory: &mut VarFactory,
        query: &mut Query,
    ) -> Result<FoldResult, QueryError> {
        if query.body.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        self.transform_phase1(factory, query);
        debug!(atoms = query.body.len(), free = query.free_vars.len(), "after phase 1");
        let term = self.transform_phase2(factory, query)?;
        debug!(term = %term, "after phase 2");
        let obligations = eliminate_nominals(&term);
        Ok(FoldResult { term, obligations })
    }

    fn original_of(&self, v: VarId) -> VarId {
        self.new_var_map.get(&v).copied().unwrap_or(v)
    }

    // ---- phase 1: variable freshening ---------------------------------

    /// Replace free-variable occurrences in role atoms by fresh copies
    /// wherever the replacement keeps the query connected; a disconnecting
    /// replacement is rolled back atomically.
    fn transform_phase1(&mut self, factory: &mut VarFactory, query: &mut Query) {
        self.new_var_map.clear();
        for &v in &query.free_vars {
            self.new_var_map.insert(v, v);
        }
        for i in 0..query.body.len() {
            let QueryAtom::Role { role, from, to } = query.body[i].clone() else {
                continue;
            };
            if query.is_free(to) {
                let fresh = factory.copy_var(to);
                let atom = QueryAtom::Role { role, from, to: fresh };
                if self.possibly_replace_atom(query, i, atom, fresh, to) {
                    continue;
                }
            } else if query.is_free(from) {
                let fresh = factory.copy_var(from);
                let atom = QueryAtom::Role { role, from: fresh, to };
                if self.possibly_replace_atom(query, i, atom, fresh, from) {
                    continue;
                }
            }
        }
    }

    fn possibly_replace_atom(
        &mut self,
        query: &mut Query,
        index: usize,
        new_atom: QueryAtom,
        fresh: VarId,
        original: VarId,
    ) -> bool {
        let old_atom = std::mem::replace(&mut query.body[index], new_atom);
        query.set_var_free(fresh);
        if is_connected(query) {
            self.new_var_map.insert(fresh, self.original_of(original));
            true
        } else {
            query.body[index] = old_atom;
            query.free_vars.remove(&fresh);
            false
        }
    }

    // ---- phase 2: term construction -----------------------------------

    fn transform_phase2(
        &mut self,
        factory: &VarFactory,
        query: &mut Query,
    ) -> Result<ConceptExpr, QueryError> {
        self.delete_fictive_variables(query);
        let &start = query
            .free_vars
            .first()
            .ok_or(QueryError::NoFreeVariable)?;
        let mut visited = BTreeSet::new();
        Ok(self.assign(factory, query, &mut visited, None, start))
    }

    /// A free variable no longer touched by any role atom is fictive and
    /// drops out of the free set.
    fn delete_fictive_variables(&self, query: &mut Query) {
        let mut real = BTreeSet::new();
        for atom in &query.body {
            if let QueryAtom::Role { from, to, .. } = atom {
                if query.is_free(*from) {
                    real.insert(*from);
                }
                if query.is_free(*to) {
                    real.insert(*to);
                }
            }
        }
        query.free_vars = real;
    }

    fn marker(&mut self, factory: &VarFactory, query: &Query, v: VarId) -> ConceptExpr {
        let original = self.original_of(v);
        if query.is_free(original) {
            self.marker_count += 1;
            ConceptExpr::Name(format!("{}:{}", factory.name(original), self.marker_count))
        } else {
            ConceptExpr::Top
        }
    }

    /// Recursively fold the atoms touching `v` into a concept. The depth
    /// is bounded by the atom count; `visited` guards the cyclic case.
    fn assign(
        &mut self,
        factory: &VarFactory,
        query: &Query,
        visited: &mut BTreeSet<VarId>,
        previous_atom: Option<usize>,
        v: VarId,
    ) -> ConceptExpr {
        if !visited.insert(v) {
            return self.marker(factory, query, v);
        }
        let t = self.marker(factory, query, v);
        let mut s = ConceptExpr::Top;
        for i in 0..query.body.len() {
            match query.body[i].clone() {
                QueryAtom::Role { role, from, to } => {
                    if previous_atom == Some(i) {
                        continue;
                    }
                    if from == v {
                        let p = self.assign(factory, query, visited, Some(i), to);
                        s = s.and(ConceptExpr::exists(role.clone(), p));
                    }
                    if to == v {
                        let p = self.assign(factory, query, visited, Some(i), from);
                        s = s.and(ConceptExpr::exists(role.inverse(), p));
                    }
                }
                QueryAtom::Concept { concept, var } => {
                    if var == v {
                        s = s.and(concept);
                    }
                }
            }
        }
        t.and(s)
    }
}

// ---- phase 3: nominal elimination -------------------------------------

/// Repeatedly replace the deepest-nominal subterm by a fresh propositional
/// name and solve the resulting equation for the nominal.
fn eliminate_nominals(term: &ConceptExpr) -> Vec<(String, ConceptExpr)> {
    let mut out = Vec::new();
    let mut term = term.clone();
    let mut last: Option<(String, String)> = None;
    let mut i = 0;
    while let Some(target) = deepest_nominal(&term) {
        i += 1;
        let prop = format!("P{}", i);
        let subterm = path_subterm(&term, &target);
        let phi = solve_equation(subterm.clone(), &target, ConceptExpr::Name(prop.clone()));
        debug!(nominal = %target, prop = %prop, phi = %phi, "eliminated nominal");
        out.push((target.clone(), phi));
        term = replace_subterm(&term, &subterm, &ConceptExpr::Name(prop.clone()));
        last = Some((target, prop));
    }
    if let Some((nominal, prop)) = last {
        out.push((nominal, ConceptExpr::Name(prop).not()));
    }
    out
}

/// Deepest nominal occurrence, measuring only named-role `∃` nesting;
/// inverse-role existentials do not add depth.
fn deepest_nominal(expr: &ConceptExpr) -> Option<String> {
    fn walk(e: &ConceptExpr, depth: u32, best: &mut Option<(String, u32)>) {
        match e {
            ConceptExpr::Nominal(n) => {
                if best.as_ref().map_or(true, |(_, d)| depth >= *d) {
                    *best = Some((n.clone(), depth));
                }
            }
            ConceptExpr::And(ops) => {
                for op in ops {
                    walk(op, depth, best);
                }
            }
            ConceptExpr::Exists(role, c) => {
                let (_, inverted) = role.normalized();
                walk(c, if inverted { depth } else { depth + 1 }, best);
            }
            _ => {}
        }
    }
    let mut best = None;
    walk(expr, 0, &mut best);
    best.map(|(n, _)| n)
}

#[derive(Debug, Clone)]
struct Marks {
    /// Contains a nominal reachable without crossing a named-role `∃`.
    simple: bool,
    /// Contains no nominal other than the target.
    good: bool,
    /// This subterm is the current top of the replaceable chain.
    chain: bool,
    path: Option<ConceptExpr>,
}

fn mark(e: &ConceptExpr, target: &str) -> Marks {
    match e {
        ConceptExpr::Nominal(n) if n == target => Marks {
            simple: true,
            good: true,
            chain: true,
            path: Some(e.clone()),
        },
        ConceptExpr::Nominal(_) => Marks {
            simple: true,
            good: false,
            chain: false,
            path: None,
        },
        ConceptExpr::And(ops) => {
            let ms: Vec<Marks> = ops.iter().map(|op| mark(op, target)).collect();
            let simple = ms.iter().any(|m| m.simple);
            let good = ms.iter().all(|m| m.good);
            let chain_below = ms.iter().any(|m| m.chain);
            if chain_below && good && simple {
                Marks { simple, good, chain: true, path: Some(e.clone()) }
            } else {
                let path = ms.into_iter().find_map(|m| m.path);
                Marks { simple, good, chain: false, path }
            }
        }
        ConceptExpr::Exists(role, c) => {
            let m = mark(c, target);
            let (_, inverted) = role.normalized();
            let simple = inverted && m.simple;
            if inverted && m.chain && m.good && simple {
                Marks { simple, good: m.good, chain: true, path: Some(e.clone()) }
            } else {
                Marks { simple, good: m.good, chain: false, path: m.path }
            }
        }
        _ => Marks {
            simple: false,
            good: true,
            chain: false,
            path: None,
        },
    }
}

/// Largest subterm around the target nominal whose other leaves carry no
/// nominal, climbing only through ⊓ and inverse-role ∃.
fn path_subterm(term: &ConceptExpr, target: &str) -> ConceptExpr {
    mark(term, target)
        .path
        .unwrap_or_else(|| ConceptExpr::Nominal(target.to_string()))
}

fn contains_nominal(e: &ConceptExpr, target: &str) -> bool {
    match e {
        ConceptExpr::Nominal(n) => n == target,
        ConceptExpr::And(ops) => ops.iter().any(|op| contains_nominal(op, target)),
        ConceptExpr::Exists(_, c) => contains_nominal(c, target),
        _ => false,
    }
}

/// Replace every occurrence of `subterm` (terms are hash-cons-equal by
/// value) with `replacement`.
fn replace_subterm(e: &ConceptExpr, subterm: &ConceptExpr, replacement: &ConceptExpr) -> ConceptExpr {
    if e == subterm {
        return replacement.clone();
    }
    match e {
        ConceptExpr::And(ops) => ConceptExpr::And(
            ops.iter()
                .map(|op| replace_subterm(op, subterm, replacement))
                .collect(),
        ),
        ConceptExpr::Exists(role, c) => ConceptExpr::Exists(
            role.clone(),
            Box::new(replace_subterm(c, subterm, replacement)),
        ),
        other => other.clone(),
    }
}

/// Solve `left ≡ right` for the target nominal by peeling `∃R⁻` into `∀R`
/// and conjunctions into disjunctive weakening, outside in.
fn solve_equation(left: ConceptExpr, target: &str, right: ConceptExpr) -> ConceptExpr {
    let mut left = left;
    let mut right = right;
    loop {
        match left {
            ConceptExpr::Nominal(ref n) if n == target => return right,
            ConceptExpr::Exists(role, c) => {
                let (name, inverted) = role.normalized();
                debug_assert!(inverted, "path subterms only cross inverse-role existentials");
                right = ConceptExpr::forall(RoleExpr::named(name), right);
                left = *c;
            }
            ConceptExpr::And(ops) => {
                let mut nominal_side = None;
                let mut disjuncts = Vec::new();
                for op in ops {
                    if nominal_side.is_none() && contains_nominal(&op, target) {
                        nominal_side = Some(op);
                    } else if !op.is_top() {
                        disjuncts.push(op.not());
                    }
                }
                if !disjuncts.is_empty() {
                    disjuncts.push(right);
                    right = ConceptExpr::Or(disjuncts);
                }
                left = nominal_side.expect("goodness guarantees the nominal side");
            }
            other => {
                // nothing else appears on a replaceable path
                debug_assert!(false, "unexpected subterm {:?} while solving", other);
                return right.and(other.not());
            }
        }
    }
}
