//! タブロー充足可能性エンジン

use crate::blocking::{self, BlockingConfig};
use crate::branch::{BranchContext, BranchKind};
use crate::cache::{CacheState, CacheStore, IanCache, ModelCache};
use crate::graph::{AddResult, CompletionGraph, ConceptWDep, EdgeId, LabelKind, NodeId};
use crate::tbox::{DataCheckResult, DatatypeChecker, SimpleDatatypeChecker, Tbox};
use crate::todo::{priority, ToDoEntry, ToDoList};
use crate::{CancelFlag, EngineConfig, EngineError};
use mimizuku_core::{Bp, DagVertex, DepSet, IndividualId, RoleId};
use mimizuku_rbox::{RoleBox, ACCEPTING_STATE};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// Poll interval of the soft timeout; the cancellation flag is a relaxed
/// atomic read and is checked on every dequeue.
const POLL_INTERVAL: u32 = 5000;

/// Session-scoped statistics, dumped at `debug!` level after each test.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub n_tactic_calls: usize,
    pub n_id_calls: usize,
    pub n_and_calls: usize,
    pub n_or_calls: usize,
    pub n_or_br_calls: usize,
    pub n_some_calls: usize,
    pub n_all_calls: usize,
    pub n_le_calls: usize,
    pub n_ge_calls: usize,
    pub n_nn_calls: usize,
    pub n_merge_calls: usize,
    pub n_state_saves: usize,
    pub n_state_restores: usize,
    pub n_cache_hits: usize,
    pub n_cache_clashes: usize,
    pub n_fairness_violations: usize,
}

impl Stats {
    fn log_summary(&self) {
        debug!(
            tactic = self.n_tactic_calls,
            id = self.n_id_calls,
            and = self.n_and_calls,
            or = self.n_or_calls,
            or_branching = self.n_or_br_calls,
            some = self.n_some_calls,
            all = self.n_all_calls,
            le = self.n_le_calls,
            ge = self.n_ge_calls,
            nn = self.n_nn_calls,
            merge = self.n_merge_calls,
            saves = self.n_state_saves,
            restores = self.n_state_restores,
            cache_hits = self.n_cache_hits,
            cache_clashes = self.n_cache_clashes,
            "session statistics"
        );
    }
}

/// Insertion-ordered set of the pointers seen in labels this session;
/// truncating the log undoes the marks of an abandoned branch.
#[derive(Debug, Clone, Default)]
struct UsedMarks {
    log: Vec<Bp>,
    set: std::collections::HashSet<Bp>,
}

impl UsedMarks {
    fn len(&self) -> usize {
        self.log.len()
    }

    fn mark(&mut self, bp: Bp) {
        if self.set.insert(bp) {
            self.log.push(bp);
        }
    }

    fn truncate(&mut self, len: usize) {
        while self.log.len() > len {
            let bp = self.log.pop().expect("log length checked");
            self.set.remove(&bp);
        }
    }

    fn clear(&mut self) {
        self.log.clear();
        self.set.clear();
    }
}

/// The tableau satisfiability engine.
///
/// One instance runs one or more tests against a fixed `Tbox`. The DAG,
/// role box and cache store are shared; the completion graph, to-do list
/// and branching stack are owned and reset by `prepare()`.
pub struct SatEngine<'t> {
    tbox: &'t Tbox,
    caches: &'t mut CacheStore,
    config: EngineConfig,
    blocking: BlockingConfig,
    cancel: CancelFlag,
    dt_checker: Box<dyn DatatypeChecker>,

    graph: CompletionGraph,
    todo: ToDoList,
    stack: Vec<BranchContext>,
    used: UsedMarks,
    clash_set: DepSet,
    cur: Option<(NodeId, ConceptWDep)>,
    nominal_home: HashMap<IndividualId, NodeId>,
    reflexive_roles: Vec<RoleId>,
    deadline: Option<Instant>,
    pub stats: Stats,
}

impl<'t> SatEngine<'t> {
    pub fn new(tbox: &'t Tbox, caches: &'t mut CacheStore, config: EngineConfig, cancel: CancelFlag) -> Self {
        let mut anywhere = config.use_anywhere_blocking;
        if tbox.has_fairness_constraints() && anywhere {
            // fairness needs the blocking loop to run through ancestors
            warn!("fairness constraints present: anywhere blocking downgraded to ancestor blocking");
            anywhere = false;
        }
        let blocking = BlockingConfig {
            anywhere,
            equality: tbox.needs_equality_blocking(),
        };
        let reflexive_roles = tbox.rbox.reflexive_roles();
        Self {
            tbox,
            caches,
            config,
            blocking,
            cancel,
            dt_checker: Box::new(SimpleDatatypeChecker),
            graph: CompletionGraph::new(),
            todo: ToDoList::new(),
            stack: Vec::new(),
            used: UsedMarks::default(),
            clash_set: DepSet::empty(),
            cur: None,
            nominal_home: HashMap::new(),
            reflexive_roles,
            deadline: None,
            stats: Stats::default(),
        }
    }

    pub fn with_datatype_checker(mut self, checker: Box<dyn DatatypeChecker>) -> Self {
        self.dt_checker = checker;
        self
    }

    pub fn blocking_config(&self) -> BlockingConfig {
        self.blocking
    }

    pub fn graph(&self) -> &CompletionGraph {
        &self.graph
    }

    /// Current branching level; 0 before any choice is made.
    fn level(&self) -> u32 {
        self.stack.len() as u32
    }

    fn prepare(&mut self) {
        self.graph.clear();
        self.todo.clear();
        self.stack.clear();
        self.used.clear();
        self.clash_set = DepSet::empty();
        self.cur = None;
        self.nominal_home.clear();
        self.stats = Stats::default();
        self.deadline = if self.config.timeout_ms > 0 {
            Some(Instant::now() + std::time::Duration::from_millis(self.config.timeout_ms))
        } else {
            None
        };
    }

    // ---- public test entry points -------------------------------------

    /// Satisfiability of a concept pointer w.r.t. the TBox (and the ABox,
    /// when individuals are registered).
    pub fn is_satisfiable(&mut self, c: Bp) -> Result<bool, EngineError> {
        self.prepare();
        if !self.tbox.individuals.is_empty() {
            if self.init_abox()? {
                return self.finish(false);
            }
        }
        let root = self.graph.init_node(false, 0);
        if self.add_concept(root, self.tbox.gci, DepSet::empty())?
            || self.add_concept(root, c, DepSet::empty())?
        {
            return self.finish(false);
        }
        let sat = self.run_loop()?;
        if sat {
            self.cache_root_model(c, root);
        }
        self.finish(sat)
    }

    /// Consistency of the ABox together with extra concept assertions
    /// (the instance and same-individual reductions feed through here).
    pub fn is_consistent_with(&mut self, extra: &[(IndividualId, Bp)]) -> Result<bool, EngineError> {
        self.prepare();
        if self.tbox.individuals.is_empty() {
            // no individuals: the KB is consistent iff ⊤ is satisfiable
            let root = self.graph.init_node(false, 0);
            if self.add_concept(root, self.tbox.gci, DepSet::empty())? {
                return self.finish(false);
            }
            let sat = self.run_loop()?;
            return self.finish(sat);
        }
        if self.init_abox()? {
            return self.finish(false);
        }
        for (ind, bp) in extra {
            // the home node may have been merged away by `same` assertions
            let node = self.graph.resolve(self.nominal_home[ind]);
            if self.add_concept(node, *bp, DepSet::empty())? {
                return self.finish(false);
            }
        }
        let sat = self.run_loop()?;
        self.finish(sat)
    }

    pub fn is_consistent(&mut self) -> Result<bool, EngineError> {
        self.is_consistent_with(&[])
    }

    fn finish(&mut self, result: bool) -> Result<bool, EngineError> {
        self.stats.n_state_saves = self.graph.save_count();
        self.stats.n_state_restores = self.graph.restore_count();
        self.stats.log_summary();
        Ok(result)
    }

    /// After a successful top-level test, remember the root's witness model
    /// so later merges can prune expansion. First insertion wins.
    fn cache_root_model(&mut self, c: Bp, root: NodeId) {
        if self.caches.get(c).is_some() {
            return;
        }
        let node = self.graph.resolve(root);
        let cache = IanCache::from_node(&self.graph, node, self.tbox);
        self.caches.insert(c, ModelCache::Ian(cache));
    }

    // ---- ABox materialisation -----------------------------------------

    /// Build the nominal cloud; `true` means an unconditional clash.
    fn init_abox(&mut self) -> Result<bool, EngineError> {
        for (i, info) in self.tbox.individuals.iter().enumerate() {
            let node = self.graph.init_node(true, 0);
            self.nominal_home.insert(IndividualId(i as u32), node);
            if self.add_concept(node, info.bp, DepSet::empty())?
                || self.add_concept(node, self.tbox.gci, DepSet::empty())?
            {
                return Ok(true);
            }
        }
        let abox = &self.tbox.abox;
        for (ind, bp) in &abox.concept_assertions {
            let node = self.nominal_home[ind];
            if self.add_concept(node, *bp, DepSet::empty())? {
                return Ok(true);
            }
        }
        for (from, role, to) in &abox.role_assertions {
            let (f, t) = (self.nominal_home[from], self.nominal_home[to]);
            let e = self.graph.add_edge(f, t, *role, DepSet::empty());
            if self.setup_edge(e)? {
                return Ok(true);
            }
        }
        for (a, b) in &abox.same {
            let (x, y) = (self.nominal_home[a], self.nominal_home[b]);
            if self.merge_nodes(y, x, DepSet::empty())? {
                return Ok(true);
            }
        }
        for group in &abox.different {
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    let (x, y) = (self.nominal_home[&group[i]], self.nominal_home[&group[j]]);
                    if self.graph.resolve(x) == self.graph.resolve(y) {
                        self.clash_set = DepSet::empty();
                        return Ok(true);
                    }
                    self.graph.add_distinct(x, y, DepSet::empty());
                }
            }
        }
        Ok(false)
    }

    // ---- main loop ----------------------------------------------------

    fn run_loop(&mut self) -> Result<bool, EngineError> {
        let mut iterations: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if self.cur.is_none() {
                if self.todo.is_empty() {
                    // make sure all blocked nodes are still blocked
                    let unblocked = blocking::retest_blocked(&mut self.graph, self.blocking);
                    for n in unblocked {
                        self.redo_node_label(n);
                    }
                    if !self.todo.is_empty() {
                        continue;
                    }
                    if self.tbox.has_fairness_constraints() && self.fairness_violated() {
                        self.stats.n_fairness_violations += 1;
                        if self.straightforward_restore()? {
                            continue;
                        }
                        return Ok(false);
                    }
                    return Ok(true);
                }
                let Some(entry) = self.todo.next() else { continue };
                if self.graph.is_merged(entry.node) {
                    continue;
                }
                if self.check_blocked(entry.node) {
                    continue;
                }
                if self.graph.node(entry.node).cached {
                    continue;
                }
                let concept = self.graph.node(entry.node).label(entry.kind)[entry.offset].clone();
                self.cur = Some((entry.node, concept));
            }

            iterations += 1;
            if iterations % POLL_INTERVAL == 0 && matches!(self.deadline, Some(d) if Instant::now() >= d) {
                return Err(EngineError::Timeout);
            }

            let (node, concept) = self.cur.take().expect("current entry set above");
            self.stats.n_tactic_calls += 1;
            if self.apply_rule(node, &concept)? {
                if !self.resolve_clash()? {
                    return Ok(false);
                }
            }
            if !self.config.use_lazy_blocking {
                let unblocked = blocking::retest_blocked(&mut self.graph, self.blocking);
                for n in unblocked {
                    self.redo_node_label(n);
                }
            }
        }
    }

    /// Re-enqueue every label entry of a node that lost its blocker.
    fn redo_node_label(&mut self, node: NodeId) {
        let tbox = self.tbox;
        for kind in [LabelKind::Simple, LabelKind::Complex] {
            for offset in 0..self.graph.node(node).label(kind).len() {
                let bp = self.graph.node(node).label(kind)[offset].bp;
                let prio = priority(tbox.dag.get(bp), bp.is_positive());
                self.todo.add(ToDoEntry { node, kind, offset }, prio);
            }
        }
    }

    fn check_blocked(&mut self, node: NodeId) -> bool {
        if !self.graph.node(node).is_blockable() {
            return false;
        }
        let blocker = blocking::find_blocker(&self.graph, node, self.blocking);
        self.graph.node_mut(node).blocked_by = blocker;
        blocker.is_some()
    }

    // ---- clash handling -----------------------------------------------

    /// Dependency-directed recovery; `false` means the test is unsatisfiable.
    fn resolve_clash(&mut self) -> Result<bool, EngineError> {
        loop {
            if self.stack.is_empty() {
                return Ok(false);
            }
            let level = self.level();
            let mut max = self.clash_set.max_level().unwrap_or(0);
            if max == 0 {
                // the clash holds unconditionally
                return Ok(false);
            }
            if !self.config.use_backjumping {
                max = level;
            }
            if max < level {
                // backjump: everything in between took no part in the clash
                debug!(from = level, to = max, clash = %self.clash_set, "backjump");
                self.restore_to(max);
                self.stack.truncate(max as usize);
                continue;
            }
            // the clash involves this level: try the next option here
            let clash = self.clash_set.clone();
            let bc = self.stack.last_mut().expect("stack checked non-empty");
            bc.note_failure(&clash, level);
            if bc.exhausted() {
                let handed_down = bc.branch_dep.clone();
                self.restore_to(level);
                self.graph.pop_snapshot();
                self.todo.pop_snapshot();
                self.stack.pop();
                self.clash_set = handed_down;
                continue;
            }
            self.restore_to(level);
            if !self.apply_next_option()? {
                return Ok(true);
            }
            // the fresh option clashed immediately; go around again
        }
    }

    /// Truncate graph, queue and used-marks to the state saved when the
    /// branching context of `level` was created.
    fn restore_to(&mut self, level: u32) {
        let index = (level - 1) as usize;
        self.graph.restore(index);
        self.todo.restore(index);
        let mark = self.stack[index].used_mark;
        self.used.truncate(mark);
        self.cur = None;
    }

    /// Forced chronological restore used by the fairness check.
    fn straightforward_restore(&mut self) -> Result<bool, EngineError> {
        if self.stack.is_empty() {
            return Ok(false);
        }
        self.clash_set = DepSet::from_level(self.level());
        self.resolve_clash()
    }

    fn create_branch(
        &mut self,
        kind: BranchKind,
        node: NodeId,
        concept: ConceptWDep,
        branch_dep: DepSet,
    ) -> Result<bool, EngineError> {
        let used_mark = self.used.len();
        self.graph.save();
        self.todo.save();
        self.stack
            .push(BranchContext::new(kind, node, concept, branch_dep, used_mark));
        if self.apply_next_option()? {
            if !self.resolve_clash()? {
                // signal unsatisfiability upward as an unconditional clash
                self.clash_set = DepSet::empty();
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Apply the next untried option of the innermost branching context.
    fn apply_next_option(&mut self) -> Result<bool, EngineError> {
        let level = self.level();
        let bc = self.stack.last_mut().expect("called with a live context");
        let option_index = bc.next_option;
        bc.next_option += 1;
        let node = self.graph.resolve(bc.node);
        let concept = bc.concept.clone();
        let mut dep = bc.branch_dep.clone();
        dep.insert(level);
        let kind = bc.kind.clone();

        match kind {
            BranchKind::Or { options } => {
                if self.config.use_semantic_branching {
                    // falsified disjuncts stay falsified on this branch
                    for &failed in &options[..option_index] {
                        if self.add_concept(node, failed.inverse(), dep.clone())? {
                            return Ok(true);
                        }
                    }
                }
                self.stats.n_or_br_calls += 1;
                self.add_concept(node, options[option_index], dep)
            }
            BranchKind::AtMost { pairs } => {
                let (keep, merge) = pairs[option_index];
                let mut merge_dep = dep;
                if let DagVertex::AtMost { filler, role, .. } = self.tbox.dag.get(concept.bp) {
                    let (filler, role) = (*filler, *role);
                    for target in [keep, merge] {
                        let t = self.graph.resolve(target);
                        if filler != Bp::TOP {
                            if let Some(d) = self.graph.node(t).label_dep(filler) {
                                merge_dep.union(&d.clone());
                            }
                        }
                        if let Some(d) = self.edge_dep_to(node, t, role) {
                            merge_dep.union(&d);
                        }
                    }
                }
                self.merge_nodes(merge, keep, merge_dep)
            }
            BranchKind::Nn { .. } => {
                let m = (option_index + 1) as u32;
                let DagVertex::AtMost { role, filler, .. } = self.tbox.dag.get(concept.bp) else {
                    return Err(EngineError::Internal("NN context without ≤ concept".into()));
                };
                let (role, filler) = (*role, *filler);
                self.stats.n_nn_calls += 1;
                self.ge_rule(node, m, role, filler, dep, true)
            }
            BranchKind::Choose { options } => self.add_concept(node, options[option_index], dep),
        }
    }

    fn edge_dep_to(&self, from: NodeId, to: NodeId, role: RoleId) -> Option<DepSet> {
        let rbox = &self.tbox.rbox;
        for &e in &self.graph.node(from).succ {
            let edge = self.graph.edge(e);
            if self.graph.resolve(edge.to) == to && rbox.is_subrole(edge.role, role) {
                return Some(edge.dep.clone());
            }
        }
        None
    }

    // ---- label insertion ----------------------------------------------

    fn label_kind(vertex: &DagVertex) -> LabelKind {
        match vertex {
            DagVertex::CName { .. }
            | DagVertex::Nominal { .. }
            | DagVertex::DataType { .. }
            | DagVertex::DataValue { .. } => LabelKind::Simple,
            _ => LabelKind::Complex,
        }
    }

    /// Append a concept to a node label and queue its expansion. Returns
    /// `true` on clash, with `clash_set` holding the precise reason.
    fn add_concept(&mut self, node: NodeId, bp: Bp, dep: DepSet) -> Result<bool, EngineError> {
        if bp == Bp::TOP {
            return Ok(false);
        }
        if bp == Bp::BOTTOM {
            self.clash_set = dep;
            return Ok(true);
        }
        let tbox = self.tbox;
        let vertex = tbox.dag.get(bp);
        // collections never land in labels; expand in place
        if let DagVertex::Collection { ops } = vertex {
            if bp.is_negative() {
                return Ok(false);
            }
            for op in ops.clone() {
                if self.add_concept(node, op, dep.clone())? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        let kind = Self::label_kind(vertex);
        match self.graph.add_concept(node, bp, dep.clone(), kind) {
            AddResult::AlreadyPresent => Ok(false),
            AddResult::Clash(set) => {
                debug!(node, bp = %bp, clash = %set, "clash");
                self.clash_set = set;
                Ok(true)
            }
            AddResult::Added(offset) => {
                self.used.mark(bp);
                if self.graph.node(node).cached {
                    return self.correct_cached_entry(node);
                }
                let prio = priority(vertex, bp.is_positive());
                self.todo.add(ToDoEntry { node, kind, offset }, prio);
                Ok(false)
            }
        }
    }

    /// A concept reached a node that was satisfied from the cache: re-check
    /// the merge, and on failure wake the node up again.
    fn correct_cached_entry(&mut self, node: NodeId) -> Result<bool, EngineError> {
        let flag_nominals = !self.tbox.individuals.is_empty();
        let (state, dep) = self
            .caches
            .try_cache_node(&self.graph, node, self.tbox, flag_nominals);
        match state {
            CacheState::Valid => {
                self.stats.n_cache_hits += 1;
                Ok(false)
            }
            CacheState::Invalid => {
                self.stats.n_cache_clashes += 1;
                self.clash_set = dep;
                Ok(true)
            }
            CacheState::Failed | CacheState::Unknown => {
                self.graph.node_mut(node).cached = false;
                self.redo_node_label(node);
                Ok(false)
            }
        }
    }

    // ---- rule dispatch ------------------------------------------------

    fn apply_rule(&mut self, node: NodeId, concept: &ConceptWDep) -> Result<bool, EngineError> {
        let tbox = self.tbox;
        let bp = concept.bp;
        if bp == Bp::BOTTOM {
            self.clash_set = concept.dep.clone();
            return Ok(true);
        }
        if bp == Bp::TOP {
            return Ok(false);
        }
        let positive = bp.is_positive();
        match tbox.dag.get(bp) {
            DagVertex::Top => Ok(false),
            DagVertex::CName { concept: id } => {
                self.stats.n_id_calls += 1;
                let info = tbox.concept(*id);
                match (positive, info.primitive, info.described) {
                    (true, _, Some(d)) => self.add_concept(node, d, concept.dep.clone()),
                    (false, false, Some(d)) => self.add_concept(node, d.inverse(), concept.dep.clone()),
                    _ => Ok(false),
                }
            }
            DagVertex::Nominal { individual } => {
                if !positive {
                    return Ok(false);
                }
                self.nominal_rule(node, *individual, concept.dep.clone())
            }
            DagVertex::And { ops } => {
                if positive {
                    self.stats.n_and_calls += 1;
                    for op in ops.clone() {
                        if self.add_concept(node, op, concept.dep.clone())? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                } else {
                    self.or_rule(node, concept, ops.clone())
                }
            }
            DagVertex::Collection { ops } => {
                if positive {
                    for op in ops.clone() {
                        if self.add_concept(node, op, concept.dep.clone())? {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            DagVertex::Forall { role, state, filler } => {
                if positive {
                    self.stats.n_all_calls += 1;
                    self.forall_rule(node, concept, *role, *state, *filler)
                } else {
                    self.stats.n_some_calls += 1;
                    self.exists_rule(node, concept, *role, filler.inverse())
                }
            }
            DagVertex::AtMost { n, role, filler } => {
                if positive {
                    self.stats.n_le_calls += 1;
                    self.le_rule(node, concept, *n, *role, *filler)
                } else {
                    self.stats.n_ge_calls += 1;
                    self.ge_rule(node, *n + 1, *role, *filler, concept.dep.clone(), false)
                }
            }
            DagVertex::Choose { .. } => {
                if !positive {
                    return Ok(false);
                }
                match tbox.split_for(bp) {
                    Some(split) => {
                        let options = split.options.clone();
                        self.create_branch(
                            BranchKind::Choose { options },
                            node,
                            concept.clone(),
                            concept.dep.clone(),
                        )
                    }
                    None => Ok(false),
                }
            }
            DagVertex::DataType { .. } | DagVertex::DataValue { .. } => self.data_rule(node),
        }
    }

    // ---- individual rules ---------------------------------------------

    fn or_rule(&mut self, node: NodeId, concept: &ConceptWDep, ops: Vec<Bp>) -> Result<bool, EngineError> {
        self.stats.n_or_calls += 1;
        let disjuncts: Vec<Bp> = ops.iter().map(|op| op.inverse()).collect();
        // already satisfied?
        for &d in &disjuncts {
            if self.graph.node(node).label_contains(d) {
                return Ok(false);
            }
        }
        // drop disjuncts whose negation is in the label; their deps become
        // part of the reason for whatever happens next
        let mut live = Vec::with_capacity(disjuncts.len());
        let mut dep = concept.dep.clone();
        for &d in &disjuncts {
            if let Some(refuted) = self.graph.node(node).label_dep(d.inverse()) {
                dep.union(&refuted.clone());
            } else {
                live.push(d);
            }
        }
        match live.len() {
            0 => {
                self.clash_set = dep;
                Ok(true)
            }
            1 => self.add_concept(node, live[0], dep),
            _ => self.create_branch(BranchKind::Or { options: live }, node, concept.clone(), dep),
        }
    }

    fn forall_rule(
        &mut self,
        node: NodeId,
        concept: &ConceptWDep,
        role: RoleId,
        state: u32,
        filler: Bp,
    ) -> Result<bool, EngineError> {
        if state == ACCEPTING_STATE {
            if self.add_concept(node, filler, concept.dep.clone())? {
                return Ok(true);
            }
        }
        let succ: Vec<EdgeId> = self.graph.node(node).succ.clone();
        for e in succ {
            if self.propagate_forall_over_edge(concept, role, state, filler, e)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn propagate_forall_over_edge(
        &mut self,
        concept: &ConceptWDep,
        role: RoleId,
        state: u32,
        filler: Bp,
        e: EdgeId,
    ) -> Result<bool, EngineError> {
        let tbox = self.tbox;
        let edge = self.graph.edge(e).clone();
        let target = self.graph.resolve(edge.to);
        let aut = tbox.rbox.automaton(role);
        for &(label, next) in aut.transitions_from(state) {
            if !tbox.rbox.transition_applies(edge.role, label) {
                continue;
            }
            let next_bp = tbox
                .dag
                .find(&DagVertex::Forall { role, state: next, filler })
                .ok_or_else(|| {
                    EngineError::Internal(format!("missing automaton vertex for state {}", next))
                })?;
            let dep = concept.dep.unioned(&edge.dep);
            if self.add_concept(target, next_bp, dep)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn exists_rule(
        &mut self,
        node: NodeId,
        concept: &ConceptWDep,
        role: RoleId,
        filler: Bp,
    ) -> Result<bool, EngineError> {
        let tbox = self.tbox;
        // satisfied by an existing neighbour?
        for &e in &self.graph.node(node).succ {
            let edge = self.graph.edge(e);
            if tbox.rbox.is_subrole(edge.role, role) {
                let t = self.graph.resolve(edge.to);
                if filler == Bp::TOP || self.graph.node(t).label_contains(filler) {
                    return Ok(false);
                }
            }
        }
        let is_data = tbox.rbox.role(role).data_role;
        let level = self.level();
        let (child, e) = self
            .graph
            .new_successor(node, role, concept.dep.clone(), is_data, level);
        if self.setup_edge(e)? {
            return Ok(true);
        }
        if !is_data {
            for r in self.reflexive_roles.clone() {
                let se = self.graph.add_edge(child, child, r, concept.dep.clone());
                if self.setup_edge(se)? {
                    return Ok(true);
                }
            }
            if self.add_concept(child, tbox.gci, concept.dep.clone())? {
                return Ok(true);
            }
        }
        if self.add_concept(child, filler, concept.dep.clone())? {
            return Ok(true);
        }
        // a cached witness may satisfy the fresh node outright
        let flag_nominals = !tbox.individuals.is_empty();
        let (state, cdep) = self
            .caches
            .try_cache_node(&self.graph, child, tbox, flag_nominals);
        match state {
            CacheState::Valid => {
                self.stats.n_cache_hits += 1;
                self.graph.node_mut(child).cached = true;
                Ok(false)
            }
            CacheState::Invalid => {
                self.stats.n_cache_clashes += 1;
                self.clash_set = cdep;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Side effects of a fresh edge pair: disjointness and irreflexivity
    /// checks, functional-role `≤1` injection, and re-firing the `∀` and
    /// `≤` entries of both endpoints over the new edge.
    fn setup_edge(&mut self, e: EdgeId) -> Result<bool, EngineError> {
        let tbox = self.tbox;
        let twin = self.graph.edge(e).twin;
        for eid in [e, twin] {
            let edge = self.graph.edge(eid).clone();
            let from = edge.from;
            // irreflexive role on a self-loop
            if edge.from == edge.to {
                for &anc in &tbox.rbox.role(edge.role).ancestors {
                    if tbox.rbox.role(anc).irreflexive {
                        self.clash_set = edge.dep.clone();
                        return Ok(true);
                    }
                }
            }
            // disjoint roles between the same endpoints
            for &other in &self.graph.node(from).succ {
                if other == eid {
                    continue;
                }
                let o = self.graph.edge(other);
                if self.graph.resolve(o.to) == self.graph.resolve(edge.to)
                    && tbox.rbox.are_disjoint(edge.role, o.role)
                {
                    self.clash_set = edge.dep.unioned(&o.dep);
                    return Ok(true);
                }
            }
            // functional ancestors force a ≤1 on the source
            for &anc in &tbox.rbox.role(edge.role).ancestors {
                if tbox.rbox.role(anc).functional {
                    if let Some(fv) = tbox.rbox.role(anc).functional_vertex {
                        if self.add_concept(from, fv, edge.dep.clone())? {
                            return Ok(true);
                        }
                    }
                }
            }
            // ∀ and ≤ entries of the source see the new edge
            let complex: Vec<ConceptWDep> = self.graph.node(from).complex.clone();
            for (offset, entry) in complex.iter().enumerate() {
                if !entry.bp.is_positive() {
                    continue;
                }
                match tbox.dag.get(entry.bp) {
                    DagVertex::Forall { role, state, filler } => {
                        if self.propagate_forall_over_edge(entry, *role, *state, *filler, eid)? {
                            return Ok(true);
                        }
                    }
                    DagVertex::AtMost { role, .. } => {
                        if tbox.rbox.is_subrole(edge.role, *role) {
                            self.todo.add(
                                ToDoEntry { node: from, kind: LabelKind::Complex, offset },
                                priority(tbox.dag.get(entry.bp), true),
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(false)
    }

    fn le_rule(
        &mut self,
        node: NodeId,
        concept: &ConceptWDep,
        n: u32,
        role: RoleId,
        filler: Bp,
    ) -> Result<bool, EngineError> {
        let tbox = self.tbox;
        // resident neighbours: R-successors whose label carries the filler
        let mut resident: Vec<NodeId> = Vec::new();
        for &e in &self.graph.node(node).succ {
            let edge = self.graph.edge(e);
            if !tbox.rbox.is_subrole(edge.role, role) {
                continue;
            }
            let t = self.graph.resolve(edge.to);
            if (filler == Bp::TOP || self.graph.node(t).label_contains(filler))
                && !resident.contains(&t)
            {
                resident.push(t);
            }
        }
        if resident.len() <= n as usize {
            return Ok(false);
        }
        // NN interaction: a nominal bounded from a blockable predecessor
        if self.graph.node(node).is_nominal && n >= 1 {
            let has_blockable_pred = self.graph.node(node).pred.iter().any(|&pe| {
                let edge = self.graph.edge(pe);
                self.graph.node(edge.from).is_blockable()
                    && tbox.rbox.is_subrole(RoleBox::inverse(edge.role), role)
            });
            let has_blockable_resident = resident.iter().any(|&t| self.graph.node(t).is_blockable());
            // once the guessed nominal successors exist, merging takes over
            let has_nominal_resident = resident.iter().any(|&t| self.graph.node(t).is_nominal);
            if has_blockable_pred && has_blockable_resident && !has_nominal_resident {
                return self.create_branch(
                    BranchKind::Nn { limit: n },
                    node,
                    concept.clone(),
                    concept.dep.clone(),
                );
            }
        }
        // non-deterministically merge one candidate pair
        let mut pairs = Vec::new();
        for i in 0..resident.len() {
            for j in (i + 1)..resident.len() {
                pairs.push((resident[i], resident[j]));
            }
        }
        self.create_branch(
            BranchKind::AtMost { pairs },
            node,
            concept.clone(),
            concept.dep.clone(),
        )
    }

    fn ge_rule(
        &mut self,
        node: NodeId,
        m: u32,
        role: RoleId,
        filler: Bp,
        dep: DepSet,
        as_nominals: bool,
    ) -> Result<bool, EngineError> {
        let tbox = self.tbox;
        // re-fired entries must not generate a second family
        let mut existing = 0usize;
        let mut seen = Vec::new();
        for &e in &self.graph.node(node).succ {
            let edge = self.graph.edge(e);
            if !tbox.rbox.is_subrole(edge.role, role) {
                continue;
            }
            let t = self.graph.resolve(edge.to);
            if (filler == Bp::TOP || self.graph.node(t).label_contains(filler)) && !seen.contains(&t) {
                seen.push(t);
                existing += 1;
            }
        }
        if existing >= m as usize {
            return Ok(false);
        }
        let is_data = tbox.rbox.role(role).data_role;
        let level = self.level();
        let mut created = Vec::with_capacity(m as usize);
        for _ in 0..m {
            let (child, e) = self.graph.new_successor(node, role, dep.clone(), is_data, level);
            if as_nominals {
                self.graph.node_mut(child).is_nominal = true;
            }
            if self.setup_edge(e)? {
                return Ok(true);
            }
            if !is_data {
                for r in self.reflexive_roles.clone() {
                    let se = self.graph.add_edge(child, child, r, dep.clone());
                    if self.setup_edge(se)? {
                        return Ok(true);
                    }
                }
                if self.add_concept(child, tbox.gci, dep.clone())? {
                    return Ok(true);
                }
            }
            if self.add_concept(child, filler, dep.clone())? {
                return Ok(true);
            }
            for &prev in &created {
                self.graph.add_distinct(prev, child, dep.clone());
            }
            created.push(child);
        }
        Ok(false)
    }

    fn nominal_rule(&mut self, node: NodeId, individual: IndividualId, dep: DepSet) -> Result<bool, EngineError> {
        let Some(&home) = self.nominal_home.get(&individual) else {
            return Err(EngineError::Internal(
                "nominal without a materialised individual".into(),
            ));
        };
        let h = self.graph.resolve(home);
        let n = self.graph.resolve(node);
        if h == n {
            return Ok(false);
        }
        // the named root survives the merge
        self.merge_nodes(n, h, dep)
    }

    /// Merge `from` into `into`: union labels, rewire edges, honour
    /// inequality constraints. Returns `true` on clash.
    fn merge_nodes(&mut self, from: NodeId, into: NodeId, dep: DepSet) -> Result<bool, EngineError> {
        let (from, into) = (self.graph.resolve(from), self.graph.resolve(into));
        if from == into {
            return Ok(false);
        }
        if let Some(d) = self.graph.are_distinct(from, into) {
            self.clash_set = d.unioned(&dep);
            return Ok(true);
        }
        self.stats.n_merge_calls += 1;
        self.graph.node_mut(from).merged_to = Some(into);
        let entries: Vec<ConceptWDep> = self.graph.node(from).label_iter().cloned().collect();
        for entry in entries {
            if self.add_concept(into, entry.bp, entry.dep.unioned(&dep))? {
                return Ok(true);
            }
        }
        let succ: Vec<EdgeId> = self.graph.node(from).succ.clone();
        for e in succ {
            let edge = self.graph.edge(e).clone();
            let target = self.graph.resolve(edge.to);
            let target = if target == from { into } else { target };
            let new_e = self.graph.add_edge(into, target, edge.role, edge.dep.unioned(&dep));
            if self.setup_edge(new_e)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn data_rule(&mut self, node: NodeId) -> Result<bool, EngineError> {
        if !self.graph.node(node).is_data {
            return Ok(false);
        }
        let entries: Vec<(Bp, DepSet)> = self
            .graph
            .node(node)
            .simple
            .iter()
            .map(|e| (e.bp, e.dep.clone()))
            .collect();
        match self.dt_checker.check(&self.tbox.dag, &entries) {
            DataCheckResult::Ok => Ok(false),
            DataCheckResult::Clash(dep) => {
                self.clash_set = dep;
                Ok(true)
            }
        }
    }

    // ---- fairness -----------------------------------------------------

    /// A fairness concept must recur on every loop of the model; with
    /// ancestor blocking the loop is the blocker-to-blocked path.
    fn fairness_violated(&self) -> bool {
        for &f in &self.tbox.fairness {
            for node in self.graph.nodes() {
                let Some(blocker) = node.blocked_by else { continue };
                let mut on_path = vec![node.id];
                let mut cur = node.parent;
                while let Some(p) = cur {
                    on_path.push(p);
                    if p == blocker {
                        break;
                    }
                    cur = self.graph.node(p).parent;
                }
                if !on_path.iter().any(|&x| self.graph.node(x).label_contains(f)) {
                    return true;
                }
            }
        }
        false
    }
}
