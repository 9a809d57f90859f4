//! 推論カーネル本体

use crate::ontology::{Axiom, AxiomHandle, Declaration, EntityKind, Ontology, RoleFlag};
use crate::taxonomy::{Taxonomy, TaxonomyActor, BOTTOM_VERTEX, TOP_VERTEX};
use crate::KernelError;
use mimizuku_core::{Bp, ConceptExpr, ConceptId, Dag, DagVertex, IndividualId, RoleExpr, RoleId};
use mimizuku_el::{ElExpr, ElOntology, ElReasoner};
use mimizuku_query::{FoldResult, Query, QueryFolder, VarFactory};
use mimizuku_rbox::RoleBox;
use mimizuku_tableau::{
    CacheStore, CancelFlag, ConceptInfo, EngineConfig, IndividualInfo, ModelCache, SatEngine, Tbox,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Lifecycle of the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KbStatus {
    Empty,
    Loading,
    Checked,
    Classified,
    Realised,
}

/// Structures built from the told ontology; recreated whenever the
/// ontology changes, shared-immutable during reasoning sessions.
pub(crate) struct KbState {
    pub(crate) tbox: Tbox,
    pub(crate) caches: CacheStore,
    pub(crate) concept_ids: HashMap<String, ConceptId>,
    pub(crate) individual_ids: HashMap<String, IndividualId>,
    pub(crate) entities: HashMap<String, EntityKind>,
    pub(crate) consistent: bool,
    pub(crate) taxonomy: Option<Taxonomy>,
    pub(crate) realisation: Option<HashMap<String, BTreeSet<String>>>,
    fresh_counter: usize,
}

impl KbState {
    fn empty() -> Self {
        Self {
            tbox: Tbox::new(Dag::new(), RoleBox::new()),
            caches: CacheStore::new(),
            concept_ids: HashMap::new(),
            individual_ids: HashMap::new(),
            entities: HashMap::new(),
            consistent: true,
            taxonomy: None,
            realisation: None,
            fresh_counter: 0,
        }
    }

    pub(crate) fn from_loaded(
        tbox: Tbox,
        caches: CacheStore,
        concept_ids: HashMap<String, ConceptId>,
        individual_ids: HashMap<String, IndividualId>,
        entities: HashMap<String, EntityKind>,
        consistent: bool,
        taxonomy: Option<Taxonomy>,
    ) -> Self {
        Self {
            tbox,
            caches,
            concept_ids,
            individual_ids,
            entities,
            consistent,
            taxonomy,
            realisation: None,
            fresh_counter: 0,
        }
    }

    pub(crate) fn register(&mut self, name: &str, kind: EntityKind) -> Result<(), KernelError> {
        match self.entities.get(name) {
            None => {
                self.entities.insert(name.to_string(), kind);
                Ok(())
            }
            Some(&existing) if existing == kind => Ok(()),
            Some(&existing) => Err(KernelError::NameClash {
                name: name.to_string(),
                existing,
                requested: kind,
            }),
        }
    }

    pub(crate) fn concept(&mut self, name: &str) -> Result<ConceptId, KernelError> {
        self.register(name, EntityKind::Concept)?;
        if let Some(&id) = self.concept_ids.get(name) {
            return Ok(id);
        }
        let id = ConceptId(self.tbox.concepts.len() as u32);
        let bp = self.tbox.dag.add(DagVertex::CName { concept: id });
        self.tbox.concepts.push(ConceptInfo {
            name: name.to_string(),
            bp,
            described: None,
            primitive: true,
        });
        self.concept_ids.insert(name.to_string(), id);
        Ok(id)
    }

    pub(crate) fn individual(&mut self, name: &str) -> Result<IndividualId, KernelError> {
        self.register(name, EntityKind::Individual)?;
        if let Some(&id) = self.individual_ids.get(name) {
            return Ok(id);
        }
        let id = IndividualId(self.tbox.individuals.len() as u32);
        let bp = self.tbox.dag.add(DagVertex::Nominal { individual: id });
        self.tbox.individuals.push(IndividualInfo {
            name: name.to_string(),
            bp,
        });
        self.individual_ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn resolve_role(&self, role: &RoleExpr) -> Result<RoleId, KernelError> {
        let (name, inverted) = role.normalized();
        Ok(self.tbox.rbox.resolve(name, inverted)?)
    }

    fn resolve_data_role(&self, name: &str) -> Result<RoleId, KernelError> {
        let id = self
            .tbox
            .rbox
            .find(name)
            .ok_or_else(|| KernelError::MalformedQuery(format!("unknown data role '{}'", name)))?;
        if !self.tbox.rbox.role(id).data_role {
            return Err(KernelError::MalformedQuery(format!(
                "'{}' is not a data role",
                name
            )));
        }
        Ok(id)
    }

    /// Intern a front-end expression into the DAG.
    pub(crate) fn translate(&mut self, expr: &ConceptExpr) -> Result<Bp, KernelError> {
        match expr {
            ConceptExpr::Top => Ok(Bp::TOP),
            ConceptExpr::Bottom => Ok(Bp::BOTTOM),
            ConceptExpr::Name(n) => {
                let id = self.concept(n)?;
                Ok(self.tbox.concepts[id.0 as usize].bp)
            }
            ConceptExpr::Nominal(n) => {
                let id = self.individual(n)?;
                Ok(self.tbox.individuals[id.0 as usize].bp)
            }
            ConceptExpr::Not(c) => Ok(self.translate(c)?.inverse()),
            ConceptExpr::And(ops) => {
                let mut bps = Vec::with_capacity(ops.len());
                for op in ops {
                    bps.push(self.translate(op)?);
                }
                Ok(self.tbox.dag.and(bps))
            }
            ConceptExpr::Or(ops) => {
                let mut bps = Vec::with_capacity(ops.len());
                for op in ops {
                    bps.push(self.translate(op)?);
                }
                Ok(self.tbox.dag.or(bps))
            }
            ConceptExpr::Exists(role, c) => {
                let r = self.resolve_role(role)?;
                let filler = self.translate(c)?;
                Ok(self.tbox.dag.exists(r, filler))
            }
            ConceptExpr::Forall(role, c) => {
                let r = self.resolve_role(role)?;
                let filler = self.translate(c)?;
                Ok(self.tbox.dag.forall(r, 0, filler))
            }
            ConceptExpr::AtLeast(n, role, c) => {
                let r = self.resolve_role(role)?;
                let filler = self.translate(c)?;
                Ok(self.tbox.dag.at_least(*n, r, filler))
            }
            ConceptExpr::AtMost(n, role, c) => {
                let r = self.resolve_role(role)?;
                let filler = self.translate(c)?;
                Ok(self.tbox.dag.at_most(*n, r, filler))
            }
            ConceptExpr::DataExists(role, datatype) => {
                let r = self.resolve_data_role(role)?;
                let d = self.tbox.dag.add(DagVertex::DataType {
                    name: datatype.clone(),
                });
                Ok(self.tbox.dag.exists(r, d))
            }
            ConceptExpr::DataHasValue {
                role,
                datatype,
                literal,
            } => {
                let r = self.resolve_data_role(role)?;
                let v = self.tbox.dag.add(DagVertex::DataValue {
                    datatype: datatype.clone(),
                    literal: literal.clone(),
                });
                Ok(self.tbox.dag.exists(r, v))
            }
        }
    }

    fn fresh_concept(&mut self) -> ConceptExpr {
        self.fresh_counter += 1;
        ConceptExpr::Name(format!("__fresh_{}", self.fresh_counter))
    }

    fn run_satisfiable(
        &mut self,
        bp: Bp,
        config: &EngineConfig,
        cancel: &CancelFlag,
    ) -> Result<bool, KernelError> {
        self.tbox.prepare_for_reasoning();
        let mut engine = SatEngine::new(&self.tbox, &mut self.caches, config.clone(), cancel.clone());
        Ok(engine.is_satisfiable(bp)?)
    }

    fn run_consistent_with(
        &mut self,
        extra: &[(IndividualId, Bp)],
        config: &EngineConfig,
        cancel: &CancelFlag,
    ) -> Result<bool, KernelError> {
        self.tbox.prepare_for_reasoning();
        let mut engine = SatEngine::new(&self.tbox, &mut self.caches, config.clone(), cancel.clone());
        Ok(engine.is_consistent_with(extra)?)
    }
}

/// The reasoning kernel: owns the told ontology and the built state, and
/// answers every query through an unsatisfiability reduction.
pub struct ReasoningKernel {
    ontology: Ontology,
    config: EngineConfig,
    cancel: CancelFlag,
    pub(crate) state: Option<KbState>,
}

impl ReasoningKernel {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            ontology: Ontology::new(),
            config,
            cancel: CancelFlag::new(),
            state: None,
        }
    }

    pub(crate) fn from_parts(config: EngineConfig, state: KbState) -> Self {
        Self {
            ontology: Ontology::new(),
            config,
            cancel: CancelFlag::new(),
            state: Some(state),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared cancellation handle; cancelling aborts the current call at
    /// its next dequeue boundary.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.config.timeout_ms = timeout_ms;
    }

    pub fn status(&self) -> KbStatus {
        if self.state.is_none() || self.ontology.is_changed() {
            return if self.ontology.is_empty() && self.state.is_none() {
                KbStatus::Empty
            } else {
                KbStatus::Loading
            };
        }
        let state = self.state.as_ref().expect("state checked above");
        match (&state.taxonomy, &state.realisation) {
            (_, Some(_)) => KbStatus::Realised,
            (Some(_), None) => KbStatus::Classified,
            (None, None) => KbStatus::Checked,
        }
    }

    // ---- axiom registration -------------------------------------------

    pub fn declare(&mut self, declaration: Declaration) -> AxiomHandle {
        self.ontology.add(Axiom::Declare(declaration))
    }

    pub fn implies_concepts(&mut self, sub: ConceptExpr, sup: ConceptExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ImpliesConcepts(sub, sup))
    }

    pub fn equal_concepts(&mut self, concepts: Vec<ConceptExpr>) -> AxiomHandle {
        self.ontology.add(Axiom::EqualConcepts(concepts))
    }

    pub fn disjoint_concepts(&mut self, concepts: Vec<ConceptExpr>) -> AxiomHandle {
        self.ontology.add(Axiom::DisjointConcepts(concepts))
    }

    pub fn implies_o_roles(&mut self, sub: RoleExpr, sup: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ImpliesORoles(sub, sup))
    }

    pub fn implies_o_role_chain(&mut self, chain: Vec<RoleExpr>, sup: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ImpliesORoleChain(chain, sup))
    }

    pub fn equal_o_roles(&mut self, roles: Vec<RoleExpr>) -> AxiomHandle {
        self.ontology.add(Axiom::EqualORoles(roles))
    }

    pub fn disjoint_o_roles(&mut self, r: RoleExpr, s: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::DisjointORoles(r, s))
    }

    pub fn set_inverse_roles(&mut self, r: RoleExpr, s: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::InverseRoles(r, s))
    }

    pub fn set_o_domain(&mut self, role: RoleExpr, concept: ConceptExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleDomain(role, concept))
    }

    pub fn set_o_range(&mut self, role: RoleExpr, concept: ConceptExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleRange(role, concept))
    }

    pub fn set_transitive(&mut self, role: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleFlag(role, RoleFlag::Transitive))
    }

    pub fn set_symmetric(&mut self, role: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleFlag(role, RoleFlag::Symmetric))
    }

    pub fn set_asymmetric(&mut self, role: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleFlag(role, RoleFlag::Asymmetric))
    }

    pub fn set_reflexive(&mut self, role: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleFlag(role, RoleFlag::Reflexive))
    }

    pub fn set_irreflexive(&mut self, role: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleFlag(role, RoleFlag::Irreflexive))
    }

    pub fn set_functional(&mut self, role: RoleExpr) -> AxiomHandle {
        self.ontology.add(Axiom::ORoleFlag(role, RoleFlag::Functional))
    }

    pub fn set_inverse_functional(&mut self, role: RoleExpr) -> AxiomHandle {
        self.ontology
            .add(Axiom::ORoleFlag(role, RoleFlag::InverseFunctional))
    }

    pub fn implies_d_roles<S: Into<String>>(&mut self, sub: S, sup: S) -> AxiomHandle {
        self.ontology.add(Axiom::ImpliesDRoles(sub.into(), sup.into()))
    }

    pub fn set_d_domain<S: Into<String>>(&mut self, role: S, concept: ConceptExpr) -> AxiomHandle {
        self.ontology.add(Axiom::DRoleDomain(role.into(), concept))
    }

    pub fn set_d_functional<S: Into<String>>(&mut self, role: S) -> AxiomHandle {
        self.ontology.add(Axiom::DRoleFunctional(role.into()))
    }

    pub fn instance_of<S: Into<String>>(&mut self, individual: S, concept: ConceptExpr) -> AxiomHandle {
        self.ontology.add(Axiom::InstanceOf(individual.into(), concept))
    }

    pub fn related_to<S: Into<String>>(&mut self, from: S, role: RoleExpr, to: S) -> AxiomHandle {
        self.ontology.add(Axiom::RelatedTo(from.into(), role, to.into()))
    }

    pub fn related_to_not<S: Into<String>>(&mut self, from: S, role: RoleExpr, to: S) -> AxiomHandle {
        self.ontology
            .add(Axiom::RelatedToNot(from.into(), role, to.into()))
    }

    pub fn value_of<S: Into<String>>(
        &mut self,
        individual: S,
        role: S,
        datatype: S,
        literal: S,
    ) -> AxiomHandle {
        self.ontology.add(Axiom::ValueOf(
            individual.into(),
            role.into(),
            datatype.into(),
            literal.into(),
        ))
    }

    pub fn value_of_not<S: Into<String>>(
        &mut self,
        individual: S,
        role: S,
        datatype: S,
        literal: S,
    ) -> AxiomHandle {
        self.ontology.add(Axiom::ValueOfNot(
            individual.into(),
            role.into(),
            datatype.into(),
            literal.into(),
        ))
    }

    pub fn same_individuals(&mut self, individuals: Vec<String>) -> AxiomHandle {
        self.ontology.add(Axiom::SameIndividuals(individuals))
    }

    pub fn different_individuals(&mut self, individuals: Vec<String>) -> AxiomHandle {
        self.ontology.add(Axiom::DifferentIndividuals(individuals))
    }

    pub fn set_fairness_constraints(&mut self, concepts: Vec<ConceptExpr>) -> AxiomHandle {
        self.ontology.add(Axiom::FairnessConstraint(concepts))
    }

    pub fn retract(&mut self, handle: AxiomHandle) {
        self.ontology.retract(handle);
    }

    // ---- building ------------------------------------------------------

    fn ensure_state(&mut self) -> Result<&mut KbState, KernelError> {
        if self.state.is_none() || self.ontology.is_changed() {
            let state = build_state(&self.ontology, &self.config, &self.cancel)?;
            self.state = Some(state);
            self.ontology.mark_processed();
        }
        Ok(self.state.as_mut().expect("state just ensured"))
    }

    fn consistent_state(&mut self) -> Result<&mut KbState, KernelError> {
        let state = self.ensure_state()?;
        if !state.consistent {
            return Err(KernelError::InconsistentKb);
        }
        Ok(state)
    }

    // ---- queries -------------------------------------------------------

    pub fn is_consistent(&mut self) -> Result<bool, KernelError> {
        Ok(self.ensure_state()?.consistent)
    }

    pub fn is_satisfiable(&mut self, concept: &ConceptExpr) -> Result<bool, KernelError> {
        let (config, cancel) = (self.config.clone(), self.cancel.clone());
        let state = self.consistent_state()?;
        let bp = state.translate(concept)?;
        state.run_satisfiable(bp, &config, &cancel)
    }

    /// `C ⊑ D` as unsatisfiability of `C ⊓ ¬D`.
    pub fn is_subsumed_by(&mut self, sub: &ConceptExpr, sup: &ConceptExpr) -> Result<bool, KernelError> {
        let query = ConceptExpr::And(vec![sub.clone(), sup.clone().not()]);
        Ok(!self.is_satisfiable(&query)?)
    }

    pub fn is_equivalent(&mut self, a: &ConceptExpr, b: &ConceptExpr) -> Result<bool, KernelError> {
        Ok(self.is_subsumed_by(a, b)? && self.is_subsumed_by(b, a)?)
    }

    pub fn is_disjoint(&mut self, a: &ConceptExpr, b: &ConceptExpr) -> Result<bool, KernelError> {
        let query = ConceptExpr::And(vec![a.clone(), b.clone()]);
        Ok(!self.is_satisfiable(&query)?)
    }

    // role property checks, each a small unsatisfiability reduction over a
    // fresh concept

    pub fn is_functional_role(&mut self, role: &RoleExpr) -> Result<bool, KernelError> {
        let f = self.fresh()?;
        let query = ConceptExpr::exists(role.clone(), f.clone().not())
            .and(ConceptExpr::exists(role.clone(), f));
        Ok(!self.is_satisfiable(&query)?)
    }

    /// R is transitive iff `∃R.∃R.¬C ⊓ ∀R.C` is unsatisfiable, C fresh.
    pub fn is_transitive_role(&mut self, role: &RoleExpr) -> Result<bool, KernelError> {
        let f = self.fresh()?;
        let query = ConceptExpr::exists(
            role.clone(),
            ConceptExpr::exists(role.clone(), f.clone().not()),
        )
        .and(ConceptExpr::forall(role.clone(), f));
        Ok(!self.is_satisfiable(&query)?)
    }

    pub fn is_symmetric_role(&mut self, role: &RoleExpr) -> Result<bool, KernelError> {
        let f = self.fresh()?;
        let query = f.clone().and(ConceptExpr::exists(
            role.clone(),
            ConceptExpr::forall(role.clone(), f.not()),
        ));
        Ok(!self.is_satisfiable(&query)?)
    }

    pub fn is_reflexive_role(&mut self, role: &RoleExpr) -> Result<bool, KernelError> {
        let f = self.fresh()?;
        let query = f.clone().and(ConceptExpr::forall(role.clone(), f.not()));
        Ok(!self.is_satisfiable(&query)?)
    }

    pub fn is_sub_role_of(&mut self, sub: &RoleExpr, sup: &RoleExpr) -> Result<bool, KernelError> {
        let f = self.fresh()?;
        let query = ConceptExpr::exists(sub.clone(), f.clone())
            .and(ConceptExpr::forall(sup.clone(), f.not()));
        Ok(!self.is_satisfiable(&query)?)
    }

    /// `R₁∘…∘Rₙ ⊑ S` iff `∃R₁.…∃Rₙ.¬C ⊓ ∀S.C` is unsatisfiable.
    pub fn is_sub_chain_of(&mut self, chain: &[RoleExpr], sup: &RoleExpr) -> Result<bool, KernelError> {
        if chain.is_empty() {
            return Err(KernelError::MalformedQuery("empty role chain".into()));
        }
        let f = self.fresh()?;
        let mut tmp = f.clone().not();
        for role in chain.iter().rev() {
            tmp = ConceptExpr::exists(role.clone(), tmp);
        }
        let query = tmp.and(ConceptExpr::forall(sup.clone(), f));
        Ok(!self.is_satisfiable(&query)?)
    }

    fn fresh(&mut self) -> Result<ConceptExpr, KernelError> {
        Ok(self.consistent_state()?.fresh_concept())
    }

    // ---- individual queries -------------------------------------------

    fn individual_id(&mut self, name: &str) -> Result<IndividualId, KernelError> {
        let state = self.state.as_ref().expect("built state");
        state
            .individual_ids
            .get(name)
            .copied()
            .ok_or_else(|| KernelError::MalformedQuery(format!("unknown individual '{}'", name)))
    }

    /// `a : C` iff the KB plus `a : ¬C` is inconsistent.
    pub fn is_instance_of(&mut self, individual: &str, concept: &ConceptExpr) -> Result<bool, KernelError> {
        let (config, cancel) = (self.config.clone(), self.cancel.clone());
        self.consistent_state()?;
        let id = self.individual_id(individual)?;
        let state = self.state.as_mut().expect("built state");
        let bp = state.translate(&concept.clone().not())?;
        Ok(!state.run_consistent_with(&[(id, bp)], &config, &cancel)?)
    }

    /// `a = b` iff the KB plus `a : ¬{b}` is inconsistent.
    pub fn is_same_individuals(&mut self, a: &str, b: &str) -> Result<bool, KernelError> {
        self.is_instance_of(a, &ConceptExpr::nominal(b))
    }

    pub fn instances(&mut self, concept: &ConceptExpr, actor: &mut dyn TaxonomyActor) -> Result<(), KernelError> {
        self.consistent_state()?;
        let names: Vec<String> = self
            .state
            .as_ref()
            .expect("built state")
            .tbox
            .individuals
            .iter()
            .map(|i| i.name.clone())
            .collect();
        for name in names {
            if self.is_instance_of(&name, concept)? {
                if !actor.apply(&[name]) {
                    break;
                }
            }
        }
        Ok(())
    }

    // ---- classification / realisation ---------------------------------

    pub fn classify(&mut self) -> Result<(), KernelError> {
        let (config, cancel) = (self.config.clone(), self.cancel.clone());
        let el_input = to_el_ontology(&self.ontology);
        let state = self.consistent_state()?;
        if state.taxonomy.is_some() {
            return Ok(());
        }
        // EL fast path: a Horn-like ontology saturates in polynomial time
        if let Some(el_ont) = el_input {
            if let Ok(mut el) = ElReasoner::new(&el_ont) {
                if el.classify().is_ok() {
                    info!("classified via the EL saturation fast path");
                    state.taxonomy = Some(el_taxonomy(state, &el));
                    return Ok(());
                }
            }
        }
        debug!("classifying via tableau subsumption tests");
        state.taxonomy = Some(tableau_taxonomy(state, &config, &cancel)?);
        Ok(())
    }

    pub fn realise(&mut self) -> Result<(), KernelError> {
        self.classify()?;
        let state = self.state.as_ref().expect("built state");
        if state.realisation.is_some() {
            return Ok(());
        }
        let individuals: Vec<String> = state.tbox.individuals.iter().map(|i| i.name.clone()).collect();
        let concepts: Vec<String> = state.tbox.concepts.iter().map(|c| c.name.clone()).collect();
        let mut realisation = HashMap::new();
        for ind in &individuals {
            let mut types = BTreeSet::new();
            for concept in &concepts {
                if concept.starts_with("__fresh_") {
                    continue;
                }
                if self.is_instance_of(ind, &ConceptExpr::name(concept.clone()))? {
                    types.insert(concept.clone());
                }
            }
            realisation.insert(ind.clone(), types);
        }
        self.state.as_mut().expect("built state").realisation = Some(realisation);
        Ok(())
    }

    pub fn taxonomy(&self) -> Option<&Taxonomy> {
        self.state.as_ref().and_then(|s| s.taxonomy.as_ref())
    }

    pub fn get_supers(&mut self, concept: &str, direct: bool, actor: &mut dyn TaxonomyActor) -> Result<(), KernelError> {
        self.classify()?;
        let tax = self.taxonomy().expect("classified above");
        let v = tax
            .find(concept)
            .ok_or_else(|| KernelError::MalformedQuery(format!("unknown concept '{}'", concept)))?;
        tax.visit_supers(v, direct, actor);
        Ok(())
    }

    pub fn get_subs(&mut self, concept: &str, direct: bool, actor: &mut dyn TaxonomyActor) -> Result<(), KernelError> {
        self.classify()?;
        let tax = self.taxonomy().expect("classified above");
        let v = tax
            .find(concept)
            .ok_or_else(|| KernelError::MalformedQuery(format!("unknown concept '{}'", concept)))?;
        tax.visit_subs(v, direct, actor);
        Ok(())
    }

    pub fn get_types(&mut self, individual: &str, actor: &mut dyn TaxonomyActor) -> Result<(), KernelError> {
        self.realise()?;
        let state = self.state.as_ref().expect("built state");
        let types = state
            .realisation
            .as_ref()
            .expect("realised above")
            .get(individual)
            .ok_or_else(|| KernelError::MalformedQuery(format!("unknown individual '{}'", individual)))?;
        for t in types {
            if !actor.apply(std::slice::from_ref(t)) {
                break;
            }
        }
        Ok(())
    }

    // ---- conjunctive queries ------------------------------------------

    /// Fold a connected conjunctive query into its concept checks.
    pub fn fold_query(
        &mut self,
        factory: &mut VarFactory,
        query: &mut Query,
    ) -> Result<FoldResult, KernelError> {
        let mut folder = QueryFolder::new();
        Ok(folder.fold(factory, query)?)
    }

    /// Answer a folded query: without nominals one satisfiability test of
    /// the folded term; with nominals one refutation-style consistency
    /// test of the accumulated obligations.
    pub fn answer_query(
        &mut self,
        factory: &mut VarFactory,
        query: &mut Query,
    ) -> Result<bool, KernelError> {
        let folded = self.fold_query(factory, query)?;
        if folded.obligations.is_empty() {
            return self.is_satisfiable(&folded.term);
        }
        let (config, cancel) = (self.config.clone(), self.cancel.clone());
        self.consistent_state()?;
        let mut extra = Vec::with_capacity(folded.obligations.len());
        for (individual, phi) in &folded.obligations {
            let id = self.individual_id(individual)?;
            let state = self.state.as_mut().expect("built state");
            let bp = state.translate(phi)?;
            extra.push((id, bp));
        }
        let state = self.state.as_mut().expect("built state");
        Ok(!state.run_consistent_with(&extra, &config, &cancel)?)
    }
}

impl Default for ReasoningKernel {
    fn default() -> Self {
        Self::new()
    }
}

// ---- state construction ------------------------------------------------

fn build_state(
    ontology: &Ontology,
    config: &EngineConfig,
    cancel: &CancelFlag,
) -> Result<KbState, KernelError> {
    let mut state = KbState::empty();

    // pass 1: declarations and role discovery; every role must be known
    // before the role box freezes
    for axiom in ontology.live() {
        discover_names(axiom, &mut state)?;
    }

    // pass 2: role axioms
    for axiom in ontology.live() {
        apply_role_axiom(axiom, &mut state)?;
    }

    // pass 3: concept and individual axioms, in declaration order
    let mut told_parts: HashMap<ConceptId, Vec<Bp>> = HashMap::new();
    let mut defined: HashMap<ConceptId, Bp> = HashMap::new();
    let mut gcis: Vec<Bp> = Vec::new();
    for axiom in ontology.live() {
        apply_concept_axiom(axiom, &mut state, &mut told_parts, &mut defined, &mut gcis)?;
    }

    for (id, bp) in defined {
        let info = &mut state.tbox.concepts[id.0 as usize];
        info.described = Some(bp);
        info.primitive = false;
    }
    for (id, parts) in told_parts {
        if state.tbox.concepts[id.0 as usize].primitive
            && state.tbox.concepts[id.0 as usize].described.is_none()
        {
            let described = state.tbox.dag.and(parts);
            state.tbox.concepts[id.0 as usize].described = Some(described);
        } else {
            // told subsumers of a defined concept become general inclusions
            let c_bp = state.tbox.concepts[id.0 as usize].bp;
            for part in parts {
                gcis.push(state.tbox.dag.or(vec![c_bp.inverse(), part]));
            }
        }
    }
    state.tbox.gci = state.tbox.dag.and(gcis);
    state.tbox.prepare_for_reasoning();

    // trivially satisfiable primitives get a singleton cache
    if state.tbox.gci == Bp::TOP {
        for info in &state.tbox.concepts {
            if info.described.is_none() {
                state.caches.insert(info.bp, ModelCache::Singleton { bp: info.bp });
                state
                    .caches
                    .insert(info.bp.inverse(), ModelCache::Singleton { bp: info.bp.inverse() });
            }
        }
    }

    let mut engine = SatEngine::new(&state.tbox, &mut state.caches, config.clone(), cancel.clone());
    state.consistent = engine.is_consistent()?;
    info!(
        concepts = state.tbox.concepts.len(),
        individuals = state.tbox.individuals.len(),
        roles = state.tbox.rbox.len(),
        dag = state.tbox.dag.len(),
        consistent = state.consistent,
        "knowledge base built"
    );
    Ok(state)
}

fn ensure_role(state: &mut KbState, role: &RoleExpr) -> Result<(), KernelError> {
    let (name, _) = role.normalized();
    state.register(name, EntityKind::ObjectRole)?;
    state.tbox.rbox.ensure_role(name, false)?;
    Ok(())
}

fn ensure_data_role(state: &mut KbState, name: &str) -> Result<(), KernelError> {
    state.register(name, EntityKind::DataRole)?;
    state.tbox.rbox.ensure_role(name, true)?;
    Ok(())
}

fn discover_names(axiom: &Axiom, state: &mut KbState) -> Result<(), KernelError> {
    match axiom {
        Axiom::Declare(d) => {
            state.register(&d.name, d.kind)?;
            match d.kind {
                EntityKind::ObjectRole => {
                    state.tbox.rbox.ensure_role(&d.name, false)?;
                }
                EntityKind::DataRole => {
                    state.tbox.rbox.ensure_role(&d.name, true)?;
                }
                _ => {}
            }
        }
        Axiom::ImpliesConcepts(a, b) => {
            discover_expr_roles(a, state)?;
            discover_expr_roles(b, state)?;
        }
        Axiom::EqualConcepts(cs) | Axiom::DisjointConcepts(cs) | Axiom::FairnessConstraint(cs) => {
            for c in cs {
                discover_expr_roles(c, state)?;
            }
        }
        Axiom::ImpliesORoles(r, s) | Axiom::InverseRoles(r, s) | Axiom::DisjointORoles(r, s) => {
            ensure_role(state, r)?;
            ensure_role(state, s)?;
        }
        Axiom::ImpliesORoleChain(chain, s) => {
            for r in chain {
                ensure_role(state, r)?;
            }
            ensure_role(state, s)?;
        }
        Axiom::EqualORoles(roles) => {
            for r in roles {
                ensure_role(state, r)?;
            }
        }
        Axiom::ORoleDomain(r, c) | Axiom::ORoleRange(r, c) => {
            ensure_role(state, r)?;
            discover_expr_roles(c, state)?;
        }
        Axiom::ORoleFlag(r, _) => ensure_role(state, r)?,
        Axiom::ImpliesDRoles(a, b) => {
            ensure_data_role(state, a)?;
            ensure_data_role(state, b)?;
        }
        Axiom::DRoleDomain(r, c) => {
            ensure_data_role(state, r)?;
            discover_expr_roles(c, state)?;
        }
        Axiom::DRoleFunctional(r) => ensure_data_role(state, r)?,
        Axiom::InstanceOf(_, c) => discover_expr_roles(c, state)?,
        Axiom::RelatedTo(_, r, _) | Axiom::RelatedToNot(_, r, _) => ensure_role(state, r)?,
        Axiom::ValueOf(_, r, _, _) | Axiom::ValueOfNot(_, r, _, _) => {
            ensure_data_role(state, r)?;
        }
        Axiom::SameIndividuals(_) | Axiom::DifferentIndividuals(_) => {}
    }
    Ok(())
}

fn discover_expr_roles(expr: &ConceptExpr, state: &mut KbState) -> Result<(), KernelError> {
    match expr {
        ConceptExpr::Exists(role, c)
        | ConceptExpr::Forall(role, c)
        | ConceptExpr::AtLeast(_, role, c)
        | ConceptExpr::AtMost(_, role, c) => {
            let (name, _) = role.normalized();
            state.register(name, EntityKind::ObjectRole)?;
            state.tbox.rbox.ensure_role(name, false)?;
            discover_expr_roles(c, state)?;
        }
        ConceptExpr::DataExists(role, _) | ConceptExpr::DataHasValue { role, .. } => {
            state.register(role, EntityKind::DataRole)?;
            state.tbox.rbox.ensure_role(role, true)?;
        }
        ConceptExpr::Not(c) => discover_expr_roles(c, state)?,
        ConceptExpr::And(ops) | ConceptExpr::Or(ops) => {
            for op in ops {
                discover_expr_roles(op, state)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn apply_role_axiom(axiom: &Axiom, state: &mut KbState) -> Result<(), KernelError> {
    let resolve = |state: &KbState, role: &RoleExpr| -> Result<RoleId, KernelError> {
        let (name, inverted) = role.normalized();
        Ok(state.tbox.rbox.resolve(name, inverted)?)
    };
    match axiom {
        Axiom::ImpliesORoles(r, s) => {
            let (r, s) = (resolve(state, r)?, resolve(state, s)?);
            state.tbox.rbox.add_parent(r, s)?;
        }
        Axiom::ImpliesORoleChain(chain, s) => {
            let mut ids = Vec::with_capacity(chain.len());
            for r in chain {
                ids.push(resolve(state, r)?);
            }
            let s = resolve(state, s)?;
            state.tbox.rbox.add_chain(ids, s)?;
        }
        Axiom::EqualORoles(roles) => {
            for pair in roles.windows(2) {
                let (a, b) = (resolve(state, &pair[0])?, resolve(state, &pair[1])?);
                state.tbox.rbox.add_parent(a, b)?;
                state.tbox.rbox.add_parent(b, a)?;
            }
        }
        Axiom::DisjointORoles(r, s) => {
            let (r, s) = (resolve(state, r)?, resolve(state, s)?);
            state.tbox.rbox.add_disjoint(r, s);
        }
        Axiom::InverseRoles(r, s) => {
            // R ≡ S⁻, expressed through the hierarchy of the paired twins
            let (r, s) = (resolve(state, r)?, resolve(state, s)?);
            let si = RoleBox::inverse(s);
            state.tbox.rbox.add_parent(r, si)?;
            state.tbox.rbox.add_parent(si, r)?;
        }
        Axiom::ORoleFlag(r, flag) => {
            let r = resolve(state, r)?;
            match flag {
                RoleFlag::Transitive => state.tbox.rbox.set_transitive(r),
                RoleFlag::Symmetric => state.tbox.rbox.set_symmetric(r),
                RoleFlag::Asymmetric => {
                    state.tbox.rbox.set_asymmetric(r);
                    // asymmetry means R and R⁻ never co-label an edge pair
                    state.tbox.rbox.add_disjoint(r, RoleBox::inverse(r));
                }
                RoleFlag::Reflexive => state.tbox.rbox.set_reflexive(r),
                RoleFlag::Irreflexive => state.tbox.rbox.set_irreflexive(r),
                RoleFlag::Functional => state.tbox.rbox.set_functional(r),
                RoleFlag::InverseFunctional => {
                    state.tbox.rbox.set_functional(RoleBox::inverse(r))
                }
            }
        }
        Axiom::ImpliesDRoles(a, b) => {
            let (a, b) = (state.resolve_data_role(a)?, state.resolve_data_role(b)?);
            state.tbox.rbox.add_parent(a, b)?;
        }
        Axiom::DRoleFunctional(r) => {
            let r = state.resolve_data_role(r)?;
            state.tbox.rbox.set_functional(r);
        }
        _ => {}
    }
    Ok(())
}

fn apply_concept_axiom(
    axiom: &Axiom,
    state: &mut KbState,
    told_parts: &mut HashMap<ConceptId, Vec<Bp>>,
    defined: &mut HashMap<ConceptId, Bp>,
    gcis: &mut Vec<Bp>,
) -> Result<(), KernelError> {
    match axiom {
        Axiom::ImpliesConcepts(sub, sup) => {
            let sup_bp = state.translate(sup)?;
            if let ConceptExpr::Name(n) = sub {
                let id = state.concept(n)?;
                told_parts.entry(id).or_default().push(sup_bp);
            } else {
                let sub_bp = state.translate(sub)?;
                gcis.push(state.tbox.dag.or(vec![sub_bp.inverse(), sup_bp]));
            }
        }
        Axiom::EqualConcepts(concepts) => {
            for pair in concepts.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let defined_now = if let ConceptExpr::Name(n) = a {
                    let id = state.concept(n)?;
                    if !defined.contains_key(&id) {
                        let body = state.translate(b)?;
                        defined.insert(id, body);
                        true
                    } else {
                        false
                    }
                } else {
                    false
                };
                if !defined_now {
                    let (a_bp, b_bp) = (state.translate(a)?, state.translate(b)?);
                    gcis.push(state.tbox.dag.or(vec![a_bp.inverse(), b_bp]));
                    gcis.push(state.tbox.dag.or(vec![b_bp.inverse(), a_bp]));
                }
            }
        }
        Axiom::DisjointConcepts(concepts) => {
            let mut bps = Vec::with_capacity(concepts.len());
            for c in concepts {
                bps.push(state.translate(c)?);
            }
            for i in 0..bps.len() {
                for j in (i + 1)..bps.len() {
                    gcis.push(state.tbox.dag.or(vec![bps[i].inverse(), bps[j].inverse()]));
                }
            }
        }
        Axiom::ORoleDomain(role, concept) => {
            let r = {
                let (name, inverted) = role.normalized();
                state.tbox.rbox.resolve(name, inverted)?
            };
            let c = state.translate(concept)?;
            let some = state.tbox.dag.exists(r, Bp::TOP);
            gcis.push(state.tbox.dag.or(vec![some.inverse(), c]));
        }
        Axiom::ORoleRange(role, concept) => {
            let r = {
                let (name, inverted) = role.normalized();
                state.tbox.rbox.resolve(name, inverted)?
            };
            let c = state.translate(concept)?;
            gcis.push(state.tbox.dag.forall(r, 0, c));
        }
        Axiom::DRoleDomain(role, concept) => {
            let r = state.resolve_data_role(role)?;
            let c = state.translate(concept)?;
            let some = state.tbox.dag.exists(r, Bp::TOP);
            gcis.push(state.tbox.dag.or(vec![some.inverse(), c]));
        }
        Axiom::InstanceOf(individual, concept) => {
            let id = state.individual(individual)?;
            let bp = state.translate(concept)?;
            state.tbox.abox.concept_assertions.push((id, bp));
        }
        Axiom::RelatedTo(from, role, to) => {
            let (f, t) = (state.individual(from)?, state.individual(to)?);
            let r = {
                let (name, inverted) = role.normalized();
                state.tbox.rbox.resolve(name, inverted)?
            };
            state.tbox.abox.role_assertions.push((f, r, t));
        }
        Axiom::RelatedToNot(from, role, to) => {
            let f = state.individual(from)?;
            let expr = ConceptExpr::forall(role.clone(), ConceptExpr::nominal(to.clone()).not());
            let bp = state.translate(&expr)?;
            state.tbox.abox.concept_assertions.push((f, bp));
        }
        Axiom::ValueOf(individual, role, datatype, literal) => {
            let id = state.individual(individual)?;
            let expr = ConceptExpr::DataHasValue {
                role: role.clone(),
                datatype: datatype.clone(),
                literal: literal.clone(),
            };
            let bp = state.translate(&expr)?;
            state.tbox.abox.concept_assertions.push((id, bp));
        }
        Axiom::ValueOfNot(individual, role, datatype, literal) => {
            let id = state.individual(individual)?;
            let r = state.resolve_data_role(role)?;
            let v = state.tbox.dag.add(DagVertex::DataValue {
                datatype: datatype.clone(),
                literal: literal.clone(),
            });
            let bp = state.tbox.dag.forall(r, 0, v.inverse());
            state.tbox.abox.concept_assertions.push((id, bp));
        }
        Axiom::SameIndividuals(individuals) => {
            for pair in individuals.windows(2) {
                let (a, b) = (state.individual(&pair[0])?, state.individual(&pair[1])?);
                state.tbox.abox.same.push((a, b));
            }
        }
        Axiom::DifferentIndividuals(individuals) => {
            let mut ids = Vec::with_capacity(individuals.len());
            for i in individuals {
                ids.push(state.individual(i)?);
            }
            state.tbox.abox.different.push(ids);
        }
        Axiom::FairnessConstraint(concepts) => {
            for c in concepts {
                let bp = state.translate(c)?;
                state.tbox.fairness.push(bp);
            }
        }
        _ => {}
    }
    Ok(())
}

// ---- classification helpers -------------------------------------------

/// Convert the told ontology to the EL surface syntax; `None` whenever any
/// axiom falls outside the fragment.
fn to_el_ontology(ontology: &Ontology) -> Option<ElOntology> {
    let mut el = ElOntology::new();
    for axiom in ontology.live() {
        match axiom {
            Axiom::Declare(_) => {}
            Axiom::ImpliesConcepts(sub, sup) => {
                let sub = to_el_expr(sub)?;
                for sup in split_el_rhs(sup)? {
                    el.add_inclusion(sub.clone(), sup);
                }
            }
            Axiom::EqualConcepts(concepts) => {
                for pair in concepts.windows(2) {
                    let (a, b) = (to_el_expr(&pair[0])?, to_el_expr(&pair[1])?);
                    el.add_inclusion(a.clone(), b.clone());
                    el.add_inclusion(b, a);
                }
            }
            Axiom::ORoleDomain(role, concept) => {
                let (name, inverted) = role.normalized();
                if inverted {
                    return None;
                }
                let c = to_el_expr(concept)?;
                el.add_inclusion(ElExpr::exists(name, ElExpr::Top), c);
            }
            Axiom::ImpliesORoles(r, s) => {
                let (rn, ri) = r.normalized();
                let (sn, si) = s.normalized();
                if ri || si {
                    return None;
                }
                el.add_role_inclusion(rn, sn);
            }
            Axiom::ImpliesORoleChain(chain, s) => {
                if chain.len() != 2 {
                    return None;
                }
                let (an, ai) = chain[0].normalized();
                let (bn, bi) = chain[1].normalized();
                let (sn, si) = s.normalized();
                if ai || bi || si {
                    return None;
                }
                el.add_role_chain(an, bn, sn);
            }
            Axiom::ORoleFlag(r, RoleFlag::Transitive) => {
                let (name, inverted) = r.normalized();
                if inverted {
                    return None;
                }
                el.add_role_chain(name, name, name);
            }
            _ => return None,
        }
    }
    Some(el)
}

fn to_el_expr(expr: &ConceptExpr) -> Option<ElExpr> {
    match expr {
        ConceptExpr::Top => Some(ElExpr::Top),
        ConceptExpr::Bottom => Some(ElExpr::Bottom),
        ConceptExpr::Name(n) => Some(ElExpr::Name(n.clone())),
        ConceptExpr::And(ops) => {
            let converted: Option<Vec<ElExpr>> = ops.iter().map(to_el_expr).collect();
            Some(ElExpr::And(converted?))
        }
        ConceptExpr::Exists(role, c) => {
            let (name, inverted) = role.normalized();
            if inverted {
                return None;
            }
            Some(ElExpr::Exists(name.to_string(), Box::new(to_el_expr(c)?)))
        }
        _ => None,
    }
}

/// `C ⊑ D₁ ⊓ D₂` splits into one inclusion per conjunct.
fn split_el_rhs(expr: &ConceptExpr) -> Option<Vec<ElExpr>> {
    match expr {
        ConceptExpr::And(ops) => {
            let mut out = Vec::with_capacity(ops.len());
            for op in ops {
                out.extend(split_el_rhs(op)?);
            }
            Some(out)
        }
        other => Some(vec![to_el_expr(other)?]),
    }
}

fn named_concepts(state: &KbState) -> Vec<String> {
    state
        .tbox
        .concepts
        .iter()
        .map(|c| c.name.clone())
        .filter(|n| !n.starts_with("__fresh_"))
        .collect()
}

fn el_taxonomy(state: &KbState, el: &ElReasoner) -> Taxonomy {
    let names = named_concepts(state);
    let unsat = el.unsatisfiable_concepts();
    build_taxonomy(&names, |name| Ok(unsat.contains(name)), |sub, sup| {
        Ok(el.is_subsumed_by(sub, sup).unwrap_or(sub == sup))
    })
    .expect("EL tests are infallible")
}

fn tableau_taxonomy(
    state: &mut KbState,
    config: &EngineConfig,
    cancel: &CancelFlag,
) -> Result<Taxonomy, KernelError> {
    let names = named_concepts(state);
    // prove satisfiability of every named concept first; the model caches
    // this builds prune the subsumption tests below
    let mut sat = HashMap::new();
    for name in &names {
        let bp = state.tbox.concepts[state.concept_ids[name].0 as usize].bp;
        sat.insert(name.clone(), state.run_satisfiable(bp, config, cancel)?);
    }
    let test = move |sub: &str, sup: &str| -> Result<bool, KernelError> {
        if sub == sup {
            return Ok(true);
        }
        let sub_bp = state.tbox.concepts[state.concept_ids[sub].0 as usize].bp;
        let sup_bp = state.tbox.concepts[state.concept_ids[sup].0 as usize].bp;
        let query = state.tbox.dag.and(vec![sub_bp, sup_bp.inverse()]);
        Ok(!state.run_satisfiable(query, config, cancel)?)
    };
    build_taxonomy(&names, |name| Ok(!sat[name]), test)
}

/// Enhanced-traversal-style insertion: for each concept, a memoised
/// top-down search finds the minimal supers and a bottom-up search the
/// maximal subs; a vertex in both sets absorbs the name as a synonym.
fn build_taxonomy(
    names: &[String],
    mut unsat: impl FnMut(&str) -> Result<bool, KernelError>,
    mut test: impl FnMut(&str, &str) -> Result<bool, KernelError>,
) -> Result<Taxonomy, KernelError> {
    let mut tax = Taxonomy::new();
    for name in names {
        if unsat(name)? {
            tax.add_synonym(BOTTOM_VERTEX, name);
            continue;
        }
        let parents = top_search(&tax, name, &mut test)?;
        let children = bottom_search(&tax, name, &mut test)?;
        if let Some(&v) = parents.intersection(&children).next() {
            tax.add_synonym(v, name);
            continue;
        }
        tax.insert(name, &parents, &children);
    }
    Ok(tax)
}

fn vertex_holds(
    tax: &Taxonomy,
    v: usize,
    name: &str,
    up: bool,
    memo: &mut HashMap<usize, bool>,
    test: &mut impl FnMut(&str, &str) -> Result<bool, KernelError>,
) -> Result<bool, KernelError> {
    if let Some(&cached) = memo.get(&v) {
        return Ok(cached);
    }
    let holds = if up {
        // does name ⊑ vertex hold?
        v == TOP_VERTEX || (v != BOTTOM_VERTEX && test(name, &tax.vertex(v).equivalents[0])?)
    } else {
        // does vertex ⊑ name hold?
        v == BOTTOM_VERTEX || (v != TOP_VERTEX && test(&tax.vertex(v).equivalents[0], name)?)
    };
    memo.insert(v, holds);
    Ok(holds)
}

fn top_search(
    tax: &Taxonomy,
    name: &str,
    test: &mut impl FnMut(&str, &str) -> Result<bool, KernelError>,
) -> Result<BTreeSet<usize>, KernelError> {
    let mut memo = HashMap::new();
    let mut result = BTreeSet::new();
    let mut stack = vec![TOP_VERTEX];
    let mut visited = BTreeSet::new();
    while let Some(v) = stack.pop() {
        if !visited.insert(v) {
            continue;
        }
        let mut narrower = Vec::new();
        for &c in &tax.vertex(v).children {
            if c != BOTTOM_VERTEX && vertex_holds(tax, c, name, true, &mut memo, test)? {
                narrower.push(c);
            }
        }
        if narrower.is_empty() {
            result.insert(v);
        } else {
            stack.extend(narrower);
        }
    }
    Ok(result)
}

fn bottom_search(
    tax: &Taxonomy,
    name: &str,
    test: &mut impl FnMut(&str, &str) -> Result<bool, KernelError>,
) -> Result<BTreeSet<usize>, KernelError> {
    let mut memo = HashMap::new();
    let mut result = BTreeSet::new();
    let mut stack = vec![BOTTOM_VERTEX];
    let mut visited = BTreeSet::new();
    while let Some(v) = stack.pop() {
        if !visited.insert(v) {
            continue;
        }
        let mut wider = Vec::new();
        for &p in &tax.vertex(v).parents {
            if p != TOP_VERTEX && vertex_holds(tax, p, name, false, &mut memo, test)? {
                wider.push(p);
            }
        }
        if wider.is_empty() {
            result.insert(v);
        } else {
            stack.extend(wider);
        }
    }
    Ok(result)
}
