//! EL 飽和推論エンジン
//!
//! このクレートは EL フラグメントの前向き連鎖分類器を提供します:
//! - S(C) (上位概念集合) と R(C,D) (役割対集合) の飽和
//! - 公理ごとのルールオブジェクト (CR1〜CR5, CR10, CR11)
//! - FIFO アクションキューによる多項式時間の不動点計算

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum ElError {
    #[error("axiom outside the EL fragment: {0}")]
    UnsupportedAxiom(String),

    #[error("unknown concept '{0}'")]
    UnknownConcept(String),

    #[error("saturation exceeded {0} steps")]
    MaxStepsExceeded(usize),
}

/// Saturation limits, in the spirit of an iteration-bounded closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElConfig {
    /// Upper bound on queue actions; the closure is polynomial, so this
    /// only guards against pathological inputs.
    pub max_steps: usize,
}

impl Default for ElConfig {
    fn default() -> Self {
        Self { max_steps: 10_000_000 }
    }
}

/// Concept expression of the EL surface syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElExpr {
    Top,
    Bottom,
    Name(String),
    And(Vec<ElExpr>),
    Exists(String, Box<ElExpr>),
}

impl ElExpr {
    pub fn name<S: Into<String>>(n: S) -> Self {
        ElExpr::Name(n.into())
    }

    pub fn exists<S: Into<String>>(role: S, filler: ElExpr) -> Self {
        ElExpr::Exists(role.into(), Box::new(filler))
    }

    fn is_atomic(&self) -> bool {
        matches!(self, ElExpr::Top | ElExpr::Bottom | ElExpr::Name(_))
    }
}

/// Input ontology restricted to the ⊥/⊓/∃ fragment:
/// `C ⊑ D`, `C₁⊓C₂ ⊑ D`, `∃R.C ⊑ D`, `C ⊑ ∃R.D`, `R ⊑ S`, `R∘S ⊑ T`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElOntology {
    pub inclusions: Vec<(ElExpr, ElExpr)>,
    pub role_inclusions: Vec<(String, String)>,
    pub role_chains: Vec<((String, String), String)>,
}

impl ElOntology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inclusion(&mut self, sub: ElExpr, sup: ElExpr) {
        self.inclusions.push((sub, sup));
    }

    pub fn add_role_inclusion<S: Into<String>>(&mut self, sub: S, sup: S) {
        self.role_inclusions.push((sub.into(), sup.into()));
    }

    pub fn add_role_chain<S: Into<String>>(&mut self, first: S, second: S, sup: S) {
        self.role_chains.push(((first.into(), second.into()), sup.into()));
    }
}

type CId = usize;
type RId = usize;

const BOTTOM: CId = 0;
const TOP: CId = 1;

/// Rule attached to a concept Y; fires when Y is added to some S(X).
#[derive(Debug, Clone)]
enum ConceptRule {
    /// `Y ⊑ D` (CR1): D joins S(X).
    Sub { sup: CId },
    /// `Y ⊓ C ⊑ D` (CR2): D joins S(X) once C is there too.
    AndSub { conj: CId, sup: CId },
    /// `Y ⊑ ∃R.D` (CR3): the pair (X, D) joins R.
    ExistAdd { role: RId, filler: CId },
    /// `∃R.Y ⊑ D` (CR4, filler side): for every Z with R(Z, X), D joins S(Z).
    ExistSubFiller { role: RId, sup: CId },
}

/// Rule attached to a role R; fires when (X, Y) is added to R.
#[derive(Debug, Clone)]
enum RoleRule {
    /// `∃R.C ⊑ D` (CR4, role side): D joins S(X) once C ∈ S(Y).
    ExistSub { filler: CId, sup: CId },
    /// `R ⊑ S` (CR10): the pair joins S as well.
    Sub { sup: RId },
    /// `R∘S ⊑ T`, triggered on the left conjunct (CR11).
    ChainLeft { second: RId, sup: RId },
    /// `R∘S ⊑ T`, triggered on the right conjunct (CR11).
    ChainRight { first: RId, sup: RId },
}

#[derive(Debug, Clone, Default)]
struct ConceptData {
    name: Option<String>,
    supers: BTreeSet<CId>,
    rules: Vec<ConceptRule>,
}

#[derive(Debug, Clone, Default)]
struct RoleData {
    name: String,
    pairs: BTreeSet<(CId, CId)>,
    by_first: HashMap<CId, Vec<CId>>,
    by_second: HashMap<CId, Vec<CId>>,
    rules: Vec<RoleRule>,
}

/// One queued rule firing.
#[derive(Debug, Clone, Copy)]
enum ElAction {
    Super(CId, CId),
    Link(RId, CId, CId),
}

/// The saturation classifier: build once, `classify()` to the fixpoint,
/// then read subsumptions off S(C).
#[derive(Debug, Default)]
pub struct ElReasoner {
    concepts: Vec<ConceptData>,
    concept_ids: HashMap<String, CId>,
    roles: Vec<RoleData>,
    role_ids: HashMap<String, RId>,
    queue: VecDeque<ElAction>,
    config: ElConfig,
    classified: bool,
    // axiom-shape counters, reported after compilation
    n_sub: usize,
    n_and: usize,
    n_exist_sub: usize,
    n_exist_add: usize,
    n_role_sub: usize,
    n_chain: usize,
}

impl ElReasoner {
    pub fn new(ontology: &ElOntology) -> Result<Self, ElError> {
        Self::with_config(ontology, ElConfig::default())
    }

    pub fn with_config(ontology: &ElOntology, config: ElConfig) -> Result<Self, ElError> {
        let mut reasoner = Self {
            config,
            ..Self::default()
        };
        reasoner.intern_special();
        for (sub, sup) in &ontology.inclusions {
            reasoner.compile_inclusion(sub, sup)?;
        }
        for (sub, sup) in &ontology.role_inclusions {
            let (r, s) = (reasoner.role(sub), reasoner.role(sup));
            reasoner.roles[r].rules.push(RoleRule::Sub { sup: s });
            reasoner.n_role_sub += 1;
        }
        for ((first, second), sup) in &ontology.role_chains {
            let (r, s, t) = (
                reasoner.role(first),
                reasoner.role(second),
                reasoner.role(sup),
            );
            reasoner.roles[r].rules.push(RoleRule::ChainLeft { second: s, sup: t });
            reasoner.roles[s].rules.push(RoleRule::ChainRight { first: r, sup: t });
            reasoner.n_chain += 1;
        }
        debug!(
            sub = reasoner.n_sub,
            and_sub = reasoner.n_and,
            exist_sub = reasoner.n_exist_sub,
            exist_add = reasoner.n_exist_add,
            role_sub = reasoner.n_role_sub,
            chains = reasoner.n_chain,
            "compiled EL ontology"
        );
        Ok(reasoner)
    }

    fn intern_special(&mut self) {
        debug_assert!(self.concepts.is_empty());
        self.concepts.push(ConceptData::default()); // ⊥
        self.concepts.push(ConceptData::default()); // ⊤
    }

    fn concept(&mut self, expr: &ElExpr) -> Result<CId, ElError> {
        match expr {
            ElExpr::Bottom => Ok(BOTTOM),
            ElExpr::Top => Ok(TOP),
            ElExpr::Name(n) => Ok(self.named_concept(n)),
            other => Err(ElError::UnsupportedAxiom(format!("{:?}", other))),
        }
    }

    fn named_concept(&mut self, name: &str) -> CId {
        if let Some(&id) = self.concept_ids.get(name) {
            return id;
        }
        let id = self.concepts.len();
        self.concepts.push(ConceptData {
            name: Some(name.to_string()),
            ..ConceptData::default()
        });
        self.concept_ids.insert(name.to_string(), id);
        id
    }

    fn role(&mut self, name: &str) -> RId {
        if let Some(&id) = self.role_ids.get(name) {
            return id;
        }
        let id = self.roles.len();
        self.roles.push(RoleData {
            name: name.to_string(),
            ..RoleData::default()
        });
        self.role_ids.insert(name.to_string(), id);
        id
    }

    fn compile_inclusion(&mut self, sub: &ElExpr, sup: &ElExpr) -> Result<(), ElError> {
        // C ⊑ ∃R.D comes first, mirroring the original's dispatch order
        if let ElExpr::Exists(role, filler) = sup {
            if !sub.is_atomic() || !filler.is_atomic() {
                return Err(ElError::UnsupportedAxiom(format!("{:?} ⊑ {:?}", sub, sup)));
            }
            let c = self.concept(sub)?;
            let d = self.concept(filler)?;
            let r = self.role(role);
            self.concepts[c].rules.push(ConceptRule::ExistAdd { role: r, filler: d });
            self.n_exist_add += 1;
            return Ok(());
        }
        let d = self.concept(sup)?;
        match sub {
            ElExpr::Exists(role, filler) => {
                if !filler.is_atomic() {
                    return Err(ElError::UnsupportedAxiom(format!("{:?} ⊑ {:?}", sub, sup)));
                }
                let c = self.concept(filler)?;
                let r = self.role(role);
                // both trigger sides of CR4: the pair arriving in R, and the
                // filler arriving in S(Y) with the pair already present
                self.roles[r].rules.push(RoleRule::ExistSub { filler: c, sup: d });
                self.concepts[c].rules.push(ConceptRule::ExistSubFiller { role: r, sup: d });
                self.n_exist_sub += 1;
            }
            ElExpr::And(ops) => {
                if ops.len() != 2 || !ops[0].is_atomic() || !ops[1].is_atomic() {
                    return Err(ElError::UnsupportedAxiom(format!("{:?} ⊑ {:?}", sub, sup)));
                }
                let c1 = self.concept(&ops[0])?;
                let c2 = self.concept(&ops[1])?;
                self.concepts[c1].rules.push(ConceptRule::AndSub { conj: c2, sup: d });
                self.concepts[c2].rules.push(ConceptRule::AndSub { conj: c1, sup: d });
                self.n_and += 1;
            }
            atomic if atomic.is_atomic() => {
                let c = self.concept(atomic)?;
                self.concepts[c].rules.push(ConceptRule::Sub { sup: d });
                self.n_sub += 1;
            }
            other => {
                return Err(ElError::UnsupportedAxiom(format!("{:?} ⊑ {:?}", other, sup)));
            }
        }
        Ok(())
    }

    /// Run the completion to its fixpoint.
    pub fn classify(&mut self) -> Result<(), ElError> {
        if self.classified {
            return Ok(());
        }
        for c in 0..self.concepts.len() {
            self.queue.push_back(ElAction::Super(c, TOP));
            self.queue.push_back(ElAction::Super(c, c));
        }
        let mut steps = 0usize;
        while let Some(action) = self.queue.pop_front() {
            steps += 1;
            if steps > self.config.max_steps {
                return Err(ElError::MaxStepsExceeded(self.config.max_steps));
            }
            match action {
                ElAction::Super(x, y) => self.process_super(x, y),
                ElAction::Link(r, x, y) => self.process_link(r, x, y),
            }
        }
        debug!(steps, concepts = self.concepts.len(), "saturation finished");
        self.classified = true;
        Ok(())
    }

    /// `y` joins S(`x`); fire the rules watching `y`.
    fn process_super(&mut self, x: CId, y: CId) {
        if !self.concepts[x].supers.insert(y) {
            return;
        }
        // CR5: ⊥ flows backwards over every link
        if y == BOTTOM {
            for role in 0..self.roles.len() {
                if let Some(preds) = self.roles[role].by_second.get(&x) {
                    for &p in preds.clone().iter() {
                        self.queue.push_back(ElAction::Super(p, BOTTOM));
                    }
                }
            }
        }
        for rule in self.concepts[y].rules.clone() {
            match rule {
                ConceptRule::Sub { sup } => {
                    self.queue.push_back(ElAction::Super(x, sup));
                }
                ConceptRule::AndSub { conj, sup } => {
                    if self.concepts[x].supers.contains(&conj) {
                        self.queue.push_back(ElAction::Super(x, sup));
                    }
                }
                ConceptRule::ExistAdd { role, filler } => {
                    self.queue.push_back(ElAction::Link(role, x, filler));
                }
                ConceptRule::ExistSubFiller { role, sup } => {
                    if let Some(preds) = self.roles[role].by_second.get(&x) {
                        for &p in preds.clone().iter() {
                            self.queue.push_back(ElAction::Super(p, sup));
                        }
                    }
                }
            }
        }
    }

    /// `(x, y)` joins R; fire the rules watching R.
    fn process_link(&mut self, r: RId, x: CId, y: CId) {
        if !self.roles[r].pairs.insert((x, y)) {
            return;
        }
        self.roles[r].by_first.entry(x).or_default().push(y);
        self.roles[r].by_second.entry(y).or_default().push(x);
        // CR5 on the link side
        if self.concepts[y].supers.contains(&BOTTOM) {
            self.queue.push_back(ElAction::Super(x, BOTTOM));
        }
        for rule in self.roles[r].rules.clone() {
            match rule {
                RoleRule::ExistSub { filler, sup } => {
                    if self.concepts[y].supers.contains(&filler) {
                        self.queue.push_back(ElAction::Super(x, sup));
                    }
                }
                RoleRule::Sub { sup } => {
                    self.queue.push_back(ElAction::Link(sup, x, y));
                }
                RoleRule::ChainLeft { second, sup } => {
                    if let Some(nexts) = self.roles[second].by_first.get(&y) {
                        for &z in nexts.clone().iter() {
                            self.queue.push_back(ElAction::Link(sup, x, z));
                        }
                    }
                }
                RoleRule::ChainRight { first, sup } => {
                    if let Some(prevs) = self.roles[first].by_second.get(&x) {
                        for &w in prevs.clone().iter() {
                            self.queue.push_back(ElAction::Link(sup, w, y));
                        }
                    }
                }
            }
        }
    }

    // ---- queries -------------------------------------------------------

    /// Named subsumers of a named concept, the concept itself included.
    pub fn subsumers(&self, name: &str) -> Result<BTreeSet<String>, ElError> {
        let &id = self
            .concept_ids
            .get(name)
            .ok_or_else(|| ElError::UnknownConcept(name.to_string()))?;
        Ok(self.concepts[id]
            .supers
            .iter()
            .filter_map(|&s| self.concepts[s].name.clone())
            .collect())
    }

    pub fn is_subsumed_by(&self, sub: &str, sup: &str) -> Result<bool, ElError> {
        let &a = self
            .concept_ids
            .get(sub)
            .ok_or_else(|| ElError::UnknownConcept(sub.to_string()))?;
        let &b = self
            .concept_ids
            .get(sup)
            .ok_or_else(|| ElError::UnknownConcept(sup.to_string()))?;
        Ok(self.concepts[a].supers.contains(&b))
    }

    /// Concepts equivalent to ⊥ after saturation.
    pub fn unsatisfiable_concepts(&self) -> BTreeSet<String> {
        self.concepts
            .iter()
            .filter(|c| c.supers.contains(&BOTTOM))
            .filter_map(|c| c.name.clone())
            .collect()
    }

    pub fn named_concepts(&self) -> impl Iterator<Item = &str> {
        self.concepts.iter().filter_map(|c| c.name.as_deref())
    }
}
