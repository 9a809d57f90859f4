//! 知識ベース状態の保存と読み込み

use crate::kernel::{KbState, ReasoningKernel};
use crate::ontology::EntityKind;
use crate::taxonomy::Taxonomy;
use crate::KernelError;
use mimizuku_core::{ConceptId, Dag, IndividualId};
use mimizuku_rbox::RoleBox;
use mimizuku_tableau::{
    AboxData, CacheStore, ConceptInfo, EngineConfig, IndividualInfo, SplitDef, Tbox,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};

/// Literal header identifying the persisted format; a mismatch rejects the
/// whole file.
pub const STATE_HEADER: &str = "mimizuku kb state 1";

/// On-disk layout: options, role master, DAG, registries, taxonomy and KB
/// status, in declaration order.
#[derive(Serialize, Deserialize)]
struct SavedState {
    options: EngineConfig,
    roles: RoleBox,
    dag: Dag,
    concepts: Vec<ConceptInfo>,
    individuals: Vec<IndividualInfo>,
    gci: mimizuku_core::Bp,
    fairness: Vec<mimizuku_core::Bp>,
    splits: Vec<SplitDef>,
    abox: AboxData,
    entities: HashMap<String, EntityKind>,
    taxonomy: Option<Taxonomy>,
    consistent: bool,
}

impl ReasoningKernel {
    /// Serialise the built state; the KB is built first if necessary.
    pub fn save<W: Write>(&mut self, mut writer: W) -> Result<(), KernelError> {
        self.is_consistent()?;
        let state = self.state.as_ref().expect("state built by is_consistent");
        let saved = SavedState {
            options: self.config().clone(),
            roles: state.tbox.rbox.clone(),
            dag: state.tbox.dag.clone(),
            concepts: state.tbox.concepts.clone(),
            individuals: state.tbox.individuals.clone(),
            gci: state.tbox.gci,
            fairness: state.tbox.fairness.clone(),
            splits: state.tbox.splits.clone(),
            abox: state.tbox.abox.clone(),
            entities: state.entities.clone(),
            taxonomy: state.taxonomy.clone(),
            consistent: state.consistent,
        };
        writeln!(writer, "{}", STATE_HEADER)?;
        serde_json::to_writer(&mut writer, &saved)?;
        Ok(())
    }

    /// Load a previously saved state. Any header mismatch is rejected.
    pub fn load<R: Read>(reader: R) -> Result<Self, KernelError> {
        let mut reader = BufReader::new(reader);
        let mut header = String::new();
        reader.read_line(&mut header)?;
        if header.trim_end() != STATE_HEADER {
            return Err(KernelError::Persistence(format!(
                "unrecognised state header '{}'",
                header.trim_end()
            )));
        }
        let saved: SavedState = serde_json::from_reader(reader)?;

        let mut dag = saved.dag;
        dag.rebuild_index();
        let mut roles = saved.roles;
        roles.rebuild_index();

        let mut tbox = Tbox::new(dag, roles);
        tbox.concepts = saved.concepts;
        tbox.individuals = saved.individuals;
        tbox.gci = saved.gci;
        tbox.fairness = saved.fairness;
        tbox.splits = saved.splits;
        tbox.abox = saved.abox;

        let concept_ids: HashMap<String, ConceptId> = tbox
            .concepts
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), ConceptId(i as u32)))
            .collect();
        let individual_ids: HashMap<String, IndividualId> = tbox
            .individuals
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), IndividualId(i as u32)))
            .collect();

        let state = KbState::from_loaded(
            tbox,
            CacheStore::new(),
            concept_ids,
            individual_ids,
            saved.entities,
            saved.consistent,
            saved.taxonomy,
        );
        Ok(ReasoningKernel::from_parts(saved.options, state))
    }
}
