use mimizuku_core::{Bp, ConceptId, Dag, DagVertex, RoleId};
use mimizuku_rbox::RoleBox;
use mimizuku_tableau::{
    CacheStore, CancelFlag, EngineConfig, SatEngine, SplitDef, Tbox,
};

fn named(dag: &mut Dag, concepts: &mut Vec<mimizuku_tableau::ConceptInfo>, name: &str) -> Bp {
    let id = ConceptId(concepts.len() as u32);
    let bp = dag.add(DagVertex::CName { concept: id });
    concepts.push(mimizuku_tableau::ConceptInfo {
        name: name.to_string(),
        bp,
        described: None,
        primitive: true,
    });
    bp
}

fn check_sat(tbox: &mut Tbox, c: Bp) -> bool {
    tbox.prepare_for_reasoning();
    let mut caches = CacheStore::new();
    let mut engine = SatEngine::new(tbox, &mut caches, EngineConfig::default(), CancelFlag::new());
    engine.is_satisfiable(c).expect("no interrupt configured")
}

#[test]
fn test_unsatisfiable_conjunction() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let a = named(&mut dag, &mut concepts, "A");
    let query = dag.and(vec![a, a.inverse()]);
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_satisfiable_atom() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let a = named(&mut dag, &mut concepts, "A");
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    assert!(check_sat(&mut tbox, a));
}

#[test]
fn test_disjunction_exhaustion_is_unsat() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let a = named(&mut dag, &mut concepts, "A");
    let b = named(&mut dag, &mut concepts, "B");
    let or = dag.or(vec![a, b]);
    let query = dag.and(vec![or, a.inverse(), b.inverse()]);
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_disjunction_picks_live_branch() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let a = named(&mut dag, &mut concepts, "A");
    let b = named(&mut dag, &mut concepts, "B");
    let or = dag.or(vec![a, b]);
    let query = dag.and(vec![or, a.inverse()]);
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    assert!(check_sat(&mut tbox, query));
}

#[test]
fn test_exists_forall_interaction() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let a = named(&mut dag, &mut concepts, "A");
    let some = dag.exists(r, a);
    let all = dag.forall(r, 0, a.inverse());
    let query = dag.and(vec![some, all]);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_transitive_role_propagation() {
    // ∃R.∃R.A ⊓ ∀R.¬A is unsatisfiable when R is transitive
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    rbox.set_transitive(r);
    let a = named(&mut dag, &mut concepts, "A");
    let inner = dag.exists(r, a);
    let some = dag.exists(r, inner);
    let all = dag.forall(r, 0, a.inverse());
    let query = dag.and(vec![some, all]);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_non_transitive_role_does_not_propagate() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let a = named(&mut dag, &mut concepts, "A");
    let inner = dag.exists(r, a);
    let some = dag.exists(r, inner);
    let all = dag.forall(r, 0, a.inverse());
    let query = dag.and(vec![some, all]);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    assert!(check_sat(&mut tbox, query));
}

#[test]
fn test_at_most_forces_clashing_merge() {
    // ≤1 R.⊤ ⊓ ∃R.A ⊓ ∃R.¬A: both successors must merge, so A ⊓ ¬A
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let a = named(&mut dag, &mut concepts, "A");
    let le = dag.at_most(1, r, Bp::TOP);
    let e1 = dag.exists(r, a);
    let e2 = dag.exists(r, a.inverse());
    let query = dag.and(vec![le, e1, e2]);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_at_most_merge_can_succeed() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let a = named(&mut dag, &mut concepts, "A");
    let b = named(&mut dag, &mut concepts, "B");
    let le = dag.at_most(1, r, Bp::TOP);
    let e1 = dag.exists(r, a);
    let e2 = dag.exists(r, b);
    let query = dag.and(vec![le, e1, e2]);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    assert!(check_sat(&mut tbox, query));
}

#[test]
fn test_at_least_against_at_most() {
    // ≥2 R.⊤ ⊓ ≤1 R.⊤: the two fresh successors are pairwise distinct
    let mut dag = Dag::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let ge2 = dag.at_least(2, r, Bp::TOP);
    let le1 = dag.at_most(1, r, Bp::TOP);
    let query = dag.and(vec![ge2, le1]);
    let mut tbox = Tbox::new(dag, rbox);
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_functional_role_merges_successors() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    rbox.set_functional(r);
    let a = named(&mut dag, &mut concepts, "A");
    let e1 = dag.exists(r, a);
    let e2 = dag.exists(r, a.inverse());
    let query = dag.and(vec![e1, e2]);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_cyclic_definition_terminates_via_blocking() {
    // C primitive with told subsumer ∃R.C: the chain is infinite without
    // blocking and the test must still come back satisfiable
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let c = named(&mut dag, &mut concepts, "C");
    let some_c = dag.exists(r, c);
    concepts[0].described = Some(some_c);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    assert!(check_sat(&mut tbox, c));
}

#[test]
fn test_gci_applies_to_fresh_nodes() {
    // ⊤ ⊑ ¬A makes A unsatisfiable everywhere, including successors
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let a = named(&mut dag, &mut concepts, "A");
    let some = dag.exists(r, a);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    tbox.gci = a.inverse();
    assert!(!check_sat(&mut tbox, some));
}

#[test]
fn test_choose_rule_over_split_options() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let a = named(&mut dag, &mut concepts, "A");
    let b = named(&mut dag, &mut concepts, "B");
    let choose = dag.add(DagVertex::Choose { concept: a });
    let both_refuted = dag.and(vec![choose, a.inverse(), b.inverse()]);
    let one_refuted = dag.and(vec![choose, a.inverse()]);
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    tbox.splits.push(SplitDef {
        choose_bp: choose,
        options: vec![a, b],
    });
    assert!(!check_sat(&mut tbox, both_refuted));
    assert!(check_sat(&mut tbox, one_refuted));
}

#[test]
fn test_datatype_clash_on_distinct_literals() {
    let mut dag = Dag::new();
    let mut rbox = RoleBox::new();
    let t = rbox.ensure_role("hasValue", true).unwrap();
    let v1 = dag.add(DagVertex::DataValue {
        datatype: "string".into(),
        literal: "a".into(),
    });
    let v2 = dag.add(DagVertex::DataValue {
        datatype: "string".into(),
        literal: "b".into(),
    });
    let e = dag.exists(t, v1);
    let all = dag.forall(t, 0, v2);
    let query = dag.and(vec![e, all]);
    let mut tbox = Tbox::new(dag, rbox);
    assert!(!check_sat(&mut tbox, query));
}

#[test]
fn test_cancellation_interrupts_run() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let a = named(&mut dag, &mut concepts, "A");
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    tbox.prepare_for_reasoning();

    let mut caches = CacheStore::new();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let mut engine = SatEngine::new(&tbox, &mut caches, EngineConfig::default(), cancel);
    assert!(matches!(
        engine.is_satisfiable(a),
        Err(mimizuku_tableau::EngineError::Cancelled)
    ));
}

#[test]
fn test_backjumping_config_off_still_sound() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let a = named(&mut dag, &mut concepts, "A");
    let b = named(&mut dag, &mut concepts, "B");
    let or1 = dag.or(vec![a, b]);
    let or2 = dag.or(vec![a, b.inverse()]);
    let query = dag.and(vec![or1, or2, a.inverse(), b.inverse()]);
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    tbox.prepare_for_reasoning();

    let mut caches = CacheStore::new();
    let config = EngineConfig {
        use_backjumping: false,
        use_semantic_branching: false,
        ..EngineConfig::default()
    };
    let mut engine = SatEngine::new(&tbox, &mut caches, config, CancelFlag::new());
    assert!(!engine.is_satisfiable(query).unwrap());
}

#[test]
fn test_fairness_downgrades_anywhere_blocking() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let f = named(&mut dag, &mut concepts, "F");
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    tbox.fairness.push(f);
    tbox.prepare_for_reasoning();

    let mut caches = CacheStore::new();
    let engine = SatEngine::new(&tbox, &mut caches, EngineConfig::default(), CancelFlag::new());
    assert!(!engine.blocking_config().anywhere);
}

#[test]
fn test_model_cache_reused_across_tests() {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let a = named(&mut dag, &mut concepts, "A");
    let some = dag.exists(r, a);
    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    tbox.prepare_for_reasoning();

    let mut caches = CacheStore::new();
    {
        let mut engine =
            SatEngine::new(&tbox, &mut caches, EngineConfig::default(), CancelFlag::new());
        assert!(engine.is_satisfiable(a).unwrap());
    }
    assert!(caches.get(a).is_some());
    {
        let mut engine =
            SatEngine::new(&tbox, &mut caches, EngineConfig::default(), CancelFlag::new());
        assert!(engine.is_satisfiable(some).unwrap());
        assert!(engine.stats.n_cache_hits > 0);
    }
}
