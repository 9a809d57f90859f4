use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mimizuku_core::{Bp, ConceptId, Dag, DagVertex};
use mimizuku_rbox::RoleBox;
use mimizuku_tableau::{CacheStore, CancelFlag, ConceptInfo, EngineConfig, SatEngine, Tbox};

/// Build ⊤-satisfiable `∃R.(A₁ ⊓ ∃R.(A₂ ⊓ …))` chains of the given depth.
fn deep_existential_chain(depth: usize) -> (Tbox, Bp) {
    let mut dag = Dag::new();
    let mut rbox = RoleBox::new();
    let r = rbox.ensure_role("R", false).unwrap();
    let mut concepts = Vec::new();

    let mut current = Bp::TOP;
    for i in 0..depth {
        let id = ConceptId(concepts.len() as u32);
        let a = dag.add(DagVertex::CName { concept: id });
        concepts.push(ConceptInfo {
            name: format!("A{}", i),
            bp: a,
            described: None,
            primitive: true,
        });
        let body = dag.and(vec![a, current]);
        current = dag.exists(r, body);
    }

    let mut tbox = Tbox::new(dag, rbox);
    tbox.concepts = concepts;
    tbox.prepare_for_reasoning();
    (tbox, current)
}

fn disjunction_ladder(width: usize) -> (Tbox, Bp) {
    let mut dag = Dag::new();
    let mut concepts = Vec::new();
    let mut conjuncts = Vec::new();
    for i in 0..width {
        let id = ConceptId(concepts.len() as u32);
        let a = dag.add(DagVertex::CName { concept: id });
        concepts.push(ConceptInfo {
            name: format!("A{}", i),
            bp: a,
            described: None,
            primitive: true,
        });
        let id2 = ConceptId(concepts.len() as u32);
        let b = dag.add(DagVertex::CName { concept: id2 });
        concepts.push(ConceptInfo {
            name: format!("B{}", i),
            bp: b,
            described: None,
            primitive: true,
        });
        conjuncts.push(dag.or(vec![a, b]));
    }
    let query = dag.and(conjuncts);
    let mut tbox = Tbox::new(dag, RoleBox::new());
    tbox.concepts = concepts;
    tbox.prepare_for_reasoning();
    (tbox, query)
}

fn bench_existential_chain(c: &mut Criterion) {
    let (tbox, query) = deep_existential_chain(40);
    c.bench_function("satisfiability_existential_chain_40", |bench| {
        bench.iter(|| {
            let mut caches = CacheStore::new();
            let mut engine = SatEngine::new(
                &tbox,
                &mut caches,
                EngineConfig::default(),
                CancelFlag::new(),
            );
            black_box(engine.is_satisfiable(query).unwrap())
        })
    });
}

fn bench_disjunction_ladder(c: &mut Criterion) {
    let (tbox, query) = disjunction_ladder(12);
    c.bench_function("satisfiability_disjunction_ladder_12", |bench| {
        bench.iter(|| {
            let mut caches = CacheStore::new();
            let mut engine = SatEngine::new(
                &tbox,
                &mut caches,
                EngineConfig::default(),
                CancelFlag::new(),
            );
            black_box(engine.is_satisfiable(query).unwrap())
        })
    });
}

criterion_group!(benches, bench_existential_chain, bench_disjunction_ladder);
criterion_main!(benches);
