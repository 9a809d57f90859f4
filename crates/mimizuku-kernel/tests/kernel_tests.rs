use mimizuku_core::{ConceptExpr, RoleExpr};
use mimizuku_kernel::{Declaration, EntityKind, KbStatus, KernelError, ReasoningKernel};

fn name(n: &str) -> ConceptExpr {
    ConceptExpr::name(n)
}

fn role(n: &str) -> RoleExpr {
    RoleExpr::named(n)
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_status_progression() {
        let mut kernel = ReasoningKernel::new();
        assert_eq!(kernel.status(), KbStatus::Empty);
        kernel.implies_concepts(name("A"), name("B"));
        assert_eq!(kernel.status(), KbStatus::Loading);
        kernel.is_consistent().unwrap();
        assert_eq!(kernel.status(), KbStatus::Checked);
        kernel.classify().unwrap();
        assert_eq!(kernel.status(), KbStatus::Classified);
        kernel.realise().unwrap();
        assert_eq!(kernel.status(), KbStatus::Realised);
    }

    #[test]
    fn test_retraction_forces_rebuild() {
        let mut kernel = ReasoningKernel::new();
        let h = kernel.implies_concepts(name("A"), name("B"));
        assert!(kernel.is_subsumed_by(&name("A"), &name("B")).unwrap());
        kernel.retract(h);
        assert_eq!(kernel.status(), KbStatus::Loading);
        assert!(!kernel.is_subsumed_by(&name("A"), &name("B")).unwrap());
    }

    #[test]
    fn test_inconsistent_kb_blocks_queries() {
        let mut kernel = ReasoningKernel::new();
        kernel.instance_of("a", name("A"));
        kernel.instance_of("a", name("A").not());
        assert!(!kernel.is_consistent().unwrap());
        assert!(matches!(
            kernel.is_satisfiable(&name("A")),
            Err(KernelError::InconsistentKb)
        ));
    }

    #[test]
    fn test_name_clash_between_categories() {
        let mut kernel = ReasoningKernel::new();
        kernel.declare(Declaration {
            name: "Thing".into(),
            kind: EntityKind::Concept,
        });
        kernel.declare(Declaration {
            name: "Thing".into(),
            kind: EntityKind::ObjectRole,
        });
        assert!(matches!(
            kernel.is_consistent(),
            Err(KernelError::NameClash { .. })
        ));
    }
}

mod subsumption_tests {
    use super::*;

    #[test]
    fn test_unsatisfiable_conjunction() {
        let mut kernel = ReasoningKernel::new();
        let query = name("A").and(name("A").not());
        assert!(!kernel.is_satisfiable(&query).unwrap());
    }

    #[test]
    fn test_told_subsumption() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_concepts(name("Dog"), name("Mammal"));
        kernel.implies_concepts(name("Mammal"), name("Animal"));
        assert!(kernel.is_subsumed_by(&name("Dog"), &name("Animal")).unwrap());
        assert!(!kernel.is_subsumed_by(&name("Animal"), &name("Dog")).unwrap());
    }

    #[test]
    fn test_defined_concept_equivalence() {
        let mut kernel = ReasoningKernel::new();
        kernel.equal_concepts(vec![
            name("Parent"),
            ConceptExpr::exists(role("hasChild"), name("Person")),
        ]);
        kernel.implies_concepts(name("Father"), name("Parent"));
        assert!(kernel
            .is_subsumed_by(
                &name("Father"),
                &ConceptExpr::exists(role("hasChild"), name("Person"))
            )
            .unwrap());
        // the definition works in both directions
        assert!(kernel
            .is_subsumed_by(
                &ConceptExpr::exists(role("hasChild"), name("Person")),
                &name("Parent")
            )
            .unwrap());
    }

    #[test]
    fn test_disjoint_concepts() {
        let mut kernel = ReasoningKernel::new();
        kernel.disjoint_concepts(vec![name("Cat"), name("Dog")]);
        assert!(kernel.is_disjoint(&name("Cat"), &name("Dog")).unwrap());
        assert!(!kernel.is_satisfiable(&name("Cat").and(name("Dog"))).unwrap());
        assert!(kernel.is_satisfiable(&name("Cat")).unwrap());
    }

    #[test]
    fn test_domain_and_range() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_o_domain(role("hasChild"), name("Parent"));
        kernel.set_o_range(role("hasChild"), name("Person"));
        assert!(kernel
            .is_subsumed_by(
                &ConceptExpr::exists(role("hasChild"), ConceptExpr::Top),
                &name("Parent")
            )
            .unwrap());
        assert!(!kernel
            .is_satisfiable(
                &ConceptExpr::exists(role("hasChild"), name("Person").not())
            )
            .unwrap());
    }
}

mod role_property_tests {
    use super::*;

    #[test]
    fn test_declared_transitivity_is_detected() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_transitive(role("ancestorOf"));
        assert!(kernel.is_transitive_role(&role("ancestorOf")).unwrap());
    }

    #[test]
    fn test_plain_role_is_not_transitive() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_o_roles(role("R"), role("S"));
        assert!(!kernel.is_transitive_role(&role("R")).unwrap());
    }

    #[test]
    fn test_declared_functionality_is_detected() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_functional(role("hasFather"));
        assert!(kernel.is_functional_role(&role("hasFather")).unwrap());
        kernel.implies_o_roles(role("other"), role("another"));
        assert!(!kernel.is_functional_role(&role("other")).unwrap());
    }

    #[test]
    fn test_role_hierarchy_subsumption() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_o_roles(role("hasSon"), role("hasChild"));
        assert!(kernel.is_sub_role_of(&role("hasSon"), &role("hasChild")).unwrap());
        assert!(!kernel.is_sub_role_of(&role("hasChild"), &role("hasSon")).unwrap());
    }

    #[test]
    fn test_symmetric_role_detected() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_symmetric(role("marriedTo"));
        assert!(kernel.is_symmetric_role(&role("marriedTo")).unwrap());
    }

    #[test]
    fn test_sub_chain_via_transitivity() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_transitive(role("partOf"));
        assert!(kernel
            .is_sub_chain_of(&[role("partOf"), role("partOf")], &role("partOf"))
            .unwrap());
    }
}

mod abox_tests {
    use super::*;

    #[test]
    fn test_instance_retrieval() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_concepts(name("Dog"), name("Animal"));
        kernel.instance_of("rex", name("Dog"));
        kernel.instance_of("tom", name("Cat"));
        assert!(kernel.is_instance_of("rex", &name("Animal")).unwrap());
        assert!(!kernel.is_instance_of("tom", &name("Animal")).unwrap());

        let mut found = Vec::new();
        kernel
            .instances(&name("Animal"), &mut |eq: &[String]| {
                found.push(eq[0].clone());
                true
            })
            .unwrap();
        assert_eq!(found, vec!["rex".to_string()]);
    }

    #[test]
    fn test_related_individuals_propagate_universals() {
        let mut kernel = ReasoningKernel::new();
        kernel.related_to("a", role("R"), "b");
        kernel.instance_of("a", ConceptExpr::forall(role("R"), name("B")));
        assert!(kernel.is_instance_of("b", &name("B")).unwrap());
    }

    #[test]
    fn test_functional_role_merges_fillers() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_functional(role("hasFather"));
        kernel.related_to("child", role("hasFather"), "x");
        kernel.related_to("child", role("hasFather"), "y");
        assert!(kernel.is_consistent().unwrap());
        assert!(kernel.is_same_individuals("x", "y").unwrap());
    }

    #[test]
    fn test_different_individuals_clash_with_functionality() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_functional(role("hasFather"));
        kernel.related_to("child", role("hasFather"), "x");
        kernel.related_to("child", role("hasFather"), "y");
        kernel.different_individuals(vec!["x".into(), "y".into()]);
        assert!(!kernel.is_consistent().unwrap());
    }

    #[test]
    fn test_negative_role_assertion() {
        let mut kernel = ReasoningKernel::new();
        kernel.related_to("a", role("R"), "b");
        kernel.related_to_not("a", role("R"), "b");
        assert!(!kernel.is_consistent().unwrap());
    }

    #[test]
    fn test_data_values() {
        let mut kernel = ReasoningKernel::new();
        kernel.set_d_functional("hasAge");
        kernel.value_of("alice", "hasAge", "integer", "30");
        assert!(kernel.is_consistent().unwrap());
        kernel.value_of("alice", "hasAge", "integer", "31");
        assert!(!kernel.is_consistent().unwrap());
    }
}

mod classification_tests {
    use super::*;

    #[test]
    fn test_taxonomy_with_equivalence() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_concepts(name("Dog"), name("Mammal"));
        kernel.implies_concepts(name("Mammal"), name("Animal"));
        kernel.equal_concepts(vec![name("Hound"), name("Dog")]);
        kernel.classify().unwrap();
        let tax = kernel.taxonomy().unwrap();
        assert_eq!(tax.subsumed_by("Dog", "Animal"), Some(true));
        assert_eq!(tax.subsumed_by("Hound", "Mammal"), Some(true));
        // Hound and Dog share a vertex
        assert_eq!(tax.find("Hound"), tax.find("Dog"));
    }

    #[test]
    fn test_unsatisfiable_concept_lands_on_bottom() {
        let mut kernel = ReasoningKernel::new();
        kernel.disjoint_concepts(vec![name("A"), name("B")]);
        kernel.implies_concepts(name("C"), name("A").and(name("B")));
        kernel.classify().unwrap();
        let tax = kernel.taxonomy().unwrap();
        assert_eq!(tax.find("C"), tax.find("BOTTOM"));
    }

    #[test]
    fn test_actor_iteration_over_supers() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_concepts(name("Dog"), name("Mammal"));
        kernel.implies_concepts(name("Mammal"), name("Animal"));
        kernel.classify().unwrap();
        let mut supers = Vec::new();
        kernel
            .get_supers("Dog", false, &mut |eq: &[String]| {
                supers.push(eq[0].clone());
                true
            })
            .unwrap();
        assert!(supers.contains(&"Mammal".to_string()));
        assert!(supers.contains(&"Animal".to_string()));
        assert!(supers.contains(&"TOP".to_string()));
    }

    #[test]
    fn test_el_fast_path_agrees_with_tableau() {
        // the EL-expressible ontology classifies through saturation; the
        // subsumption query below re-derives the result via the tableau
        let mut kernel = ReasoningKernel::new();
        kernel.implies_concepts(
            name("Parent"),
            ConceptExpr::exists(role("hasChild"), name("Person")),
        );
        kernel.implies_concepts(name("Person"), name("Animal"));
        kernel.classify().unwrap();
        assert!(kernel
            .is_subsumed_by(
                &name("Parent"),
                &ConceptExpr::exists(role("hasChild"), name("Animal"))
            )
            .unwrap());
    }

    #[test]
    fn test_types_via_realisation() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_concepts(name("Dog"), name("Animal"));
        kernel.instance_of("rex", name("Dog"));
        let mut types = Vec::new();
        kernel
            .get_types("rex", &mut |eq: &[String]| {
                types.push(eq[0].clone());
                true
            })
            .unwrap();
        assert!(types.contains(&"Dog".to_string()));
        assert!(types.contains(&"Animal".to_string()));
    }
}

mod cancellation_tests {
    use super::*;

    #[test]
    fn test_cancel_flag_aborts() {
        let mut kernel = ReasoningKernel::new();
        kernel.implies_concepts(name("A"), name("B"));
        kernel.cancel_flag().cancel();
        assert!(matches!(
            kernel.is_consistent(),
            Err(KernelError::Cancelled)
        ));
    }
}
