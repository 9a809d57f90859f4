//! # 🦉 Mimizuku - Rust Description Logic Reasoning Stack
//!
//! Mimizuku is a tableau-based reasoner for expressive description logics,
//! the formalism underlying OWL ontologies. It answers concept
//! satisfiability, subsumption, classification and instance retrieval over
//! a knowledge base of terminological axioms, role axioms and individual
//! assertions.
//!
//! ## Features
//!
//! - **🚀 Dependency-directed tableau engine**: semantic branching,
//!   backjumping, blocking and model caching
//! - **🦉 EL saturation fast path**: polynomial classification for the
//!   Horn-like fragment
//! - **🔍 Conjunctive query folding**: connected queries reduce to concept
//!   satisfiability checks
//! - **🔧 Rust Ecosystem**: memory-safe, deterministic, single-threaded
//!   cooperative reasoning sessions
//!
//! ## Quick Start
//!
//! ```rust
//! use mimizuku::prelude::*;
//!
//! let mut kernel = ReasoningKernel::new();
//! kernel.set_transitive(RoleExpr::named("ancestorOf"));
//! kernel.implies_concepts(
//!     ConceptExpr::name("Human"),
//!     ConceptExpr::exists(RoleExpr::named("ancestorOf"), ConceptExpr::name("Human")),
//! );
//! assert!(kernel.is_satisfiable(&ConceptExpr::name("Human")).unwrap());
//! ```
//!
//! ## Architecture
//!
//! Mimizuku consists of several specialized crates:
//!
//! - **`mimizuku-core`**: expression DAG, bipolar pointers, dependency sets
//! - **`mimizuku-rbox`**: role hierarchy and role automata
//! - **`mimizuku-tableau`**: the satisfiability engine
//! - **`mimizuku-el`**: the EL-fragment saturation classifier
//! - **`mimizuku-query`**: conjunctive query folding
//! - **`mimizuku-kernel`**: knowledge base lifecycle and query interface

pub use mimizuku_core as core;
pub use mimizuku_el as el;
pub use mimizuku_kernel as kernel;
pub use mimizuku_query as query;
pub use mimizuku_rbox as rbox;
pub use mimizuku_tableau as tableau;

/// Everything a typical consumer needs.
pub mod prelude {
    pub use mimizuku_core::{ConceptExpr, RoleExpr};
    pub use mimizuku_kernel::{
        Declaration, EntityKind, KbStatus, KernelError, ReasoningKernel, TaxonomyActor,
    };
    pub use mimizuku_query::{Query, QueryFolder, VarFactory};
    pub use mimizuku_tableau::{CancelFlag, EngineConfig};
}
