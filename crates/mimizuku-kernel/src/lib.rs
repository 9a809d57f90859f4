//! Mimizuku 推論カーネル
//!
//! このクレートは知識ベースのライフサイクルと問い合わせ界面を提供します:
//! - 公理登録 API (撤回可能なハンドル付き)
//! - 充足可能性・包含・整合性の問い合わせ
//! - 分類と実現 (EL 高速パス付き)
//! - 保存/読み込み

pub mod kernel;
pub mod ontology;
pub mod persist;
pub mod taxonomy;

pub use kernel::{KbStatus, ReasoningKernel};
pub use ontology::{Axiom, AxiomHandle, Declaration, EntityKind, Ontology, RoleFlag};
pub use taxonomy::{Taxonomy, TaxonomyActor};

use mimizuku_tableau::EngineError;

/// User-facing failure kinds. Clashes never appear here; they are consumed
/// by the engine's branching stack.
#[derive(thiserror::Error, Debug)]
pub enum KernelError {
    #[error("reasoning cancelled")]
    Cancelled,

    #[error("reasoning timed out")]
    Timeout,

    #[error("knowledge base is inconsistent")]
    InconsistentKb,

    #[error("name clash: '{name}' is already registered as {existing}, not {requested}")]
    NameClash {
        name: String,
        existing: EntityKind,
        requested: EntityKind,
    },

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl From<EngineError> for KernelError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => KernelError::Cancelled,
            EngineError::Timeout => KernelError::Timeout,
            EngineError::Internal(msg) => KernelError::Internal(msg),
        }
    }
}

impl From<mimizuku_rbox::RboxError> for KernelError {
    fn from(e: mimizuku_rbox::RboxError) -> Self {
        match e {
            mimizuku_rbox::RboxError::CategoryMismatch(name) => KernelError::NameClash {
                name,
                existing: EntityKind::ObjectRole,
                requested: EntityKind::DataRole,
            },
            mimizuku_rbox::RboxError::UnknownRole(name) => {
                KernelError::MalformedQuery(format!("unknown role '{}'", name))
            }
            mimizuku_rbox::RboxError::Frozen => {
                KernelError::Internal("role registration after freeze".into())
            }
        }
    }
}

impl From<mimizuku_query::QueryError> for KernelError {
    fn from(e: mimizuku_query::QueryError) -> Self {
        KernelError::MalformedQuery(e.to_string())
    }
}

impl From<std::io::Error> for KernelError {
    fn from(e: std::io::Error) -> Self {
        KernelError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        KernelError::Persistence(e.to_string())
    }
}
