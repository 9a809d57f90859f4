//! タブロー推論エンジン
//!
//! このクレートは記述論理のタブロー充足可能性エンジンを提供します:
//! - 完成グラフ (snapshot/restore 付き)
//! - 展開規則の優先度付き待ち行列
//! - 依存集合追跡とバックジャンプ
//! - ブロッキングとモデルキャッシュ

pub mod blocking;
pub mod branch;
pub mod cache;
pub mod engine;
pub mod graph;
pub mod tbox;
pub mod todo;

pub use blocking::BlockingConfig;
pub use cache::{CacheState, CacheStore, IanCache, ModelCache};
pub use engine::{SatEngine, Stats};
pub use graph::{CompletionGraph, ConceptWDep, LabelKind, NodeId};
pub use tbox::{
    AboxData, ConceptInfo, DataCheckResult, DatatypeChecker, IndividualInfo,
    SimpleDatatypeChecker, SplitDef, Tbox,
};
pub use todo::{ToDoEntry, ToDoList};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Engine options, read once per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub use_semantic_branching: bool,
    pub use_backjumping: bool,
    pub use_lazy_blocking: bool,
    pub use_anywhere_blocking: bool,
    /// Soft timeout in milliseconds; 0 disables it.
    pub timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_semantic_branching: true,
            use_backjumping: true,
            use_lazy_blocking: true,
            use_anywhere_blocking: true,
            timeout_ms: 0,
        }
    }
}

/// Cooperative cancellation handle, read at the dequeue boundary of the
/// main loop. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Failures a reasoning session can surface. A clash is not one of them:
/// clashes are consumed by the branching stack.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("reasoning cancelled")]
    Cancelled,

    #[error("reasoning timed out")]
    Timeout,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}
