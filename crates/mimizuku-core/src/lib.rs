//! Mimizuku コア データモデル
//!
//! このクレートは推論エンジンの基盤となるデータ構造を提供します:
//! - バイポーラポインタと式 DAG (hash-consing)
//! - 依存集合 (dependency set)
//! - フロントエンド式 AST

pub mod dag;
pub mod depset;
pub mod expr;

pub use dag::{Bp, ConceptId, Dag, DagVertex, IndividualId, RoleId};
pub use depset::DepSet;
pub use expr::{ConceptExpr, RoleExpr};
