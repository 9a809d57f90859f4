//! 連言質問の畳み込み (conjunctive query folding)
//!
//! このクレートは連結な連言質問を概念充足可能性検査の集合へ変換します:
//! - 自由変数の複製 (連結性を保つ置換のみ)
//! - 項構築 (原子を ∃ / ∃⁻ の入れ子に畳む)
//! - 名目の除去 (深さ計測と方程式求解)

mod fold;
mod query;

pub use fold::{FoldResult, QueryFolder};
pub use query::{is_connected, Query, QueryAtom, VarFactory, VarId};

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("query body is empty")]
    EmptyQuery,

    #[error("query has no free variable to start term construction from")]
    NoFreeVariable,

    #[error("malformed query atom: {0}")]
    MalformedAtom(String),
}
