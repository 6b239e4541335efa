#![forbid(unsafe_code)]

mod error;
mod fold;
mod inline;
mod lower;
mod operand;
mod render;
mod rewrite;
mod scope;
mod types;
mod unroll;

pub use error::{ErrorKind, TranslationError};
pub use lower::{Translator, lower_module};
pub use operand::{Operand, VarRef};
pub use render::{Prec, Rendered};
pub use scope::{ScopeId, ScopeKind, Scopes, Symbol, SymbolKind};

/// First index of a source-level list. Targets always index from 1; with
/// `Zero` every subscript is shifted by one on the way out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexBase {
    #[default]
    One,
    Zero,
}

impl IndexBase {
    pub fn first(self) -> i64 {
        match self {
            IndexBase::One => 1,
            IndexBase::Zero => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LowerConfig {
    pub index_base: IndexBase,
    /// Render `sum`/`all`/`any`/`min`/`max` over a `range` as target-side
    /// aggregates instead of unrolling them.
    pub native_aggregates: bool,
    /// Upper bound on statements executed while unrolling and inlining.
    pub max_unrolled_statements: usize,
    /// Name of the implicit objective accumulator.
    pub objective_name: String,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            index_base: IndexBase::One,
            native_aggregates: true,
            max_unrolled_statements: 1_000_000,
            objective_name: "objective".to_string(),
        }
    }
}
