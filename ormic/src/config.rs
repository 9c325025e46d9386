//! Compiler-wide options.
//!
//! Not yet threaded through [`crate::compose`] — today there is only one
//! dialect — but kept as its own small surface so a caller has somewhere to
//! put global knobs (a target dialect, eventually a signature comment on
//! generated SQL) without every `compile` call sprouting new parameters.

use crate::dialect::Dialect;

#[derive(Debug, Clone)]
pub struct Options {
    pub dialect: Dialect,
}

impl Default for Options {
    fn default() -> Self {
        Options { dialect: Dialect::Postgres }
    }
}
