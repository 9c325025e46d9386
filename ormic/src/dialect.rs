//! SQL dialect constants.
//!
//! `ormic` only targets PostgreSQL today; this module exists so the
//! Postgres-specific spellings (double-quoted identifiers, `EXTRACT(...
//! FROM ...)`, `::text` casts) live in one place rather than scattered
//! across the translator and composer, the way a second backend would need
//! them split out.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
}

impl Dialect {
    pub fn quote_ident(self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    pub fn quote_literal(self, text: &str) -> String {
        format!("'{}'", text.replace('\'', "''"))
    }
}
