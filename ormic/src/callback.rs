//! Captured source text for a filter/map/order callback.
//!
//! The crate never evaluates these closures: the only thing it keeps is the
//! source text captured by [`crate::filter!`], [`crate::map!`] and
//! [`crate::order_by!`] via `stringify!`, which the translator parses into a
//! `syn::Expr` and walks. `stringify!` supplies the source text automatically,
//! so callers never type the closure body twice.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Callback {
    source: &'static str,
}

impl Callback {
    /// Constructs a callback from source text captured by `stringify!`.
    /// Public so the chain macros can call it; not meant to be called
    /// directly with hand-written strings.
    #[doc(hidden)]
    pub const fn from_source(source: &'static str) -> Self {
        Callback { source }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Parses the captured source as a single-parameter closure expression.
    pub fn parse_closure(&self) -> Result<syn::ExprClosure> {
        syn::parse_str::<syn::ExprClosure>(self.source).map_err(|e| {
            Error::translation(format!(
                "callback `{}` is not a single-argument closure: {e}",
                self.source
            ))
        })
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:?})", self.source)
    }
}

/// Captures a closure's source text without evaluating it.
///
/// ```ignore
/// let op = ormic::filter!(|u| u.id > 10);
/// ```
#[macro_export]
macro_rules! filter {
    ($body:expr) => {
        $crate::operation::Operation::Filter($crate::callback::Callback::from_source(stringify!(
            $body
        )))
    };
}

/// Captures a projection closure's source text without evaluating it.
#[macro_export]
macro_rules! map {
    ($body:expr) => {
        $crate::operation::Operation::Map($crate::callback::Callback::from_source(stringify!(
            $body
        )))
    };
}

/// Captures an ascending order-by selector's source text.
#[macro_export]
macro_rules! order_by {
    ($body:expr) => {
        $crate::operation::Operation::Order(
            $crate::callback::Callback::from_source(stringify!($body)),
            $crate::operation::OrderDirection::Asc,
        )
    };
}

/// Captures a descending order-by selector's source text.
#[macro_export]
macro_rules! order_by_descending {
    ($body:expr) => {
        $crate::operation::Operation::Order(
            $crate::callback::Callback::from_source(stringify!($body)),
            $crate::operation::OrderDirection::Desc,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expression_bodied_closure() {
        let cb = Callback::from_source("|u| u.id > 10");
        let closure = cb.parse_closure().unwrap();
        assert_eq!(closure.inputs.len(), 1);
    }

    #[test]
    fn rejects_non_closure_source() {
        let cb = Callback::from_source("42");
        assert!(cb.parse_closure().is_err());
    }
}
