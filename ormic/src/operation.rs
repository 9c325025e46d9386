//! The operation record: one tagged variant per chain step.
//!
//! Order of accumulation in a `Queryable`'s operation list is execution
//! order; nothing here reorders or merges operations.

use std::sync::Arc;

use crate::callback::Callback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Appends a WHERE conjunct over the current projection.
    Filter(Callback),
    /// Replaces the current set of output fields.
    Map(Callback),
    /// OFFSET.
    Skip(u64),
    /// LIMIT.
    Take(u64),
    /// Appended to the ORDER BY list.
    Order(Callback, OrderDirection),
    /// Sets DISTINCT on the SELECT.
    Distinct,
    /// Adds a JOIN to the named relation and widens the projection.
    Include(Arc<str>),
}

impl Operation {
    /// True for the operation that collapses the current projection into a
    /// fresh alias set.
    pub fn is_map(&self) -> bool {
        matches!(self, Operation::Map(_))
    }

    pub fn is_pagination(&self) -> bool {
        matches!(self, Operation::Skip(_) | Operation::Take(_))
    }
}
