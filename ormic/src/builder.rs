//! The queryable builder (component C3): an immutable accumulator of
//! operations that terminates into a compiled-and-executed query.

use std::any::TypeId;
use std::marker::PhantomData;

use crate::compose;
use crate::datasource::DataSource;
use crate::engine::Row;
use crate::error::Result;
use crate::operation::{Operation, OrderDirection};
use crate::schema::HasSchema;
use crate::scope::{Scope, ScopeValue};

/// A snapshot of a builder's accumulated state. Two snapshots compare equal
/// iff their entity, operations and scope are all equal.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub operations: Vec<Operation>,
    pub scope: Scope,
}

/// The chain API. Every non-terminal method takes `&self` and returns a
/// fresh `Queryable`; the receiver is never mutated, by construction rather
/// than by convention.
#[derive(Debug, Clone)]
pub struct Queryable<T> {
    state: QueryState,
    _marker: PhantomData<fn() -> T>,
}

impl<T: HasSchema> Queryable<T> {
    pub fn new() -> Self {
        Queryable {
            state: QueryState {
                type_id: TypeId::of::<T>(),
                type_name: T::type_name(),
                operations: Vec::new(),
                scope: Scope::new(),
            },
            _marker: PhantomData,
        }
    }

    fn with_operation(&self, op: Operation) -> Self {
        let mut operations = self.state.operations.clone();
        operations.push(op);
        Queryable {
            state: QueryState { operations, ..self.state.clone() },
            _marker: PhantomData,
        }
    }

    /// Adds a JOIN to the named relation and widens the projection with
    /// dot-prefixed columns. Only meaningful before any `map` collapses the
    /// projection.
    pub fn include(&self, relation_field: impl Into<String>) -> Self {
        self.with_operation(Operation::Include(relation_field.into().into()))
    }

    /// Appends a WHERE conjunct built from `op`, which must be an
    /// `Operation::Filter` produced by [`crate::filter!`].
    pub fn filter(&self, op: Operation) -> Self {
        debug_assert!(matches!(op, Operation::Filter(_)), "filter() expects ormic::filter!(...)");
        self.with_operation(op)
    }

    /// OFFSET.
    pub fn skip(&self, n: u64) -> Self {
        self.with_operation(Operation::Skip(n))
    }

    /// LIMIT.
    pub fn take(&self, n: u64) -> Self {
        self.with_operation(Operation::Take(n))
    }

    /// Replaces the current projection with `op`, which must be an
    /// `Operation::Map` produced by [`crate::map!`].
    pub fn map(&self, op: Operation) -> Self {
        debug_assert!(matches!(op, Operation::Map(_)), "map() expects ormic::map!(...)");
        self.with_operation(op)
    }

    /// Sets DISTINCT on the SELECT.
    pub fn distinct(&self) -> Self {
        self.with_operation(Operation::Distinct)
    }

    /// Appends an ascending order-by entry built from `op`
    /// (`ormic::order_by!(...)`).
    pub fn order_by(&self, op: Operation) -> Self {
        self.with_ordering(op, OrderDirection::Asc)
    }

    /// Appends a descending order-by entry built from `op`
    /// (`ormic::order_by_descending!(...)`).
    pub fn order_by_descending(&self, op: Operation) -> Self {
        self.with_ordering(op, OrderDirection::Desc)
    }

    fn with_ordering(&self, op: Operation, direction: OrderDirection) -> Self {
        match op {
            Operation::Order(cb, _) => self.with_operation(Operation::Order(cb, direction)),
            other => self.with_operation(other),
        }
    }

    /// Orders by a bare field name, wrapped into a synthetic selector
    /// returning `row.<name>`.
    pub fn order_by_field(&self, field_name: &str) -> Self {
        let source: &'static str = Box::leak(format!("|row| row.{field_name}").into_boxed_str());
        self.with_operation(Operation::Order(
            crate::callback::Callback::from_source(source),
            OrderDirection::Asc,
        ))
    }

    /// Shallow-merges `key`/`value` into the query's scope bag. Later calls
    /// win on key conflict.
    pub fn scope(&self, key: impl Into<String>, value: impl Into<ScopeValue>) -> Self {
        let mut scope = self.state.scope.clone();
        scope.insert(key, value);
        Queryable { state: QueryState { scope, ..self.state.clone() }, _marker: PhantomData }
    }

    pub fn get_state(&self) -> &QueryState {
        &self.state
    }

    /// Compiles the accumulated operations without executing them. Exposed
    /// so callers (and tests) can inspect the SQL a chain would run.
    pub fn compile(&self) -> Result<compose::CompiledQuery> {
        compose::compile(self.state.type_id, self.state.type_name, &self.state.operations, &self.state.scope)
    }

    /// Compiles and executes, returning every row.
    pub async fn to_array(&self, source: &dyn DataSource) -> Result<Vec<Row>> {
        let compiled = self.compile()?;
        source.fetch_all(&compiled).await
    }

    /// `first` ≡ `take(1).to_array()[0]`.
    pub async fn first(&self, source: &dyn DataSource) -> Result<Option<Row>> {
        let compiled = self.take(1).compile()?;
        source.fetch_one(&compiled).await
    }

    /// Materializing fallback: runs `to_array` and measures its length.
    pub async fn count(&self, source: &dyn DataSource) -> Result<usize> {
        Ok(self.to_array(source).await?.len())
    }

    /// Additive convenience: emits `SELECT COUNT(*) FROM (<inner>)` instead
    /// of materializing every row.
    pub async fn count_exact(&self, source: &dyn DataSource) -> Result<i64> {
        let compiled = compose::compile_count(
            self.state.type_id,
            self.state.type_name,
            &self.state.operations,
            &self.state.scope,
        )?;
        source.fetch_count(&compiled).await
    }
}

impl<T: HasSchema> Default for Queryable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    impl HasSchema for Widget {
        fn type_name() -> &'static str {
            "Widget"
        }
    }

    #[test]
    fn chain_methods_do_not_mutate_the_receiver() {
        let b = Queryable::<Widget>::new();
        let before = b.get_state().clone();
        let _b2 = b.take(5);
        assert_eq!(b.get_state(), &before, "receiver must be unchanged after take()");
    }

    #[test]
    fn chain_methods_return_a_distinct_state() {
        let b = Queryable::<Widget>::new();
        let b2 = b.take(5);
        assert_ne!(b.get_state(), b2.get_state());
    }

    #[test]
    fn scope_later_call_wins() {
        let b = Queryable::<Widget>::new().scope("foo", 1.0).scope("foo", 2.0);
        assert_eq!(b.get_state().scope.resolve("foo"), Some(&ScopeValue::Number(2.0)));
    }

    #[test]
    fn operation_order_is_insertion_order() {
        let b = Queryable::<Widget>::new().skip(5).take(10);
        let ops = &b.get_state().operations;
        assert!(matches!(ops[0], Operation::Skip(5)));
        assert!(matches!(ops[1], Operation::Take(10)));
    }
}
