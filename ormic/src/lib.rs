//! Compiles chained, strongly-typed query operations — filter, map, order,
//! skip, take, include — into a single PostgreSQL `SELECT`, without ever
//! evaluating the callbacks that describe those operations.
//!
//! A callback's source text is captured at macro-expansion time by
//! [`filter!`], [`map!`] and [`order_by!`]/[`order_by_descending!`], parsed
//! into a `syn` expression tree, and walked by [`translate`] into SQL
//! fragments that [`compose`] assembles into one statement. Nothing in this
//! crate runs a closure; `#[derive(Entity)]` (in `ormic-macros`) and
//! `inventory` supply the schema metadata that used to live in decorators.

pub mod builder;
pub mod callback;
pub mod compose;
pub mod config;
pub mod datasource;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod operation;
pub mod schema;
pub mod scope;
pub mod translate;

pub use builder::{QueryState, Queryable};
pub use compose::CompiledQuery;
pub use config::Options;
pub use datasource::DataSource;
pub use dialect::Dialect;
pub use engine::Row;
pub use error::{Error, ErrorKind, Reason, Result, WithErrorInfo};
pub use operation::{Operation, OrderDirection};
pub use schema::HasSchema;
pub use scope::{Scope, ScopeValue};

pub use ormic_macros::Entity;

#[doc(hidden)]
pub use inventory;
