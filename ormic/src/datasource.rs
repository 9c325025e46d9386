//! External interface to a running database (component C7).
//!
//! `DataSource` is the only seam between the compiler and a live connection:
//! everything upstream (builder, translator, composer) works purely over
//! syntax and never reaches the network. Implementors own their own pooling;
//! `ormic` never holds a connection longer than a single call.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::compose::CompiledQuery;
use crate::engine::{Rehydrator, Row};
use crate::error::{Error, Result};

/// A live database the composer's SQL can be run against.
///
/// Only [`DataSource::raw_rows`] is required; the `fetch_*` terminal methods
/// are provided in terms of it so a new backend only has to know how to run
/// a SQL string and report back flat rows.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Executes `sql` and reports each row as a flat JSON object keyed by
    /// column name, exactly as the SELECT produced it (dot-prefixed relation
    /// columns included, unrehydrated).
    async fn raw_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>>;

    /// Runs `compiled` and rehydrates every row.
    async fn fetch_all(&self, compiled: &CompiledQuery) -> Result<Vec<Row>> {
        let rows = self.raw_rows(&compiled.sql).await?;
        Ok(rows.into_iter().map(Rehydrator::rehydrate).collect())
    }

    /// Runs `compiled` and rehydrates the first row, if any.
    async fn fetch_one(&self, compiled: &CompiledQuery) -> Result<Option<Row>> {
        Ok(self.fetch_all(compiled).await?.into_iter().next())
    }

    /// Runs a `COUNT(*)`-shaped query and reads back its single integer
    /// column.
    async fn fetch_count(&self, compiled: &CompiledQuery) -> Result<i64> {
        let rows = self.raw_rows(&compiled.sql).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::execution("COUNT query returned no rows"))?;
        row.get("count")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::execution("COUNT query did not return an integer `count` column"))
    }
}

#[cfg(feature = "postgres")]
mod postgres_source {
    use super::*;
    use sqlx::{Column, PgPool, Row as _, TypeInfo, ValueRef};

    /// Reference `DataSource` backed by `sqlx`'s Postgres pool. Off by
    /// default; enable the `postgres` feature to pull it in.
    pub struct PgDataSource {
        pool: PgPool,
    }

    impl PgDataSource {
        pub fn new(pool: PgPool) -> Self {
            PgDataSource { pool }
        }
    }

    #[async_trait]
    impl DataSource for PgDataSource {
        async fn raw_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>> {
            let rows = sqlx::query(sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::execution(e.to_string()))?;

            rows.iter().map(row_to_json).collect()
        }
    }

    fn row_to_json(row: &sqlx::postgres::PgRow) -> Result<Map<String, Value>> {
        let mut object = Map::new();
        for (index, column) in row.columns().iter().enumerate() {
            let value = column_to_json(row, index, column.type_info().name())?;
            object.insert(column.name().to_string(), value);
        }
        Ok(object)
    }

    fn column_to_json(
        row: &sqlx::postgres::PgRow,
        index: usize,
        type_name: &str,
    ) -> Result<Value> {
        if row.try_get_raw(index).map(|v| v.is_null()).unwrap_or(true) {
            return Ok(Value::Null);
        }
        let decoded = match type_name {
            "BOOL" => row.try_get::<bool, _>(index).map(Value::from),
            "INT2" => row.try_get::<i16, _>(index).map(Value::from),
            "INT4" => row.try_get::<i32, _>(index).map(Value::from),
            "INT8" => row.try_get::<i64, _>(index).map(Value::from),
            "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Value::from(v as f64)),
            "FLOAT8" => row.try_get::<f64, _>(index).map(Value::from),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<String, _>(index).map(Value::from),
            "JSON" | "JSONB" => row.try_get::<Value, _>(index),
            _ => row.try_get::<String, _>(index).map(Value::from),
        };
        decoded.map_err(|e| Error::execution(format!("decoding column {index} ({type_name}): {e}")))
    }
}

#[cfg(feature = "postgres")]
pub use postgres_source::PgDataSource;
