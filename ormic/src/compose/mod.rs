//! Query composer (component C5): turns the translated fragments for each
//! operation into a single layered SQL statement, promoting to a new
//! sub-SELECT whenever a `map` replaces the current projection.

mod alias;
mod projection;

use std::any::TypeId;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::operation::{Operation, OrderDirection};
use crate::schema::{self, JoinKind};
use crate::scope::Scope;
use crate::translate;

use alias::AliasAllocator;
use projection::ColumnMap;

/// The result of compiling a `Queryable`'s operation list: ready-to-execute
/// SQL text plus the output shape the rehydrator (component C6) needs.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    /// Bound parameters. Always empty today — literals are inlined directly
    /// into `sql` rather than parameterized (see the design notes on
    /// parameterization).
    pub params: Vec<serde_json::Value>,
    /// Dot-prefixed output keys in SELECT order, used to rebuild nested
    /// objects from flat rows.
    pub output_fields: Vec<String>,
}

struct Layer {
    alias: String,
    from: String,
    joins: Vec<String>,
    columns: ColumnMap,
    /// `Some` only while this layer is still a scan over a registered
    /// entity; cleared once a `map` has replaced the projection, since
    /// relations can no longer be resolved against an arbitrary row shape.
    entity_type: Option<TypeId>,
    where_conjuncts: Vec<String>,
    order_entries: Vec<(String, OrderDirection)>,
    distinct: bool,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Layer {
    fn base(alias: String, table_name: &str, type_id: TypeId) -> Self {
        let columns = projection::base_columns(&alias, &schema::get_columns(type_id));
        Layer {
            from: format!("\"{table_name}\" AS \"{alias}\""),
            alias,
            joins: Vec::new(),
            columns,
            entity_type: Some(type_id),
            where_conjuncts: Vec::new(),
            order_entries: Vec::new(),
            distinct: false,
            limit: None,
            offset: None,
        }
    }

    fn render(&self) -> String {
        let select_list = projection::render_select_list(&self.columns);
        let mut sql = format!(
            "SELECT {}{select_list} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            self.from
        );
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.where_conjuncts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_conjuncts.join(" AND "));
        }
        if !self.order_entries.is_empty() {
            sql.push_str(" ORDER BY ");
            let entries: Vec<String> = self
                .order_entries
                .iter()
                .map(|(expr, dir)| {
                    let suffix = match dir {
                        OrderDirection::Asc => "ASC",
                        OrderDirection::Desc => "DESC",
                    };
                    format!("{expr} {suffix}")
                })
                .collect();
            sql.push_str(&entries.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }
}

/// Compiles an operation chain into a row-returning `SELECT`.
pub fn compile(
    type_id: TypeId,
    type_name: &'static str,
    operations: &[Operation],
    scope: &Scope,
) -> Result<CompiledQuery> {
    let mut aliases = AliasAllocator::new();
    let table = schema::get_table(type_id, type_name)?;
    let mut layer = Layer::base(aliases.next(), table.table_name, type_id);

    for op in operations {
        apply_operation(op, &mut layer, &mut aliases, scope)?;
    }

    let output_fields = layer.columns.keys().cloned().collect();
    Ok(CompiledQuery { sql: layer.render(), params: Vec::new(), output_fields })
}

/// Compiles an operation chain into `SELECT COUNT(*) FROM (<inner>) AS
/// ___count`, ignoring any trailing projection shape (count only cares
/// about row count, never column identity).
pub fn compile_count(
    type_id: TypeId,
    type_name: &'static str,
    operations: &[Operation],
    scope: &Scope,
) -> Result<CompiledQuery> {
    let inner = compile(type_id, type_name, operations, scope)?;
    Ok(CompiledQuery {
        sql: format!("SELECT COUNT(*) AS \"count\" FROM ({}) AS \"___count\"", inner.sql),
        params: Vec::new(),
        output_fields: vec!["count".to_string()],
    })
}

fn apply_operation(
    op: &Operation,
    layer: &mut Layer,
    aliases: &mut AliasAllocator,
    scope: &Scope,
) -> Result<()> {
    match op {
        Operation::Filter(cb) => {
            let sql = translate::translate_predicate(cb, &layer.columns, scope)?;
            layer.where_conjuncts.push(sql);
            Ok(())
        }
        Operation::Order(cb, dir) => {
            let sql = translate::translate_order_key(cb, &layer.columns, scope)?;
            layer.order_entries.push((sql, *dir));
            Ok(())
        }
        Operation::Skip(n) => {
            layer.offset = Some(*n);
            Ok(())
        }
        Operation::Take(n) => {
            layer.limit = Some(*n);
            Ok(())
        }
        Operation::Distinct => {
            layer.distinct = true;
            Ok(())
        }
        Operation::Include(relation_field) => apply_include(relation_field, layer, aliases),
        Operation::Map(cb) => apply_map(cb, layer, aliases, scope),
    }
}

fn apply_include(relation_field: &str, layer: &mut Layer, aliases: &mut AliasAllocator) -> Result<()> {
    let type_id = layer
        .entity_type
        .ok_or_else(|| Error::unsupported("include() after a map() has no entity to resolve relations against"))?;
    let relations = schema::get_relations(type_id);
    let relation = relations
        .get(relation_field)
        .ok_or_else(|| Error::not_found("relation", relation_field.to_string()))?;

    let target_type_id = (relation.target)();
    let target_name = (relation.target_name)();
    let target_table = schema::get_table(target_type_id, target_name)?;
    let target_alias = aliases.next();

    let join_kind = match relation.join_kind {
        JoinKind::Left => "LEFT JOIN",
        JoinKind::Inner => "JOIN",
        JoinKind::Right => "RIGHT JOIN",
    };
    layer.joins.push(format!(
        "{join_kind} \"{}\" AS \"{target_alias}\" ON \"{}\".\"{}\" = \"{target_alias}\".\"{}\"",
        target_table.table_name, layer.alias, relation.principal_key, relation.foreign_key,
    ));

    for col in schema::get_columns(target_type_id).values() {
        layer.columns.insert(
            format!("{relation_field}.{}", col.field_name),
            format!("\"{target_alias}\".\"{}\"", col.column_name),
        );
    }
    Ok(())
}

/// A `map` starts a new layered group only when a `skip`/`take` precedes it
/// in the current group: pagination must apply to the pre-projection row
/// set, so the boundary wraps everything accumulated so far into a
/// sub-SELECT and the new projection is computed against *that* sub-SELECT's
/// exposed columns rather than the original table's. A `map` with no
/// pending pagination instead folds straight into the current layer: WHERE
/// and ORDER BY don't need the new aliases to be visible, so there is
/// nothing to wrap.
fn apply_map(
    cb: &crate::callback::Callback,
    layer: &mut Layer,
    aliases: &mut AliasAllocator,
    scope: &Scope,
) -> Result<()> {
    if layer.limit.is_some() || layer.offset.is_some() {
        let inner_sql = layer.render();
        let new_alias = aliases.next();
        let passthrough: ColumnMap = layer
            .columns
            .keys()
            .map(|key| (key.clone(), format!("\"{new_alias}\".\"{key}\"")))
            .collect();

        let fields = translate::translate_projection(cb, &passthrough, scope, None)?;
        let mut projected_columns = ColumnMap::new();
        for field in &fields {
            projected_columns.insert(field.output_key.clone(), field.sql.clone());
        }

        *layer = Layer {
            from: format!("({inner_sql}) AS \"{new_alias}\""),
            alias: new_alias,
            joins: Vec::new(),
            columns: projected_columns,
            entity_type: None,
            where_conjuncts: Vec::new(),
            order_entries: Vec::new(),
            distinct: false,
            limit: None,
            offset: None,
        };
        return Ok(());
    }

    let entity_type = layer.entity_type;
    let base_alias = layer.alias.clone();
    let base_columns = layer.columns.clone();

    let nested = move |relation_field: &str, inner: &syn::ExprClosure| -> Result<String> {
        translate_nested_relation_array(entity_type, &base_alias, relation_field, inner)
    };

    let fields = translate::translate_projection(cb, &base_columns, scope, Some(&nested))?;
    let mut projected_columns = ColumnMap::new();
    for field in &fields {
        projected_columns.insert(field.output_key.clone(), field.sql.clone());
    }
    layer.columns = projected_columns;
    layer.entity_type = None;
    Ok(())
}

fn translate_nested_relation_array(
    entity_type: Option<TypeId>,
    parent_alias: &str,
    relation_field: &str,
    inner: &syn::ExprClosure,
) -> Result<String> {
    let type_id = entity_type
        .ok_or_else(|| Error::unsupported("nested relation projection requires a resolvable base entity"))?;
    let relations = schema::get_relations(type_id);
    let relation = relations
        .get(relation_field)
        .ok_or_else(|| Error::not_found("relation", relation_field.to_string()))?;

    let target_type_id = (relation.target)();
    let target_name = (relation.target_name)();
    let target_table = schema::get_table(target_type_id, target_name)?;
    let child_alias = format!("{parent_alias}_{relation_field}");

    let child_columns: IndexMap<String, String> = schema::get_columns(target_type_id)
        .values()
        .map(|col| (col.field_name.to_string(), format!("\"{child_alias}\".\"{}\"", col.column_name)))
        .collect();

    let param = translate::closure_param_name(inner)?;
    let empty_scope = Scope::new();
    let fields = translate::project_closure(inner, &param, None, &child_columns, &empty_scope, None)?;
    if fields.len() != 1 {
        return Err(Error::unsupported(
            "a nested relation `.map(...)` must project exactly one scalar field",
        ));
    }

    Ok(format!(
        "ARRAY(SELECT {} FROM \"{}\" AS \"{child_alias}\" WHERE \"{child_alias}\".\"{}\" = \"{parent_alias}\".\"{}\")",
        fields[0].sql, target_table.table_name, relation.foreign_key, relation.principal_key,
    ))
}
