//! Entity/column/relation descriptor registry.
//!
//! Descriptors are never constructed by hand: `#[derive(Entity)]` (in
//! `ormic-macros`) expands to one `inventory::submit!` per table, column and
//! relation, registered at load time rather than looked up via runtime
//! reflection. The registry itself just indexes whatever inventory collected,
//! lazily, on first use.

use std::any::TypeId;
use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    pub type_id: fn() -> TypeId,
    pub type_name: &'static str,
    pub table_name: &'static str,
}

inventory::collect!(TableDescriptor);

#[derive(Debug, Clone, Copy)]
pub struct ColumnDescriptor {
    pub owner: fn() -> TypeId,
    pub field_name: &'static str,
    pub column_name: &'static str,
    pub sql_type: Option<&'static str>,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub length: Option<u32>,
}

inventory::collect!(ColumnDescriptor);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Left,
    Inner,
    Right,
}

impl Default for JoinKind {
    fn default() -> Self {
        JoinKind::Left
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelationDescriptor {
    pub owner: fn() -> TypeId,
    pub field_name: &'static str,
    pub target: fn() -> TypeId,
    pub target_name: fn() -> &'static str,
    pub join_kind: JoinKind,
    pub foreign_key: &'static str,
    pub principal_key: &'static str,
    pub nullable: bool,
    pub eager: bool,
}

inventory::collect!(RelationDescriptor);

/// Marker implemented by `#[derive(Entity)]` so a root type can be named
/// generically (`Queryable::<User>::new()`) without the caller repeating the
/// type's table name.
pub trait HasSchema: 'static {
    fn type_name() -> &'static str;
}

struct Registry {
    tables: IndexMap<TypeId, &'static TableDescriptor>,
    columns: IndexMap<TypeId, IndexMap<&'static str, &'static ColumnDescriptor>>,
    relations: IndexMap<TypeId, IndexMap<&'static str, &'static RelationDescriptor>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut tables = IndexMap::new();
        for table in inventory::iter::<TableDescriptor> {
            tables.insert((table.type_id)(), table);
        }

        let mut columns: IndexMap<TypeId, IndexMap<&'static str, &'static ColumnDescriptor>> =
            IndexMap::new();
        for column in inventory::iter::<ColumnDescriptor> {
            columns
                .entry((column.owner)())
                .or_default()
                .insert(column.field_name, column);
        }

        let mut relations: IndexMap<TypeId, IndexMap<&'static str, &'static RelationDescriptor>> =
            IndexMap::new();
        for relation in inventory::iter::<RelationDescriptor> {
            relations
                .entry((relation.owner)())
                .or_default()
                .insert(relation.field_name, relation);
        }

        Registry { tables, columns, relations }
    })
}

/// Looks up the table descriptor for an entity. Errors if the type was never
/// declared with `#[derive(Entity)]` and a `#[ormic(table)]` attribute.
pub fn get_table(type_id: TypeId, type_name: &'static str) -> Result<&'static TableDescriptor> {
    registry()
        .tables
        .get(&type_id)
        .copied()
        .ok_or_else(|| Error::not_found("entity", type_name))
}

/// Column descriptors for an entity, in declaration order. An entity with no
/// declared columns yields an empty mapping.
pub fn get_columns(type_id: TypeId) -> IndexMap<&'static str, &'static ColumnDescriptor> {
    registry()
        .columns
        .get(&type_id)
        .cloned()
        .unwrap_or_default()
}

/// Relation descriptors for an entity, in declaration order.
pub fn get_relations(type_id: TypeId) -> IndexMap<&'static str, &'static RelationDescriptor> {
    registry()
        .relations
        .get(&type_id)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
struct Widget;

#[cfg(test)]
inventory::submit! {
    TableDescriptor { type_id: TypeId::of::<Widget>, type_name: "Widget", table_name: "widgets" }
}

#[cfg(test)]
inventory::submit! {
    ColumnDescriptor {
        owner: TypeId::of::<Widget>,
        field_name: "id",
        column_name: "id",
        sql_type: Some("bigint"),
        nullable: false,
        unique: false,
        primary: true,
        length: None,
    }
}

#[cfg(test)]
struct Bare;

#[cfg(test)]
inventory::submit! {
    TableDescriptor { type_id: TypeId::of::<Bare>, type_name: "Bare", table_name: "bares" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    #[test]
    fn looks_up_registered_table() {
        let table = get_table(TypeId::of::<Widget>(), "Widget").unwrap();
        assert_eq!(table.table_name, "widgets");
    }

    #[test]
    fn missing_table_is_schema_error() {
        struct Ghost;
        let err = get_table(TypeId::of::<Ghost>(), "Ghost").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Schema);
    }

    #[test]
    fn columns_are_keyed_by_field_name() {
        let columns = get_columns(TypeId::of::<Widget>());
        assert!(columns.contains_key("id"));
        assert_eq!(columns["id"].column_name, "id");
    }

    #[test]
    fn entity_with_no_columns_yields_empty_mapping() {
        assert!(get_columns(TypeId::of::<Bare>()).is_empty());
    }
}
