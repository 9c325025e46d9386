use std::any::TypeId;

use ormic::{filter, map, order_by, order_by_descending, Entity, HasSchema, Queryable};

#[derive(Entity)]
#[ormic(table = "users")]
#[allow(dead_code)]
struct User {
    #[ormic(column, primary)]
    id: i64,
    name: String,
    age: i64,
    #[ormic(relation, target = Post, has_many, foreign_key = "user_id")]
    posts: Vec<Post>,
}

#[derive(Entity)]
#[ormic(table = "posts")]
#[allow(dead_code)]
struct Post {
    #[ormic(column, primary)]
    id: i64,
    title: String,
    #[ormic(column, rename = "user_id")]
    user_id: i64,
}

#[test]
fn compiles_filter_and_order_into_where_and_order_by() {
    let q = Queryable::<User>::new()
        .filter(filter!(|u| u.age > 18))
        .order_by(order_by!(|u| u.name));
    let compiled = q.compile().unwrap();
    assert!(compiled.sql.contains("WHERE (\"___t0\".\"age\" > 18)"));
    assert!(compiled.sql.contains("ORDER BY \"___t0\".\"name\" ASC"));
}

#[test]
fn descending_order_flips_the_suffix() {
    let q = Queryable::<User>::new().order_by_descending(order_by_descending!(|u| u.age));
    let compiled = q.compile().unwrap();
    assert!(compiled.sql.contains("ORDER BY \"___t0\".\"age\" DESC"));
}

#[test]
fn map_replaces_the_projection() {
    let q = Queryable::<User>::new().map(map!(|u| Proj { id: u.id, upper_name: u.name.toUpperCase() }));
    let compiled = q.compile().unwrap();
    assert_eq!(compiled.output_fields, vec!["id".to_string(), "upper_name".to_string()]);
    assert!(compiled.sql.contains("UPPER(\"___t0\".\"name\")"));
}

#[test]
fn skip_before_a_map_wraps_the_pre_map_group_as_a_subquery() {
    let q = Queryable::<User>::new()
        .skip(5)
        .map(map!(|u| Proj { id: u.id * 8 }))
        .skip(5);
    let compiled = q.compile().unwrap();
    assert!(compiled.sql.contains("(\"___t1\".\"id\" * 8) AS \"id\""));
    let first_offset = compiled.sql.find("OFFSET 5").unwrap();
    let second_offset = compiled.sql.rfind("OFFSET 5").unwrap();
    assert_ne!(first_offset, second_offset, "both the inner and outer OFFSET 5 must appear");
}

#[test]
fn filter_before_and_after_a_map_with_no_pagination_share_one_layer() {
    let q = Queryable::<User>::new()
        .filter(filter!(|u| u.age > 18))
        .map(map!(|u| Proj { id: u.id, name: u.name }))
        .filter(filter!(|p| p.name == "ada"));
    let compiled = q.compile().unwrap();
    assert!(!compiled.sql.contains("___t1"), "no pagination boundary means no extra layer");
    assert!(compiled.sql.contains("WHERE (\"___t0\".\"age\" > 18) AND (\"___t0\".\"name\" = 'ada')"));
}

#[test]
fn include_widens_the_projection_with_dot_prefixed_columns() {
    let q = Queryable::<User>::new().include("posts");
    let compiled = q.compile().unwrap();
    assert!(compiled.output_fields.iter().any(|f| f == "posts.title"));
    assert!(compiled.sql.contains("LEFT JOIN \"posts\""));
}

#[test]
fn take_and_skip_emit_limit_and_offset() {
    let q = Queryable::<User>::new().skip(5).take(10);
    let compiled = q.compile().unwrap();
    assert!(compiled.sql.contains("LIMIT 10"));
    assert!(compiled.sql.contains("OFFSET 5"));
}

#[test]
fn distinct_sets_the_select_modifier() {
    let q = Queryable::<User>::new().distinct();
    let compiled = q.compile().unwrap();
    assert!(compiled.sql.starts_with("SELECT DISTINCT"));
}

#[test]
fn builder_chain_never_mutates_the_receiver() {
    let base = Queryable::<User>::new();
    let filtered = base.filter(filter!(|u| u.id > 1));
    assert!(base.get_state().operations.is_empty());
    assert_eq!(filtered.get_state().operations.len(), 1);
    assert_ne!(base.get_state(), filtered.get_state());
}

#[test]
fn operation_order_is_preserved_in_generated_sql() {
    let q = Queryable::<User>::new()
        .filter(filter!(|u| u.age > 18))
        .filter(filter!(|u| u.age < 65));
    let compiled = q.compile().unwrap();
    let age_gt = compiled.sql.find("> 18").unwrap();
    let age_lt = compiled.sql.find("< 65").unwrap();
    assert!(age_gt < age_lt);
}

#[test]
fn count_exact_compiles_to_a_wrapping_count_query() {
    let q = Queryable::<User>::new().filter(filter!(|u| u.age > 18));
    let compiled = ormic::compose::compile_count(
        TypeId::of::<User>(),
        User::type_name(),
        &q.get_state().operations,
        &q.get_state().scope,
    )
    .unwrap();
    assert!(compiled.sql.starts_with("SELECT COUNT(*)"));
    assert_eq!(compiled.output_fields, vec!["count".to_string()]);
}

#[test]
fn scope_values_are_inlined_as_literals() {
    let q = Queryable::<User>::new()
        .scope("min_age", 21.0)
        .filter(filter!(|u, scope| u.age >= scope.min_age));
    let compiled = q.compile().unwrap();
    assert!(compiled.sql.contains(">= 21"));
}

#[test]
fn included_relation_map_flattens_into_dot_prefixed_output_under_the_same_key() {
    let q = Queryable::<User>::new().include("posts").map(map!(|u| Proj {
        id: u.id,
        p: u.posts.map(|post| Proj { pid: post.id }),
    }));
    let compiled = q.compile().unwrap();
    assert_eq!(compiled.output_fields, vec!["id".to_string(), "p.pid".to_string()]);
    assert!(compiled.sql.contains("LEFT JOIN \"posts\""));
    assert!(!compiled.sql.contains("ARRAY("));
}

#[test]
fn unknown_field_produces_a_translation_error() {
    let q = Queryable::<User>::new().filter(filter!(|u| u.unknown_field > 1));
    let err = q.compile().unwrap_err();
    assert_eq!(err.kind, ormic::ErrorKind::Translation);
}
