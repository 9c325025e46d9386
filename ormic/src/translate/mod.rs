//! Expression translator (component C4): walks the `syn::Expr` parsed from a
//! callback's captured source and emits SQL text. This module never touches
//! a database and never evaluates the callback — it only rewrites syntax.

mod methods;
mod operators;

use indexmap::IndexMap;
use syn::punctuated::Punctuated;
use syn::{Expr, ExprClosure, Lit, Pat, Token};

use crate::callback::Callback;
use crate::error::{Error, Result, WithErrorInfo};
use crate::scope::{Scope, ScopeValue};

/// One output column produced by a `map` projection.
#[derive(Debug, Clone)]
pub struct ProjectedField {
    pub output_key: String,
    pub sql: String,
}

/// Resolves the single-parameter name and the flat, dot-prefixed column map
/// a callback's body is translated against. Built by the composer from the
/// current alias plan (component C5) so the translator itself never needs
/// to know about joins or aliasing.
pub struct TranslateCtx<'a> {
    pub param: String,
    /// Name bound to the second closure parameter, if present — the handle
    /// through which a callback reads values from the query's scope bag.
    pub scope_param: Option<String>,
    pub scope: &'a Scope,
    /// Dotted field path (e.g. `"id"`, `"profile.bio"`) → already-quoted SQL
    /// column reference (e.g. `"t0"."id"`).
    pub column_refs: &'a IndexMap<String, String>,
    /// Invoked when the body calls `.map(...)` on a relation path that is
    /// not itself a scalar column — the composer resolves this into a
    /// correlated `ARRAY(SELECT ...)` subquery.
    pub nested_array: Option<&'a dyn Fn(&str, &ExprClosure) -> Result<String>>,
}

/// Extracts the closure's bound parameter names: the row, and, if present,
/// a second parameter bound to the scope bag.
pub(crate) fn closure_param_names(closure: &ExprClosure) -> Result<(String, Option<String>)> {
    if closure.inputs.is_empty() || closure.inputs.len() > 2 {
        return Err(Error::translation("callback must take one or two parameters"));
    }
    let mut names = closure.inputs.iter().map(|pat| match pat {
        Pat::Ident(pat_ident) => Ok(pat_ident.ident.to_string()),
        other => Err(Error::unsupported(format!("destructuring parameter `{other:?}`"))),
    });
    let row = names.next().expect("checked non-empty above")?;
    let scope = names.next().transpose()?;
    Ok((row, scope))
}

/// Extracts the single bound parameter's name from a one-argument closure.
pub(crate) fn closure_param_name(closure: &ExprClosure) -> Result<String> {
    closure_param_names(closure).map(|(row, _)| row)
}

fn parse_closure(cb: &Callback) -> Result<(ExprClosure, String, Option<String>)> {
    let closure = cb.parse_closure()?;
    let (row, scope) = closure_param_names(&closure)?;
    Ok((closure, row, scope))
}

/// Translates a `filter!` callback body into a boolean SQL expression.
pub fn translate_predicate(
    cb: &Callback,
    ctx_columns: &IndexMap<String, String>,
    scope: &Scope,
) -> Result<String> {
    let (closure, param, scope_param) = parse_closure(cb)?;
    let ctx = TranslateCtx { param, scope_param, scope, column_refs: ctx_columns, nested_array: None };
    translate_scalar(&closure.body, &ctx)
}

/// Translates an `order_by!`/`order_by_descending!` callback body into a
/// scalar SQL expression usable as an ORDER BY key.
pub fn translate_order_key(
    cb: &Callback,
    ctx_columns: &IndexMap<String, String>,
    scope: &Scope,
) -> Result<String> {
    let (closure, param, scope_param) = parse_closure(cb)?;
    let ctx = TranslateCtx { param, scope_param, scope, column_refs: ctx_columns, nested_array: None };
    translate_scalar(&closure.body, &ctx)
}

/// Translates a `map!` callback body into the list of output fields it
/// projects. A body that is a single scalar expression (not an object
/// literal) projects one field named after its trailing path segment.
pub fn translate_projection(
    cb: &Callback,
    ctx_columns: &IndexMap<String, String>,
    scope: &Scope,
    nested_array: Option<&dyn Fn(&str, &ExprClosure) -> Result<String>>,
) -> Result<Vec<ProjectedField>> {
    let (closure, param, scope_param) = parse_closure(cb)?;
    project_closure(&closure, &param, scope_param, ctx_columns, scope, nested_array)
}

/// Shared by [`translate_projection`] and the composer's handling of a
/// nested `.map()` on a relation field, which parses its own closure
/// directly rather than going through a [`Callback`].
#[allow(clippy::too_many_arguments)]
pub(crate) fn project_closure(
    closure: &ExprClosure,
    param: &str,
    scope_param: Option<String>,
    ctx_columns: &IndexMap<String, String>,
    scope: &Scope,
    nested_array: Option<&dyn Fn(&str, &ExprClosure) -> Result<String>>,
) -> Result<Vec<ProjectedField>> {
    let ctx = TranslateCtx {
        param: param.to_string(),
        scope_param,
        scope,
        column_refs: ctx_columns,
        nested_array,
    };
    flatten_projection(&closure.body, "", &ctx)
}

/// Walks a projection body, flattening nested object expressions and
/// nested-relation `.map()` calls into dot-prefixed output keys.
///
/// A field `a: { b: expr }` flattens to output key `"a.b"`. A field whose
/// value is `<relation>.map(inner => ...)`, where `<relation>` was already
/// widened by an `include()` into dot-prefixed columns, is treated the same
/// way: the inner closure's parameter is bound to those joined columns and
/// its body recurses under the same prefix — there is one joined row per
/// output row, so this never aggregates into an array. A `.map()` on a
/// relation that was *not* included instead falls through to
/// [`translate_scalar`], which resolves it through `ctx.nested_array` into a
/// correlated `ARRAY(SELECT ...)` subquery.
fn flatten_projection(expr: &Expr, prefix: &str, ctx: &TranslateCtx<'_>) -> Result<Vec<ProjectedField>> {
    match expr {
        Expr::Struct(expr_struct) => {
            let mut fields = Vec::with_capacity(expr_struct.fields.len());
            for field in &expr_struct.fields {
                let key = match &field.member {
                    syn::Member::Named(ident) => ident.to_string(),
                    syn::Member::Unnamed(idx) => idx.index.to_string(),
                };
                let child_prefix = if prefix.is_empty() { key } else { format!("{prefix}.{key}") };
                fields.extend(flatten_projection(&field.expr, &child_prefix, ctx)?);
            }
            Ok(fields)
        }
        Expr::MethodCall(call) if call.method == "map" => {
            if let Some(relation) = row_field_path(&call.receiver, ctx).map(|p| p.join(".")) {
                let joined_prefix = format!("{relation}.");
                let is_joined_relation = !ctx.column_refs.contains_key(&relation)
                    && ctx.column_refs.keys().any(|k| k.starts_with(&joined_prefix));
                if is_joined_relation {
                    let inner = match call.args.first() {
                        Some(Expr::Closure(inner)) => inner,
                        _ => return Err(Error::unsupported("nested relation `.map()` requires a closure argument")),
                    };
                    let inner_param = closure_param_name(inner)?;
                    let sub_columns: IndexMap<String, String> = ctx
                        .column_refs
                        .iter()
                        .filter_map(|(k, v)| k.strip_prefix(&joined_prefix).map(|rest| (rest.to_string(), v.clone())))
                        .collect();
                    let inner_ctx = TranslateCtx {
                        param: inner_param,
                        scope_param: ctx.scope_param.clone(),
                        scope: ctx.scope,
                        column_refs: &sub_columns,
                        nested_array: ctx.nested_array,
                    };
                    return flatten_projection(&inner.body, prefix, &inner_ctx);
                }
            }
            leaf(expr, prefix, ctx)
        }
        other => leaf(other, prefix, ctx),
    }
}

fn leaf(expr: &Expr, prefix: &str, ctx: &TranslateCtx<'_>) -> Result<Vec<ProjectedField>> {
    let sql = translate_scalar(expr, ctx)?;
    let key = if prefix.is_empty() {
        trailing_name(expr).unwrap_or_else(|| "value".to_string())
    } else {
        prefix.to_string()
    };
    Ok(vec![ProjectedField { output_key: key, sql }])
}

fn trailing_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Field(f) => match &f.member {
            syn::Member::Named(ident) => Some(ident.to_string()),
            syn::Member::Unnamed(idx) => Some(idx.index.to_string()),
        },
        _ => None,
    }
}

/// Which closure parameter a member-access chain bottoms out on.
enum PathBase {
    Row,
    Scope,
}

/// Collects a `row.a.b.c` member-access chain into its dotted path segments,
/// innermost field last. Returns `None` if the base of the chain is not one
/// of the closure's parameters.
fn field_path(expr: &Expr, ctx: &TranslateCtx<'_>) -> Option<(PathBase, Vec<String>)> {
    match expr {
        Expr::Path(p) if p.path.is_ident(&ctx.param) => Some((PathBase::Row, Vec::new())),
        Expr::Path(p) if ctx.scope_param.as_deref().is_some_and(|s| p.path.is_ident(s)) => {
            Some((PathBase::Scope, Vec::new()))
        }
        Expr::Field(f) => {
            let (base, mut path) = field_path(&f.base, ctx)?;
            let segment = match &f.member {
                syn::Member::Named(ident) => ident.to_string(),
                syn::Member::Unnamed(idx) => idx.index.to_string(),
            };
            path.push(segment);
            Some((base, path))
        }
        _ => None,
    }
}

/// Row-only convenience for call sites (like the `.map()` relation check)
/// that only ever care about row-rooted paths.
fn row_field_path(expr: &Expr, ctx: &TranslateCtx<'_>) -> Option<Vec<String>> {
    match field_path(expr, ctx)? {
        (PathBase::Row, path) => Some(path),
        (PathBase::Scope, _) => None,
    }
}

fn scope_value_to_sql(value: &ScopeValue) -> Result<String> {
    match value {
        ScopeValue::Bool(b) => Ok(if *b { "TRUE".to_string() } else { "FALSE".to_string() }),
        ScopeValue::Number(n) => Ok(n.to_string()),
        ScopeValue::Text(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        ScopeValue::Null => Ok("NULL".to_string()),
        ScopeValue::Object(_) => Err(Error::unsupported("scope path resolves to a nested object, not a scalar")),
    }
}

fn translate_scalar(expr: &Expr, ctx: &TranslateCtx<'_>) -> Result<String> {
    match expr {
        Expr::Lit(lit) => translate_literal(&lit.lit),
        Expr::Path(p) if p.path.is_ident("None") => Ok("NULL".to_string()),
        Expr::Field(_) => {
            let (base, path) =
                field_path(expr, ctx).ok_or_else(|| Error::unresolved_path(expr_to_text(expr)))?;
            match base {
                PathBase::Row => resolve_column(&path, ctx),
                PathBase::Scope => {
                    let dotted = path.join(".");
                    let value = ctx
                        .scope
                        .resolve(&dotted)
                        .ok_or_else(|| Error::unresolved_path(format!("scope.{dotted}")))?;
                    scope_value_to_sql(value)
                }
            }
        }
        Expr::Unary(u) => {
            let inner = translate_scalar(&u.expr, ctx)?;
            match u.op {
                syn::UnOp::Not(_) => Ok(format!("NOT ({inner})")),
                syn::UnOp::Neg(_) => Ok(format!("-({inner})")),
                _ => Err(Error::unsupported("unary operator")),
            }
        }
        Expr::Paren(p) => translate_scalar(&p.expr, ctx),
        Expr::Binary(b) => translate_binary(b, ctx),
        Expr::MethodCall(call) => translate_method_call(call, ctx),
        Expr::Macro(mac) if mac.mac.path.is_ident("format") => translate_format(mac, ctx),
        other => Err(Error::unsupported(format!("expression `{}`", expr_to_text(other)))),
    }
}

fn expr_to_text(expr: &Expr) -> String {
    match expr {
        Expr::Field(f) => match &f.member {
            syn::Member::Named(ident) => format!("{}.{ident}", expr_to_text(&f.base)),
            syn::Member::Unnamed(idx) => format!("{}.{}", expr_to_text(&f.base), idx.index),
        },
        Expr::Path(p) => p
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default(),
        _ => "<expr>".to_string(),
    }
}

fn resolve_column(path: &[String], ctx: &TranslateCtx<'_>) -> Result<String> {
    let dotted = path.join(".");
    if let Some(sql) = ctx.column_refs.get(&dotted) {
        return Ok(sql.clone());
    }
    Err(Error::unresolved_path(dotted))
}

fn translate_literal(lit: &Lit) -> Result<String> {
    match lit {
        Lit::Str(s) => Ok(format!("'{}'", s.value().replace('\'', "''"))),
        Lit::Int(i) => Ok(i.base10_digits().to_string()),
        Lit::Float(f) => Ok(f.base10_digits().to_string()),
        Lit::Bool(b) => Ok(if b.value { "TRUE".to_string() } else { "FALSE".to_string() }),
        other => Err(Error::unsupported(format!("literal `{other:?}`"))),
    }
}

fn is_numeric_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Lit(l) if matches!(l.lit, Lit::Int(_) | Lit::Float(_)))
}

fn translate_binary(b: &syn::ExprBinary, ctx: &TranslateCtx<'_>) -> Result<String> {
    if matches!(b.op, syn::BinOp::Add(_)) && !(is_numeric_literal(&b.left) && is_numeric_literal(&b.right)) {
        return Err(Error::unsupported("`+` is only supported between two numeric literals")
            .push_hint("move non-literal arithmetic into the scope bag and pass it in as a parameter"));
    }
    let left = translate_scalar(&b.left, ctx)?;
    let right = translate_scalar(&b.right, ctx)?;
    if matches!(b.right.as_ref(), Expr::Path(p) if p.path.is_ident("None")) {
        return match b.op {
            syn::BinOp::Eq(_) => Ok(format!("{left} IS NULL")),
            syn::BinOp::Ne(_) => Ok(format!("{left} IS NOT NULL")),
            _ => Err(Error::unsupported("comparison against `None` other than `==`/`!=`")),
        };
    }
    let op = operators::sql_op(&b.op)?;
    Ok(format!("({left} {op} {right})"))
}

fn literal_text(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(l) => match &l.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        _ => None,
    }
}

fn translate_method_call(call: &syn::ExprMethodCall, ctx: &TranslateCtx<'_>) -> Result<String> {
    let method = call.method.to_string();

    if method == "includes" {
        if let Expr::Array(array) = &*call.receiver {
            let needle = call
                .args
                .first()
                .ok_or_else(|| Error::unsupported("includes() on an array literal requires one argument"))?;
            let needle_sql = translate_scalar(needle, ctx)?;
            let mut elements = Vec::with_capacity(array.elems.len());
            for elem in &array.elems {
                elements.push(translate_scalar(elem, ctx)?);
            }
            return Ok(format!("{needle_sql} = ANY(ARRAY[{}])", elements.join(", ")));
        }
    }

    if method == "map" {
        if let Some(path) = row_field_path(&call.receiver, ctx) {
            if !ctx.column_refs.contains_key(&path.join(".")) {
                if let (Some(nested), Some(arg)) = (ctx.nested_array, call.args.first()) {
                    if let Expr::Closure(inner) = arg {
                        return nested(&path.join("."), inner);
                    }
                }
                return Err(Error::unsupported(
                    "nested `.map(...)` on a relation requires a closure argument and a composer-provided join",
                ));
            }
        }
    }

    let receiver_sql = translate_scalar(&call.receiver, ctx)?;
    let mut args_sql = Vec::with_capacity(call.args.len());
    let mut raw_string_args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        args_sql.push(translate_scalar(arg, ctx)?);
        raw_string_args.push(literal_text(arg));
    }
    methods::translate_method(&receiver_sql, &method, &args_sql, &raw_string_args)
}

fn translate_format(mac: &syn::ExprMacro, ctx: &TranslateCtx<'_>) -> Result<String> {
    let parsed = mac
        .mac
        .parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
        .map_err(|e| Error::translation(format!("malformed format! arguments: {e}")))?;
    let mut iter = parsed.into_iter();
    let template = match iter.next() {
        Some(Expr::Lit(l)) => match l.lit {
            Lit::Str(s) => s.value(),
            _ => return Err(Error::unsupported("format! requires a string literal template")),
        },
        _ => return Err(Error::unsupported("format! requires a string literal template")),
    };
    let args: Vec<Expr> = iter.collect();

    let mut pieces = Vec::new();
    let mut rest = template.as_str();
    let mut arg_idx = 0;
    while let Some(pos) = rest.find("{}") {
        if !rest[..pos].is_empty() {
            pieces.push(format!("'{}'", rest[..pos].replace('\'', "''")));
        }
        let arg = args
            .get(arg_idx)
            .ok_or_else(|| Error::translation("format! has more `{}` placeholders than arguments"))?;
        pieces.push(format!("({})::text", translate_scalar(arg, ctx)?));
        arg_idx += 1;
        rest = &rest[pos + 2..];
    }
    if !rest.is_empty() {
        pieces.push(format!("'{}'", rest.replace('\'', "''")));
    }
    if pieces.is_empty() {
        return Ok("''".to_string());
    }
    Ok(pieces.join(" || "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> IndexMap<String, String> {
        let mut m = IndexMap::new();
        m.insert("id".to_string(), "\"t0\".\"id\"".to_string());
        m.insert("name".to_string(), "\"t0\".\"name\"".to_string());
        m.insert("age".to_string(), "\"t0\".\"age\"".to_string());
        m
    }

    #[test]
    fn translates_simple_comparison() {
        let cb = Callback::from_source("|u| u.age > 10");
        let sql = translate_predicate(&cb, &columns(), &Scope::new()).unwrap();
        assert_eq!(sql, "(\"t0\".\"age\" > 10)");
    }

    #[test]
    fn translates_logical_and() {
        let cb = Callback::from_source("|u| u.age > 10 && u.name == \"ada\"");
        let sql = translate_predicate(&cb, &columns(), &Scope::new()).unwrap();
        assert_eq!(sql, "((\"t0\".\"age\" > 10) AND (\"t0\".\"name\" = 'ada'))");
    }

    #[test]
    fn translates_method_call() {
        let cb = Callback::from_source("|u| u.name.startsWith(\"A\")");
        let sql = translate_predicate(&cb, &columns(), &Scope::new()).unwrap();
        assert_eq!(sql, "\"t0\".\"name\" LIKE 'A%'");
    }

    #[test]
    fn translates_scope_reference() {
        let mut scope = Scope::new();
        scope.insert("min_age", 18.0);
        let cb = Callback::from_source("|u, scope| u.age >= scope.min_age");
        let sql = translate_predicate(&cb, &columns(), &scope).unwrap();
        assert_eq!(sql, "(\"t0\".\"age\" >= 18)");
    }

    #[test]
    fn unresolved_field_is_an_error() {
        let cb = Callback::from_source("|u| u.nonexistent > 1");
        let err = translate_predicate(&cb, &columns(), &Scope::new()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Translation);
    }

    #[test]
    fn projects_object_literal_into_named_fields() {
        let cb = Callback::from_source("|u| Proj { id: u.id, upper: u.name.toUpperCase() }");
        let fields = translate_projection(&cb, &columns(), &Scope::new(), None).unwrap();
        assert_eq!(fields[0].output_key, "id");
        assert_eq!(fields[0].sql, "\"t0\".\"id\"");
        assert_eq!(fields[1].output_key, "upper");
        assert_eq!(fields[1].sql, "UPPER(\"t0\".\"name\")");
    }

    #[test]
    fn projects_bare_scalar_under_its_field_name() {
        let cb = Callback::from_source("|u| u.name");
        let fields = translate_projection(&cb, &columns(), &Scope::new(), None).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].output_key, "name");
        assert_eq!(fields[0].sql, "\"t0\".\"name\"");
    }

    #[test]
    fn translates_template_literal() {
        let cb = Callback::from_source("|u| Proj { label: format!(\"#{}\", u.id) }");
        let fields = translate_projection(&cb, &columns(), &Scope::new(), None).unwrap();
        assert_eq!(fields[0].sql, "'#' || (\"t0\".\"id\")::text");
    }

    #[test]
    fn order_key_translates_to_scalar_expression() {
        let cb = Callback::from_source("|u| u.name.toLowerCase()");
        let sql = translate_order_key(&cb, &columns(), &Scope::new()).unwrap();
        assert_eq!(sql, "LOWER(\"t0\".\"name\")");
    }

    #[test]
    fn literal_plus_literal_is_supported() {
        let cb = Callback::from_source("|u| Proj { total: 1 + 2 }");
        let fields = translate_projection(&cb, &columns(), &Scope::new(), None).unwrap();
        assert_eq!(fields[0].sql, "(1 + 2)");
    }

    #[test]
    fn non_literal_plus_is_rejected() {
        let cb = Callback::from_source("|u| u.age + 1 > 10");
        let err = translate_predicate(&cb, &columns(), &Scope::new()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Translation);
    }

    #[test]
    fn nested_object_literal_flattens_keys_with_dots() {
        let cb = Callback::from_source("|u| Proj { a: Inner { b: u.id } }");
        let fields = translate_projection(&cb, &columns(), &Scope::new(), None).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].output_key, "a.b");
        assert_eq!(fields[0].sql, "\"t0\".\"id\"");
    }

    fn joined_columns() -> IndexMap<String, String> {
        let mut m = columns();
        m.insert("posts.id".to_string(), "\"t1\".\"id\"".to_string());
        m.insert("posts.title".to_string(), "\"t1\".\"title\"".to_string());
        m
    }

    #[test]
    fn nested_relation_map_on_an_included_relation_flattens_under_the_same_key() {
        let cb = Callback::from_source("|u| Proj { p: u.posts.map(|post| Inner { pid: post.id }) }");
        let fields = translate_projection(&cb, &joined_columns(), &Scope::new(), None).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].output_key, "p.pid");
        assert_eq!(fields[0].sql, "\"t1\".\"id\"");
    }

    #[test]
    fn nested_relation_map_on_a_non_included_relation_uses_the_array_fallback() {
        let nested = |path: &str, _inner: &ExprClosure| -> Result<String> {
            Ok(format!("ARRAY(SELECT ... /* {path} */)"))
        };
        let cb = Callback::from_source("|u| Proj { p: u.posts.map(|post| post.id) }");
        let fields = translate_projection(&cb, &columns(), &Scope::new(), Some(&nested)).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].output_key, "p");
        assert!(fields[0].sql.contains("posts"));
    }

    #[test]
    fn substring_and_replace_and_round_translate() {
        let cb = Callback::from_source("|u| Proj { s: u.name.substring(1, 3), r: u.name.replace(\"a\", \"b\") }");
        let fields = translate_projection(&cb, &columns(), &Scope::new(), None).unwrap();
        assert_eq!(fields[0].sql, "SUBSTRING(\"t0\".\"name\" FROM (1) + 1 FOR 3)");
        assert_eq!(fields[1].sql, "REPLACE(\"t0\".\"name\", 'a', 'b')");
    }

    #[test]
    fn get_month_is_zero_based() {
        let cb = Callback::from_source("|u| u.name.getMonth()");
        let sql = translate_order_key(&cb, &columns(), &Scope::new()).unwrap();
        assert_eq!(sql, "(EXTRACT(MONTH FROM \"t0\".\"name\")::bigint - 1)");
    }

    #[test]
    fn array_literal_includes_becomes_any_array() {
        let cb = Callback::from_source("|u| [1, 2, 3].includes(u.age)");
        let sql = translate_predicate(&cb, &columns(), &Scope::new()).unwrap();
        assert_eq!(sql, "\"t0\".\"age\" = ANY(ARRAY[1, 2, 3])");
    }
}
