//! Method-call translation: a fixed table of supported selector methods,
//! each accepted under both its JS spelling and its Rust-idiomatic spelling
//! so callbacks read naturally in either style.

use crate::error::Error;

fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Translates `<receiver>.<method>(<args>)` into a SQL expression, given the
/// already-translated receiver SQL and the already-translated argument SQL
/// fragments. `raw_args` carries the untranslated literal text of each
/// argument for methods (like `startsWith`) that need to splice it into a
/// `LIKE` pattern rather than pass it as a bound value.
pub fn translate_method(
    receiver_sql: &str,
    method: &str,
    args_sql: &[String],
    raw_string_args: &[Option<String>],
) -> Result<String, Error> {
    match method {
        "toLowerCase" | "to_lowercase" => Ok(format!("LOWER({receiver_sql})")),
        "toUpperCase" | "to_uppercase" => Ok(format!("UPPER({receiver_sql})")),
        "trim" => Ok(format!("TRIM({receiver_sql})")),
        "length" | "len" => Ok(format!("LENGTH({receiver_sql})")),
        "includes" | "contains" => {
            let pat = like_pattern(raw_string_args, 0, "%", "%")?;
            Ok(format!("{receiver_sql} LIKE '{pat}'"))
        }
        "startsWith" | "starts_with" => {
            let pat = like_pattern(raw_string_args, 0, "", "%")?;
            Ok(format!("{receiver_sql} LIKE '{pat}'"))
        }
        "endsWith" | "ends_with" => {
            let pat = like_pattern(raw_string_args, 0, "%", "")?;
            Ok(format!("{receiver_sql} LIKE '{pat}'"))
        }
        "getFullYear" | "year" => Ok(format!("EXTRACT(YEAR FROM {receiver_sql})::bigint")),
        // JS months are zero-based; Postgres EXTRACT(MONTH ...) is one-based.
        "getMonth" | "month" => Ok(format!("(EXTRACT(MONTH FROM {receiver_sql})::bigint - 1)")),
        "getDate" | "day" => Ok(format!("EXTRACT(DAY FROM {receiver_sql})::bigint")),
        "getHours" | "hour" => Ok(format!("EXTRACT(HOUR FROM {receiver_sql})::bigint")),
        "getMinutes" | "minute" => Ok(format!("EXTRACT(MINUTE FROM {receiver_sql})::bigint")),
        "getSeconds" | "second" => Ok(format!("EXTRACT(SECOND FROM {receiver_sql})::bigint")),
        "toString" | "to_string" => Ok(format!("{receiver_sql}::text")),
        "isNull" | "is_none" => Ok(format!("{receiver_sql} IS NULL")),
        "isSome" => Ok(format!("{receiver_sql} IS NOT NULL")),
        "substring" => {
            let start = args_sql.first().ok_or_else(|| Error::unsupported("substring() requires a start index"))?;
            match args_sql.get(1) {
                Some(len) => Ok(format!("SUBSTRING({receiver_sql} FROM ({start}) + 1 FOR {len})")),
                None => Ok(format!("SUBSTRING({receiver_sql} FROM ({start}) + 1)")),
            }
        }
        "replace" => {
            let from = args_sql.first().ok_or_else(|| Error::unsupported("replace() requires two arguments"))?;
            let to = args_sql.get(1).ok_or_else(|| Error::unsupported("replace() requires two arguments"))?;
            Ok(format!("REPLACE({receiver_sql}, {from}, {to})"))
        }
        "toFixed" | "round" => {
            let digits = args_sql.first().ok_or_else(|| Error::unsupported("toFixed() requires a digit count"))?;
            Ok(format!("ROUND(({receiver_sql})::numeric, {digits})"))
        }
        other => Err(Error::unsupported(format!("method `.{other}()`"))),
    }
}

fn like_pattern(
    raw_string_args: &[Option<String>],
    index: usize,
    prefix: &str,
    suffix: &str,
) -> Result<String, Error> {
    let arg = raw_string_args
        .get(index)
        .and_then(|a| a.as_ref())
        .ok_or_else(|| Error::unsupported("pattern method requires a string literal argument"))?;
    Ok(format!("{prefix}{}{suffix}", escape_literal(arg)))
}
