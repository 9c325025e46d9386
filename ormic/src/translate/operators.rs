//! Binary and logical operator translation: `syn::BinOp` → SQL infix text.

use syn::BinOp;

use crate::error::Error;

/// Maps a Rust binary operator to its SQL spelling. Arithmetic `+` is
/// restricted by the caller to numeric-literal operands; everything else
/// here is a straight infix rewrite.
pub fn sql_op(op: &BinOp) -> Result<&'static str, Error> {
    Ok(match op {
        BinOp::Add(_) => "+",
        BinOp::Sub(_) => "-",
        BinOp::Mul(_) => "*",
        BinOp::Div(_) => "/",
        BinOp::Eq(_) => "=",
        BinOp::Ne(_) => "<>",
        BinOp::Lt(_) => "<",
        BinOp::Le(_) => "<=",
        BinOp::Gt(_) => ">",
        BinOp::Ge(_) => ">=",
        BinOp::And(_) => "AND",
        BinOp::Or(_) => "OR",
        other => return Err(Error::unsupported(format!("operator `{other:?}`"))),
    })
}
