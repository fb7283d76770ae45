//! Compiles [`Predicate`]s into polars filter expressions.
//!
//! Expressions run over the trimmed text columns of a
//! [`TableView`](crate::frame::TableView). Integer literals compare
//! numerically, so `"1.0"` matches `1`.

use pheno_model::{Literal, Operator, Predicate};
use polars::prelude::{DataType, Expr, col, lit};

use crate::error::ExtractError;

pub fn predicate_expr(predicate: &Predicate) -> Result<Expr, ExtractError> {
    let column = predicate.column.as_str();
    let expr = match predicate.operator {
        Operator::Eq if predicate.values.len() != 1 => {
            return Err(ExtractError::InvalidPredicate {
                column: predicate.column.clone(),
                message: format!(
                    "equality takes exactly one value, got {}",
                    predicate.values.len()
                ),
            });
        }
        Operator::Eq | Operator::In => any_of(
            predicate
                .values
                .iter()
                .map(|value| literal_eq(column, value)),
        ),
        Operator::StartsWithAny => any_of(
            predicate
                .prefixes()
                .map(|prefix| col(column).str().starts_with(lit(prefix))),
        ),
        Operator::NotNull => col(column).is_not_null(),
    };
    Ok(expr)
}

/// Conjunction of every predicate. Null cells never match.
pub fn all_of(predicates: &[Predicate]) -> Result<Expr, ExtractError> {
    let mut expr = lit(true);
    for predicate in predicates {
        expr = expr.and(predicate_expr(predicate)?);
    }
    Ok(expr.fill_null(lit(false)))
}

fn literal_eq(column: &str, value: &Literal) -> Expr {
    match value {
        Literal::Int(v) => col(column)
            .cast(DataType::Float64)
            .eq(lit(*v as f64)),
        Literal::Text(v) => col(column).eq(lit(v.clone())),
    }
}

/// Disjunction of `exprs`; an empty list matches nothing.
fn any_of(exprs: impl Iterator<Item = Expr>) -> Expr {
    exprs
        .reduce(|acc, expr| acc.or(expr))
        .unwrap_or_else(|| lit(false))
}
