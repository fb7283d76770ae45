//! Predicate compilation to parameterized SQL.
//!
//! Column names come from [`EventColumn`], values always travel as bound
//! parameters.

use pheno_model::{Literal, Operator, Predicate};
use rusqlite::types::Value;

use crate::error::{Result, StoreError};
use crate::schema::EventColumn;

/// A WHERE clause and the parameters it binds, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// AND together every predicate. An empty list yields an empty clause.
pub fn compile(predicates: &[Predicate]) -> Result<WhereClause> {
    let mut parts = Vec::with_capacity(predicates.len());
    let mut params = Vec::new();
    for predicate in predicates {
        parts.push(compile_one(predicate, &mut params)?);
    }
    Ok(WhereClause {
        sql: parts.join(" AND "),
        params,
    })
}

fn compile_one(predicate: &Predicate, params: &mut Vec<Value>) -> Result<String> {
    let column: EventColumn = predicate.column.parse()?;
    let name = column.name();
    match predicate.operator {
        Operator::Eq => {
            let [value] = predicate.values.as_slice() else {
                return Err(StoreError::EmptyPredicate {
                    column: predicate.column.clone(),
                    count: predicate.values.len(),
                });
            };
            params.push(bind(column, value));
            Ok(format!("{name} = ?"))
        }
        Operator::In => {
            if predicate.values.is_empty() {
                return Ok("0".to_string());
            }
            let marks = vec!["?"; predicate.values.len()].join(", ");
            params.extend(predicate.values.iter().map(|value| bind(column, value)));
            Ok(format!("{name} IN ({marks})"))
        }
        Operator::StartsWithAny => {
            // substr keeps the comparison case-sensitive, unlike LIKE.
            let mut alternatives = Vec::with_capacity(predicate.values.len());
            for prefix in predicate.prefixes() {
                params.push(Value::Integer(prefix.chars().count() as i64));
                params.push(Value::Text(prefix));
                alternatives.push(format!("substr({name}, 1, ?) = ?"));
            }
            if alternatives.is_empty() {
                return Ok("0".to_string());
            }
            Ok(format!("({})", alternatives.join(" OR ")))
        }
        Operator::NotNull => Ok(format!("{name} IS NOT NULL")),
    }
}

fn bind(column: EventColumn, value: &Literal) -> Value {
    match value {
        Literal::Int(v) if column.is_integer() => Value::Integer(*v),
        Literal::Text(v) if column.is_integer() => v
            .trim()
            .parse::<i64>()
            .map_or_else(|_| Value::Text(v.clone()), Value::Integer),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use pheno_model::FieldId;

    use super::*;

    #[test]
    fn renders_placeholders_only() {
        let clause = compile(&[
            Predicate::in_list("phenotype", ["asthma", "x'; DROP TABLE phenotype_events; --"]),
            Predicate::equals("field_id", FieldId::new(41202)),
            Predicate::starts_with_any("field_value", ["I44", "I45"]),
            Predicate::not_null("data_value"),
        ])
        .unwrap();
        insta::assert_snapshot!(clause.sql, @"phenotype IN (?, ?) AND field_id = ? AND (substr(field_value, 1, ?) = ? OR substr(field_value, 1, ?) = ?) AND data_value IS NOT NULL");
        assert_eq!(
            clause.params,
            vec![
                Value::Text("asthma".into()),
                Value::Text("x'; DROP TABLE phenotype_events; --".into()),
                Value::Integer(41202),
                Value::Integer(3),
                Value::Text("I44".into()),
                Value::Integer(3),
                Value::Text("I45".into()),
            ]
        );
    }

    #[test]
    fn empty_lists_match_nothing() {
        let clause = compile(&[Predicate::in_list("eid", Vec::<i64>::new())]).unwrap();
        assert_eq!(clause.sql, "0");
        assert!(clause.params.is_empty());
        assert!(compile(&[]).unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_columns_and_malformed_equality() {
        assert!(matches!(
            compile(&[Predicate::equals("eid = 1 OR 1", 1i64)]),
            Err(StoreError::InvalidColumn(_))
        ));
        let malformed = Predicate {
            column: "eid".into(),
            operator: Operator::Eq,
            values: Vec::new(),
        };
        assert!(matches!(
            compile(&[malformed]),
            Err(StoreError::EmptyPredicate { count: 0, .. })
        ));
    }

    #[test]
    fn text_literals_bind_as_integers_on_integer_columns() {
        let clause = compile(&[Predicate::equals("eid", "1001")]).unwrap();
        assert_eq!(clause.params, vec![Value::Integer(1001)]);
    }
}
