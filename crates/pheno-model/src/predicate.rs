//! Backend-neutral row filters.
//!
//! Strategies and event queries describe *what* to match as a list of
//! [`Predicate`]s (implicitly AND-ed). Frame and SQL backends compile them
//! on their own terms; values are never spliced into query text.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<crate::FieldId> for Literal {
    fn from(value: crate::FieldId) -> Self {
        Self::Int(i64::from(value.get()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Column equals the single value.
    Eq,
    /// Column equals any of the values.
    In,
    /// Column starts with any of the values (code-family match).
    StartsWithAny,
    /// Column holds a value.
    NotNull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub values: Vec<Literal>,
}

impl Predicate {
    pub fn equals(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::Eq,
            values: vec![value.into()],
        }
    }

    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        Self {
            column: column.into(),
            operator: Operator::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Empty prefixes are dropped, so they never match every row.
    pub fn starts_with_any<I, V>(column: impl Into<String>, prefixes: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            column: column.into(),
            operator: Operator::StartsWithAny,
            values: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|prefix: &String| !prefix.is_empty())
                .map(Literal::Text)
                .collect(),
        }
    }

    /// Non-empty prefixes of a `StartsWithAny` predicate.
    pub fn prefixes(&self) -> impl Iterator<Item = String> + '_ {
        self.values
            .iter()
            .map(ToString::to_string)
            .filter(|prefix| !prefix.is_empty())
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::NotNull,
            values: Vec::new(),
        }
    }
}
