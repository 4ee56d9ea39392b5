//! MongoDB-style query documents.
//!
//! Queries are never evaluated locally; they are composed as a typed
//! expression tree and serialised to the exact JSON shape the API server
//! evaluates (`{field: value}`, `{field: {"$in": [...]}}`,
//! `{"$and": [...]}` and so on).

use crate::error::{Result, StormError};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Per-field condition
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Eq(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Regex(String),
}

/// A query expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches everything
    Empty,
    Field(String, Cond),
    And(Vec<Query>),
    Or(Vec<Query>),
}

impl Query {
    pub fn field_eq<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::Field(field.into(), Cond::Eq(value.into()))
    }

    pub fn field_in<F, I, V>(field: F, values: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Field(
            field.into(),
            Cond::In(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn field_nin<F, I, V>(field: F, values: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Field(
            field.into(),
            Cond::Nin(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn field_regex<F: Into<String>, P: Into<String>>(field: F, pattern: P) -> Self {
        Self::Field(field.into(), Cond::Regex(pattern.into()))
    }

    pub fn and(queries: Vec<Query>) -> Self {
        Self::And(queries)
    }

    pub fn or(queries: Vec<Query>) -> Self {
        Self::Or(queries)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Serialise to the JSON document the API server evaluates
    pub fn to_value(&self) -> Value {
        match self {
            Self::Empty => Value::Object(Map::new()),
            Self::Field(field, cond) => {
                let value = match cond {
                    Cond::Eq(v) => v.clone(),
                    Cond::In(vs) => json!({"$in": vs}),
                    Cond::Nin(vs) => json!({"$nin": vs}),
                    Cond::Regex(p) => json!({"$regex": p}),
                };
                let mut map = Map::new();
                map.insert(field.clone(), value);
                Value::Object(map)
            }
            Self::And(qs) => json!({"$and": qs.iter().map(Query::to_value).collect::<Vec<_>>()}),
            Self::Or(qs) => json!({"$or": qs.iter().map(Query::to_value).collect::<Vec<_>>()}),
        }
    }

    /// Parse a JSON query document back into the expression tree
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| StormError::query("query document must be a JSON object"))?;
        if map.is_empty() {
            return Ok(Self::Empty);
        }

        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            parts.push(Self::parse_entry(key, value)?);
        }
        if parts.len() > 1 {
            // Multi-key documents are an implicit conjunction
            return Ok(Self::And(parts));
        }
        parts
            .pop()
            .ok_or_else(|| StormError::query("empty query document"))
    }

    fn parse_entry(key: &str, value: &Value) -> Result<Self> {
        match key {
            "$and" | "$or" => {
                let items = value
                    .as_array()
                    .ok_or_else(|| StormError::query(format!("{} expects an array", key)))?;
                let queries = items
                    .iter()
                    .map(Self::from_value)
                    .collect::<Result<Vec<_>>>()?;
                if key == "$and" {
                    Ok(Self::And(queries))
                } else {
                    Ok(Self::Or(queries))
                }
            }
            _ if key.starts_with('$') => {
                Err(StormError::query(format!("unsupported operator: {}", key)))
            }
            field => Ok(Self::Field(field.to_string(), Cond::parse(value)?)),
        }
    }
}

impl Cond {
    fn parse(value: &Value) -> Result<Self> {
        let Some(map) = value.as_object() else {
            return Ok(Self::Eq(value.clone()));
        };
        if let Some((op, operand)) = map.iter().next().filter(|_| map.len() == 1) {
            match op.as_str() {
                "$in" | "$nin" => {
                    let values = operand
                        .as_array()
                        .cloned()
                        .ok_or_else(|| StormError::query(format!("{} expects an array", op)))?;
                    return Ok(if op == "$in" {
                        Self::In(values)
                    } else {
                        Self::Nin(values)
                    });
                }
                "$regex" => {
                    let pattern = operand
                        .as_str()
                        .ok_or_else(|| StormError::query("$regex expects a string"))?;
                    return Ok(Self::Regex(pattern.to_string()));
                }
                _ if op.starts_with('$') => {
                    return Err(StormError::query(format!("unsupported operator: {}", op)));
                }
                _ => {}
            }
        }
        // A plain object with no operator keys is an exact match
        Ok(Self::Eq(value.clone()))
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_eq_shape() {
        let query = Query::field_eq("status", "UP");
        assert_eq!(query.to_value(), json!({"status": "UP"}));
    }

    #[test]
    fn test_field_in_shape() {
        let query = Query::field_in("engine._id", ["e-1", "e-2"]);
        assert_eq!(query.to_value(), json!({"engine._id": {"$in": ["e-1", "e-2"]}}));
    }

    #[test]
    fn test_and_shape() {
        let query = Query::and(vec![
            Query::field_eq("status", "UP"),
            Query::field_nin("cloud_id", ["n-1"]),
        ]);
        assert_eq!(
            query.to_value(),
            json!({"$and": [{"status": "UP"}, {"cloud_id": {"$nin": ["n-1"]}}]})
        );
    }

    #[test]
    fn test_empty_query_is_empty_document() {
        assert_eq!(Query::Empty.to_value(), json!({}));
        assert_eq!(Query::from_value(&json!({})).unwrap(), Query::Empty);
    }

    #[test]
    fn test_round_trip() {
        let query = Query::or(vec![
            Query::field_regex("name", "^web-"),
            Query::and(vec![
                Query::field_eq("status", "UP"),
                Query::field_in("cloud_id", ["a", "b"]),
            ]),
        ]);
        let parsed = Query::from_value(&query.to_value()).unwrap();
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_implicit_conjunction() {
        let parsed = Query::from_value(&json!({"status": "UP", "name": "n1"})).unwrap();
        match parsed {
            Query::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected $and, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_operator_is_rejected() {
        assert!(Query::from_value(&json!({"$where": "1"})).is_err());
        assert!(Query::from_value(&json!({"field": {"$gt": 3}})).is_err());
    }
}
