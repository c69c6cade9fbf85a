//! Entity ⇄ attribute-map codec.
//!
//! This module is format-level only: it turns a serde-serializable record
//! into the store's flat scalar attribute map and back. Key-space policy
//! (row keys, templates, classification) lives elsewhere.

use crate::value::{AttrMap, Value};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value as Json};
use thiserror::Error as ThisError;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("record of type {type_name} did not serialize to a field map")]
    NotARecord { type_name: &'static str },

    #[error("deserialize error: {0}")]
    Deserialize(String),
}

/// Serialize a record into the store's flat attribute map.
///
/// Scalar fields map onto native [`Value`]s. Null fields are omitted.
/// Non-primitive fields (sequences, nested maps) are carried as JSON text
/// and restored by the inverse in [`from_attrs`].
pub fn to_attrs<T: Serialize>(record: &T) -> Result<AttrMap, SerializeError> {
    let json = serde_json::to_value(record).map_err(|e| SerializeError::Serialize(e.to_string()))?;

    let Json::Object(fields) = json else {
        return Err(SerializeError::NotARecord {
            type_name: std::any::type_name::<T>(),
        });
    };

    let mut attrs = AttrMap::new();
    for (name, field) in fields {
        let value = match field {
            Json::Null => continue,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => number_to_value(&n),
            Json::String(s) => Value::Text(s),
            composite @ (Json::Array(_) | Json::Object(_)) => Value::Text(
                serde_json::to_string(&composite)
                    .map_err(|e| SerializeError::Serialize(e.to_string()))?,
            ),
        };
        attrs.insert(name, value);
    }

    Ok(attrs)
}

/// Restore a record from its stored attribute map.
///
/// Restore is tolerant at single-attribute granularity: an attribute whose
/// stored form no longer binds to the record's field is dropped rather than
/// failing the record. Record types are expected to tolerate missing fields
/// (`#[serde(default)]` or `Option` fields).
pub fn from_attrs<T: DeserializeOwned>(attrs: &AttrMap) -> Result<T, SerializeError> {
    // Fast path: the whole map binds in one pass.
    let mut object = Map::new();
    for (name, value) in attrs {
        object.insert(name.clone(), value_to_json(value));
    }
    if let Ok(record) = serde_json::from_value(Json::Object(object.clone())) {
        return Ok(record);
    }

    // Tolerant path: bind attributes one at a time, skipping any whose
    // stored representation no longer fits the record. Text attributes get
    // a second chance as raw strings in case the revived JSON form was the
    // wrong interpretation.
    let mut working = Map::new();
    for (name, value) in attrs {
        for candidate in json_candidates(value) {
            let mut trial = working.clone();
            trial.insert(name.clone(), candidate.clone());
            if serde_json::from_value::<T>(Json::Object(trial.clone())).is_ok() {
                working = trial;
                break;
            }
        }
    }

    serde_json::from_value(Json::Object(working))
        .map_err(|e| SerializeError::Deserialize(e.to_string()))
}

fn number_to_value(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else if let Some(f) = n.as_f64() {
        Value::Float(f)
    } else {
        // u64 beyond i64 range: keep full precision as text.
        Value::Text(n.to_string())
    }
}

/// Revive one attribute into its most likely JSON form.
fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Text(s) => revive_text(s),
        Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
    }
}

/// A stored text attribute that parses as a JSON container is assumed to be
/// a serialized non-primitive field; anything else stays a plain string.
fn revive_text(s: &str) -> Json {
    if s.starts_with('{') || s.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Json>(s) {
            if parsed.is_array() || parsed.is_object() {
                return parsed;
            }
        }
    }
    Json::String(s.to_string())
}

fn json_candidates(value: &Value) -> Vec<Json> {
    match value {
        Value::Text(s) => {
            let revived = revive_text(s);
            if revived.is_string() {
                vec![revived]
            } else {
                vec![revived, Json::String(s.clone())]
            }
        }
        other => vec![value_to_json(other)],
    }
}

///
/// TESTS
///
