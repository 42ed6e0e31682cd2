//! Per-collection record layout shared by every storage backend.
//!
//! Both backends push records through [`normalize`] before persisting them, so
//! the JSON shape a caller gets back (field set, null handling, timestamp
//! units) does not depend on which backend is active.

use super::{Collection, Record};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-null string.
    Text,
    /// String or `null`; an empty string is stored as `null`.
    NullableText,
    /// Arbitrary JSON value.
    Json,
    /// Epoch milliseconds as a 64-bit integer.
    Timestamp,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldDefault {
    /// `""`, `null`, `{}` or `0` depending on the kind.
    Empty,
    Literal(&'static str),
    /// Value of another field of the same record.
    CopyOf(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Name in the JSON record.
    pub name: &'static str,
    /// Column name in the relational backend.
    pub column: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
    pub unique: bool,
}

const fn field(name: &'static str, column: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        column,
        kind,
        default: FieldDefault::Empty,
        unique: false,
    }
}

const ID: Field = field("id", "id", FieldKind::Text);
const CREATED_AT: Field = field("createdAt", "created_at", FieldKind::Timestamp);
const UPDATED_AT: Field = field("updatedAt", "updated_at", FieldKind::Timestamp);

const USERS: &[Field] = &[
    ID,
    Field {
        unique: true,
        ..field("username", "username", FieldKind::Text)
    },
    Field {
        default: FieldDefault::CopyOf("username"),
        ..field("name", "name", FieldKind::Text)
    },
    field("dept", "dept", FieldKind::Text),
    Field {
        default: FieldDefault::Literal("editor"),
        ..field("role", "role", FieldKind::Text)
    },
    field("passwordHash", "password_hash", FieldKind::Text),
    CREATED_AT,
    UPDATED_AT,
];

const TEMPLATES: &[Field] = &[
    ID,
    field("name", "name", FieldKind::Text),
    field("content", "content", FieldKind::Text),
    field("description", "description", FieldKind::Text),
    CREATED_AT,
    UPDATED_AT,
];

const DOCUMENTS: &[Field] = &[
    ID,
    field("templateId", "template_id", FieldKind::NullableText),
    field("content", "content", FieldKind::Text),
    field("data", "data", FieldKind::Json),
    field("rendered", "rendered", FieldKind::Text),
    field("fileName", "file_name", FieldKind::NullableText),
    CREATED_AT,
    UPDATED_AT,
];

pub fn fields(collection: Collection) -> &'static [Field] {
    match collection {
        Collection::Users => USERS,
        Collection::Templates => TEMPLATES,
        Collection::Documents => DOCUMENTS,
    }
}

/// Unique fields other than `id`.
pub fn unique_fields(collection: Collection) -> impl Iterator<Item = &'static Field> {
    fields(collection).iter().filter(|f| f.unique)
}

/// Brings `record` to the canonical shape of `collection`.
///
/// Unknown fields are dropped, missing or `null` fields take their default, and
/// values are coerced to the field kind.
pub fn normalize(collection: Collection, record: &Record) -> Record {
    let mut out = Map::new();
    for f in fields(collection) {
        let value = coerce(f.kind, record.get(f.name));
        out.insert(f.name.to_string(), value);
    }
    for f in fields(collection) {
        if is_unset(f.kind, &out[f.name]) {
            let default = default_value(f, &out);
            out.insert(f.name.to_string(), default);
        }
    }
    out
}

fn coerce(kind: FieldKind, value: Option<&Value>) -> Value {
    match (kind, value) {
        (_, None) | (_, Some(Value::Null)) => Value::Null,
        (FieldKind::Text, Some(Value::String(s))) => Value::String(s.clone()),
        (FieldKind::Text, Some(other)) => Value::String(other.to_string()),
        (FieldKind::NullableText, Some(Value::String(s))) if s.is_empty() => Value::Null,
        (FieldKind::NullableText, Some(Value::String(s))) => Value::String(s.clone()),
        (FieldKind::NullableText, Some(other)) => Value::String(other.to_string()),
        (FieldKind::Json, Some(v)) => v.clone(),
        (FieldKind::Timestamp, Some(v)) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}

fn is_unset(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::Text => value.is_null() || value.as_str() == Some(""),
        FieldKind::NullableText => false,
        FieldKind::Json | FieldKind::Timestamp => value.is_null(),
    }
}

fn default_value(field: &Field, record: &Record) -> Value {
    match field.default {
        FieldDefault::Literal(s) => Value::String(s.to_string()),
        FieldDefault::CopyOf(other) => match record.get(other) {
            Some(v) if !v.is_null() => v.clone(),
            _ => empty_value(field.kind),
        },
        FieldDefault::Empty => empty_value(field.kind),
    }
}

fn empty_value(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Text => Value::String(String::new()),
        FieldKind::NullableText => Value::Null,
        FieldKind::Json => Value::Object(Map::new()),
        FieldKind::Timestamp => Value::from(0_i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn document_defaults_and_null_handling() {
        let out = normalize(
            Collection::Documents,
            &record(json!({ "id": "d1", "fileName": "", "extra": 1, "createdAt": 5, "updatedAt": 5 })),
        );
        assert_eq!(
            Value::Object(out),
            json!({
                "id": "d1",
                "templateId": null,
                "content": "",
                "data": {},
                "rendered": "",
                "fileName": null,
                "createdAt": 5,
                "updatedAt": 5,
            })
        );
    }

    #[test]
    fn user_name_and_role_defaults() {
        let out = normalize(
            Collection::Users,
            &record(json!({ "id": "u1", "username": "ana", "passwordHash": "h" })),
        );
        assert_eq!(out["name"], json!("ana"));
        assert_eq!(out["role"], json!("editor"));
        assert_eq!(out["dept"], json!(""));
    }

    #[test]
    fn explicit_values_are_kept() {
        let out = normalize(
            Collection::Users,
            &record(json!({ "id": "u1", "username": "ana", "name": "Ana", "role": "admin" })),
        );
        assert_eq!(out["name"], json!("Ana"));
        assert_eq!(out["role"], json!("admin"));
    }

    #[test]
    fn only_username_is_unique() {
        let names: Vec<_> = unique_fields(Collection::Users).map(|f| f.name).collect();
        assert_eq!(names, vec!["username"]);
        assert_eq!(unique_fields(Collection::Documents).count(), 0);
    }
}
