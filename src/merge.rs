//! Building the run input from build prefills and user-supplied values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    actors::Build,
    errors::{Error, Result, ValidationError},
    mapper::{CollectionGroup, FieldDescriptor, Unpack, Widget},
    schema::InputSchema,
};

/// Input payload posted when starting a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunRequest(Map<String, Value>);

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for RunRequest {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// `null` and `""` mean "not set": the API's own default applies.
///
/// `0`, `false` and empty arrays are real values and are kept.
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Prefilled values of every property of the build's input schema.
pub fn default_input_from_build(build: &Build) -> Map<String, Value> {
    build
        .input_schema()
        .map(default_input_from_schema)
        .unwrap_or_default()
}

/// Properties carrying a non-null `prefill`. Schema `default`s are left to the API.
pub fn default_input_from_schema(schema: &InputSchema) -> Map<String, Value> {
    schema
        .properties
        .iter()
        .filter_map(|(name, property)| {
            property
                .get("prefill")
                .filter(|prefill| !prefill.is_null())
                .map(|prefill| (name.clone(), prefill.clone()))
        })
        .collect()
}

/// Overlays `user` onto `defaults` key by key and drops unset values.
pub fn merge(defaults: &Map<String, Value>, user: &Map<String, Value>) -> RunRequest {
    let mut merged = defaults.clone();
    for (key, value) in user {
        merged.insert(key.clone(), value.clone());
    }
    merged.retain(|_, value| !is_unset(value));
    RunRequest(merged)
}

/// Flattens a collection value into the array the API expects.
///
/// `{"values": [{"value": "a"}, {"value": "b"}]}` becomes `["a", "b"]`;
/// record groups (`url`, `key`/`value`) keep their entries as objects. An
/// already flat array is passed through. Returns `None` when nothing was
/// entered, so the field is left out instead of sent as `[]`.
pub fn unpack_collection(
    name: &str,
    groups: &[CollectionGroup],
    value: &Value,
) -> Result<Option<Value>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        Value::Array(_) => Ok(Some(value.clone())),
        Value::Object(entries_by_group) => {
            for group in groups {
                let Some(entries) = entries_by_group.get(&group.name) else {
                    continue;
                };
                let entries = match entries {
                    Value::Array(entries) => entries.as_slice(),
                    Value::Object(_) => std::slice::from_ref(entries),
                    _ => {
                        return Err(invalid(name, "collection entries must be a list"));
                    }
                };
                let unpacked: Vec<Value> = match group.unpack() {
                    Unpack::Values => entries
                        .iter()
                        .filter_map(|entry| entry.get("value"))
                        .filter(|v| !is_unset(v))
                        .cloned()
                        .collect(),
                    Unpack::Records => entries
                        .iter()
                        .filter(|entry| entry.as_object().is_some_and(|o| !o.is_empty()))
                        .cloned()
                        .collect(),
                };
                if !unpacked.is_empty() {
                    return Ok(Some(Value::Array(unpacked)));
                }
            }
            Ok(None)
        }
        _ => Err(invalid(name, "expected a list or a collection")),
    }
}

/// Turns raw form values into request values.
///
/// Collection fields are unpacked, JSON text fields are parsed, and keys that
/// are neither declared in `fields` nor listed in `passthrough` are rejected.
pub fn resolve_user_values(
    fields: &[FieldDescriptor],
    passthrough: &[String],
    user: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut resolved = Map::new();
    for (key, value) in user {
        let Some(field) = fields.iter().find(|f| &f.name == key) else {
            if passthrough.iter().any(|p| p == key) {
                resolved.insert(key.clone(), value.clone());
                continue;
            }
            return Err(invalid(key, "is not declared by the actor input schema"));
        };

        match &field.widget {
            Widget::FixedCollection { options, .. } => {
                if let Some(unpacked) = unpack_collection(key, options, value)? {
                    resolved.insert(key.clone(), unpacked);
                }
            }
            Widget::Json => {
                resolved.insert(key.clone(), parse_json_text(key, value)?);
            }
            _ => {
                resolved.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(resolved)
}

fn parse_json_text(name: &str, value: &Value) -> Result<Value> {
    match value {
        Value::String(text) if text.trim().is_empty() => Ok(Value::String(String::new())),
        Value::String(text) => serde_json::from_str(text)
            .map_err(|err| invalid(name, &format!("invalid JSON: {err}"))),
        other => Ok(other.clone()),
    }
}

fn invalid(field: &str, message: &str) -> Error {
    Error::Validation(ValidationError::new(message).with_field(field))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{mapper::map_field, schema::FieldType, schema::InputSchemaField};

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn merge_overlays_user_values() {
        assert_eq!(merge(&obj(json!({})), &obj(json!({"a": 1}))).into_value(), json!({"a": 1}));
        assert_eq!(merge(&obj(json!({"a": 1})), &obj(json!({}))).into_value(), json!({"a": 1}));
        assert_eq!(
            merge(&obj(json!({"a": 1})), &obj(json!({"a": 2}))).into_value(),
            json!({"a": 2})
        );
    }

    #[test]
    fn merge_omits_unset_but_keeps_falsy_values() {
        let merged = merge(
            &obj(json!({"keep": "x", "blanked": "prefill"})),
            &obj(json!({"blanked": "", "nothing": null, "zero": 0, "off": false, "none": []})),
        );
        assert_eq!(
            merged.into_value(),
            json!({"keep": "x", "zero": 0, "off": false, "none": []})
        );
    }

    #[test]
    fn defaults_come_from_prefill_only() {
        let schema: InputSchema = serde_json::from_value(json!({
            "properties": {
                "query": { "type": "string", "prefill": "coffee", "default": "tea" },
                "maxItems": { "type": "integer", "default": 10 },
                "proxy": { "type": "object", "prefill": { "useApifyProxy": true } },
                "nulled": { "type": "string", "prefill": null }
            }
        }))
        .unwrap();
        let defaults = default_input_from_schema(&schema);
        assert_eq!(
            Value::Object(defaults),
            json!({"query": "coffee", "proxy": {"useApifyProxy": true}})
        );
    }

    fn string_list() -> FieldDescriptor {
        map_field(
            "queries",
            &InputSchemaField::new(FieldType::Array).with_editor("stringList"),
            false,
        )
        .0
    }

    fn url_list() -> FieldDescriptor {
        map_field(
            "categoryUrls",
            &InputSchemaField::new(FieldType::Array).with_editor("requestListSources"),
            true,
        )
        .0
    }

    #[test]
    fn string_list_unpacks_to_values() {
        let field = string_list();
        let groups = field.collection().unwrap();
        let out = unpack_collection(
            "queries",
            groups,
            &json!({"values": [{"value": "x"}, {"value": "y"}]}),
        )
        .unwrap();
        assert_eq!(out, Some(json!(["x", "y"])));
    }

    #[test]
    fn empty_collections_are_omitted() {
        let field = string_list();
        let groups = field.collection().unwrap();
        assert_eq!(unpack_collection("queries", groups, &json!({})).unwrap(), None);
        assert_eq!(
            unpack_collection("queries", groups, &json!({"values": []})).unwrap(),
            None
        );
        assert_eq!(unpack_collection("queries", groups, &json!([])).unwrap(), None);

        let resolved = resolve_user_values(
            &[field.clone()],
            &[],
            &obj(json!({"queries": {"values": []}})),
        )
        .unwrap();
        assert!(!resolved.contains_key("queries"));
    }

    #[test]
    fn url_lists_keep_records() {
        let field = url_list();
        let out = unpack_collection(
            "categoryUrls",
            field.collection().unwrap(),
            &json!({"items": [{"url": "http://x"}, {}]}),
        )
        .unwrap();
        assert_eq!(out, Some(json!([{"url": "http://x"}])));
    }

    #[test]
    fn flat_arrays_pass_through() {
        let resolved = resolve_user_values(
            &[url_list()],
            &[],
            &obj(json!({"categoryUrls": [{"url": "http://x"}]})),
        )
        .unwrap();
        assert_eq!(
            Value::Object(resolved),
            json!({"categoryUrls": [{"url": "http://x"}]})
        );
    }

    #[test]
    fn undeclared_keys_are_rejected_unless_passthrough() {
        let fields = vec![string_list()];
        let err = resolve_user_values(&fields, &[], &obj(json!({"bogus": 1}))).unwrap_err();
        match err {
            Error::Validation(v) => assert_eq!(v.field.as_deref(), Some("bogus")),
            other => panic!("expected validation error, got {other:?}"),
        }

        let resolved =
            resolve_user_values(&fields, &["bogus".to_string()], &obj(json!({"bogus": 1})))
                .unwrap();
        assert_eq!(resolved.get("bogus"), Some(&json!(1)));
    }

    #[test]
    fn json_text_is_parsed() {
        let field = map_field(
            "proxy",
            &InputSchemaField::new(FieldType::Object).with_editor("proxy"),
            false,
        )
        .0;
        let resolved = resolve_user_values(
            &[field.clone()],
            &[],
            &obj(json!({"proxy": "{\"useApifyProxy\": false}"})),
        )
        .unwrap();
        assert_eq!(resolved.get("proxy"), Some(&json!({"useApifyProxy": false})));

        let err = resolve_user_values(&[field], &[], &obj(json!({"proxy": "{nope"}))).unwrap_err();
        assert!(err.to_string().starts_with("proxy: invalid JSON"));
    }

    #[test]
    fn non_object_properties_accept_user_values() {
        let schema: InputSchema = serde_json::from_value(json!({
            "properties": { "q": { "type": "string" }, "legacy": true }
        }))
        .unwrap();
        let fields = crate::mapper::map_schema(&schema).fields;
        let resolved =
            resolve_user_values(&fields, &[], &obj(json!({"q": "x", "legacy": "kept"}))).unwrap();
        assert_eq!(Value::Object(resolved), json!({"q": "x", "legacy": "kept"}));
    }
}
