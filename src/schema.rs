//! Actor input schema as published on a build.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Input schema of a build (`actorDefinition.input`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl InputSchema {
    /// Every declared property in schema order.
    ///
    /// A property that is not an object comes back with an `Other` type so
    /// the mapper degrades it to text instead of dropping it.
    pub fn fields(&self) -> impl Iterator<Item = (&str, InputSchemaField)> + '_ {
        self.properties.iter().map(|(name, raw)| {
            let field = if raw.is_object() {
                serde_json::from_value::<InputSchemaField>(raw.clone())
                    .unwrap_or_else(|_| InputSchemaField::fallback(raw))
            } else {
                InputSchemaField::new(FieldType::Other(describe_type(None)))
            };
            (name.as_str(), field)
        })
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }
}

/// One declared input property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSchemaField {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefill: Option<Value>,
    #[serde(
        rename = "enum",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub enum_titles: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsSchema>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub section_caption: Option<String>,
}

impl InputSchemaField {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Default::default()
        }
    }

    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_prefill(mut self, value: Value) -> Self {
        self.prefill = Some(value);
        self
    }

    pub fn editor(&self) -> Editor {
        Editor::from(self.editor.as_deref())
    }

    /// What can still be read from a property that failed to parse.
    fn fallback(raw: &Value) -> Self {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            field_type: FieldType::Other(describe_type(raw.get("type"))),
            title: text("title"),
            description: text("description"),
            ..Default::default()
        }
    }

    /// `default`, then `prefill`; JSON `null` counts as absent.
    pub fn declared_default(&self) -> Option<&Value> {
        self.default
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| self.prefill.as_ref().filter(|v| !v.is_null()))
    }
}

/// `items` of an array property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsSchema {
    #[serde(rename = "type", default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(
        rename = "enum",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub enum_titles: Option<Vec<String>>,
}

/// Declared JSON type of a property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Boolean,
    Array,
    Object,
    /// Unknown type name, or a list of types.
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        match value {
            "string" => FieldType::String,
            "integer" => FieldType::Integer,
            "boolean" => FieldType::Boolean,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            other => FieldType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw {
            Value::String(s) => FieldType::from(s.as_str()),
            other => FieldType::Other(describe_type(Some(&other))),
        })
    }
}

/// Reads an optional key, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).ok())
}

fn describe_type(raw: Option<&Value>) -> String {
    match raw {
        None | Some(Value::Null) => "<missing>".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .map(|t| t.as_str().unwrap_or("?"))
            .collect::<Vec<_>>()
            .join("|"),
        Some(other) => other.to_string(),
    }
}

/// UI editor hint of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Editor {
    None,
    Textfield,
    Textarea,
    Javascript,
    Python,
    Select,
    Datepicker,
    Json,
    Proxy,
    RequestListSources,
    StringList,
    KeyValue,
    Other(String),
}

impl From<Option<&str>> for Editor {
    fn from(value: Option<&str>) -> Self {
        match value {
            None => Editor::None,
            Some("textfield") => Editor::Textfield,
            Some("textarea") => Editor::Textarea,
            Some("javascript") => Editor::Javascript,
            Some("python") => Editor::Python,
            Some("select") => Editor::Select,
            Some("datepicker") => Editor::Datepicker,
            Some("json") => Editor::Json,
            Some("proxy") => Editor::Proxy,
            Some("requestListSources") => Editor::RequestListSources,
            Some("stringList") => Editor::StringList,
            Some("keyValue") => Editor::KeyValue,
            Some(other) => Editor::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Editor::None => "<none>",
            Editor::Textfield => "textfield",
            Editor::Textarea => "textarea",
            Editor::Javascript => "javascript",
            Editor::Python => "python",
            Editor::Select => "select",
            Editor::Datepicker => "datepicker",
            Editor::Json => "json",
            Editor::Proxy => "proxy",
            Editor::RequestListSources => "requestListSources",
            Editor::StringList => "stringList",
            Editor::KeyValue => "keyValue",
            Editor::Other(raw) => raw.as_str(),
        };
        f.write_str(label)
    }
}
