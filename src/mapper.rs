//! Input schema to form field mapping.
//!
//! Pure and deterministic: one schema property yields exactly one
//! [`FieldDescriptor`]. Combinations the table does not cover degrade to a
//! plain text field and produce a [`MappingWarning`] instead of an error, so
//! a schema change on the remote side never breaks generation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::schema::{Editor, FieldType, InputSchema, InputSchemaField};

/// Rows shown for multi-line text and code editors.
pub const MULTILINE_ROWS: u32 = 5;

/// UI-facing description of one form field.
///
/// Serializes to the host platform's node property shape
/// (`displayName`, `name`, `type`, `typeOptions`, `options`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub display_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Value,
    #[serde(flatten)]
    pub widget: Widget,
}

impl FieldDescriptor {
    /// Collection groups when the field is a repeatable sub-record.
    pub fn collection(&self) -> Option<&[CollectionGroup]> {
        match &self.widget {
            Widget::FixedCollection { options, .. } => Some(options),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Widget {
    /// Plain or multi-line text.
    #[serde(rename = "string")]
    Text {
        #[serde(
            rename = "typeOptions",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        type_options: Option<TextOptions>,
    },
    Options {
        options: Vec<ChoiceOption>,
    },
    MultiOptions {
        options: Vec<ChoiceOption>,
    },
    DateTime,
    Number {
        #[serde(rename = "typeOptions", default)]
        type_options: NumberOptions,
    },
    Boolean,
    /// Free-form JSON text.
    Json,
    FixedCollection {
        #[serde(rename = "typeOptions", default)]
        type_options: CollectionOptions,
        options: Vec<CollectionGroup>,
    },
}

impl Widget {
    pub fn text() -> Self {
        Widget::Text { type_options: None }
    }

    pub fn multiline() -> Self {
        Widget::Text {
            type_options: Some(TextOptions {
                rows: MULTILINE_ROWS,
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Widget::Text { .. } => "string",
            Widget::Options { .. } => "options",
            Widget::MultiOptions { .. } => "multiOptions",
            Widget::DateTime => "dateTime",
            Widget::Number { .. } => "number",
            Widget::Boolean => "boolean",
            Widget::Json => "json",
            Widget::FixedCollection { .. } => "fixedCollection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOptions {
    pub rows: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOptions {
    pub multiple_values: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            multiple_values: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub name: String,
    pub value: String,
}

/// One repeatable group of a collection field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGroup {
    pub name: String,
    pub display_name: String,
    pub values: Vec<CollectionField>,
}

impl CollectionGroup {
    /// How entries of this group become request values.
    ///
    /// A group whose only sub-field is `value` unpacks to bare primitives;
    /// any other shape (`url`, `key`/`value`) is sent as records.
    pub fn unpack(&self) -> Unpack {
        match self.values.as_slice() {
            [only] if only.name == "value" => Unpack::Values,
            _ => Unpack::Records,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unpack {
    Values,
    Records,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionField {
    pub display_name: String,
    pub name: String,
    #[serde(rename = "type", default = "string_kind")]
    pub kind: String,
    #[serde(default = "empty_string")]
    pub default: Value,
}

impl CollectionField {
    fn string(display_name: &str, name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            name: name.to_string(),
            kind: string_kind(),
            default: empty_string(),
        }
    }
}

fn string_kind() -> String {
    "string".to_string()
}

fn empty_string() -> Value {
    Value::String(String::new())
}

/// A property that fell back to plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWarning {
    pub field: String,
    pub field_type: String,
    pub editor: String,
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported input type {} (editor {}) for field {}; using a text field",
            self.field_type, self.editor, self.field
        )
    }
}

/// Result of mapping a whole schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedSchema {
    pub fields: Vec<FieldDescriptor>,
    pub warnings: Vec<MappingWarning>,
}

/// Maps every property of `schema`, preserving declaration order.
pub fn map_schema(schema: &InputSchema) -> MappedSchema {
    let mut mapped = MappedSchema::default();
    for (name, field) in schema.fields() {
        let (descriptor, warning) = map_field(name, &field, schema.is_required(name));
        mapped.fields.push(descriptor);
        if let Some(warning) = warning {
            mapped.warnings.push(warning);
        }
    }
    mapped
}

/// Maps one property. Never fails; unsupported input yields a text field and a warning.
pub fn map_field(
    name: &str,
    field: &InputSchemaField,
    required: bool,
) -> (FieldDescriptor, Option<MappingWarning>) {
    let (widget, warning) = match widget_for(field) {
        Some(widget) => (widget, None),
        None => {
            let warning = MappingWarning {
                field: name.to_string(),
                field_type: field.field_type.to_string(),
                editor: field.editor().to_string(),
            };
            #[cfg(feature = "tracing")]
            tracing::warn!(
                field = name,
                field_type = %field.field_type,
                editor = %field.editor(),
                "unsupported input type; falling back to text field"
            );
            (Widget::text(), Some(warning))
        }
    };

    let default = default_for(&widget, field);
    let descriptor = FieldDescriptor {
        display_name: field
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| name.to_string()),
        name: name.to_string(),
        description: field.description.clone().unwrap_or_default(),
        required,
        default,
        widget,
    };
    (descriptor, warning)
}

fn widget_for(field: &InputSchemaField) -> Option<Widget> {
    let editor = field.editor();
    let widget = match (&field.field_type, &editor) {
        (FieldType::String, Editor::Textarea | Editor::Javascript | Editor::Python) => {
            Widget::multiline()
        }
        (FieldType::String, Editor::Select) => Widget::Options {
            options: choices(field.enum_values.as_deref(), field.enum_titles.as_deref()),
        },
        (FieldType::String, _) if field.enum_values.is_some() => Widget::Options {
            options: choices(field.enum_values.as_deref(), field.enum_titles.as_deref()),
        },
        (FieldType::String, Editor::Datepicker) => Widget::DateTime,
        (FieldType::String, _) => Widget::text(),

        (FieldType::Integer, _) => Widget::Number {
            type_options: NumberOptions {
                min_value: field.minimum,
                max_value: field.maximum,
            },
        },
        (FieldType::Boolean, _) => Widget::Boolean,

        (FieldType::Array, Editor::Json) => Widget::Json,
        (FieldType::Array, Editor::RequestListSources) => collection(CollectionGroup {
            name: "items".into(),
            display_name: "Items".into(),
            values: vec![CollectionField::string("Item", "url")],
        }),
        (FieldType::Array, Editor::StringList) => collection(CollectionGroup {
            name: "values".into(),
            display_name: "Values".into(),
            values: vec![CollectionField::string("Value", "value")],
        }),
        (FieldType::Array, Editor::Select) => {
            let items = field.items.as_ref();
            Widget::MultiOptions {
                options: choices(
                    items.and_then(|i| i.enum_values.as_deref()),
                    items.and_then(|i| i.enum_titles.as_deref()),
                ),
            }
        }
        (FieldType::Array, Editor::KeyValue) => collection(CollectionGroup {
            name: "pairs".into(),
            display_name: "Key-Value Pairs".into(),
            values: vec![
                CollectionField::string("Key", "key"),
                CollectionField::string("Value", "value"),
            ],
        }),
        (FieldType::Array, _) => Widget::Json,

        (FieldType::Object, Editor::None | Editor::Json | Editor::Proxy) => Widget::Json,
        (FieldType::Object, _) | (FieldType::Other(_), _) => return None,
    };
    Some(widget)
}

fn collection(group: CollectionGroup) -> Widget {
    Widget::FixedCollection {
        type_options: CollectionOptions::default(),
        options: vec![group],
    }
}

fn choices(values: Option<&[String]>, titles: Option<&[String]>) -> Vec<ChoiceOption> {
    values
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(idx, value)| ChoiceOption {
            name: titles
                .and_then(|t| t.get(idx))
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| value.clone()),
            value: value.clone(),
        })
        .collect()
}

fn default_for(widget: &Widget, field: &InputSchemaField) -> Value {
    let declared = field.declared_default();
    match widget {
        Widget::Number { .. } => declared.cloned().unwrap_or_else(|| json!(0)),
        Widget::Boolean => declared.cloned().unwrap_or(Value::Bool(false)),
        Widget::Json => match declared {
            Some(Value::String(s)) => Value::String(s.clone()),
            Some(other) => Value::String(other.to_string()),
            None => empty_string(),
        },
        Widget::MultiOptions { .. } => json!([]),
        Widget::FixedCollection { .. } => json!({}),
        Widget::Text { .. } | Widget::Options { .. } | Widget::DateTime => match declared {
            Some(value) if !value.is_object() && !value.is_array() => value.clone(),
            _ => empty_string(),
        },
    }
}
