//! Node metadata derived from an actor, and writing generated properties.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::{actors::Actor, errors::Result, mapper::FieldDescriptor};

/// Identity of a generated node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub package_name: String,
    pub class_name: String,
    pub display_name: String,
    pub description: String,
    pub actor_id: String,
    /// Sent as the integration platform header.
    pub platform: String,
    /// Sent as the integration app id header.
    pub app_id: String,
}

impl NodeConfig {
    pub fn from_actor(actor: &Actor, platform: impl Into<String>) -> Self {
        let name = actor.name.as_str();
        let words: Vec<String> = name.split('-').map(capitalize).collect();
        let display = actor
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| words.join(" "));

        Self {
            package_name: format!("n8n-nodes-apify-{name}"),
            class_name: format!("Apify{}", words.concat()),
            display_name: format!("Apify {display}"),
            description: actor.description.clone().unwrap_or_default(),
            actor_id: actor.id.clone(),
            platform: platform.into(),
            app_id: format!("{name}-app"),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Writes `fields` as a pretty-printed JSON array.
pub fn emit_properties<W: Write>(fields: &[FieldDescriptor], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, fields)?;
    writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    Ok(())
}
