//! Export documents and the entity kinds they carry.
//!
//! Each manifest is a JSON object with one top-level array keyed by its
//! export name, e.g. `{"ExportWeapons": [ {...}, ... ]}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::NodeLabel;
use crate::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Resource,
    Weapon,
    Recipe,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Resource => "resource",
            EntityKind::Weapon => "weapon",
            EntityKind::Recipe => "recipe",
        }
    }

    pub fn label(&self) -> NodeLabel {
        match self {
            EntityKind::Resource => NodeLabel::Resource,
            EntityKind::Weapon => NodeLabel::Weapon,
            EntityKind::Recipe => NodeLabel::Recipe,
        }
    }

    /// Top-level key of the export document, also the manifest file stem.
    pub fn export_key(&self) -> &'static str {
        match self {
            EntityKind::Resource => "ExportResources",
            EntityKind::Weapon => "ExportWeapons",
            EntityKind::Recipe => "ExportRecipes",
        }
    }

    /// Local file name of this kind's manifest, e.g. `ExportWeapons_en.json`.
    pub fn manifest_file_name(&self, language: &str) -> String {
        format!("{}_{}.json", self.export_key(), language)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("export document is not a JSON object")]
    NotAnObject,

    #[error("export document has no `{key}` array")]
    MissingKey { key: &'static str },

    #[error("`{key}` is not an array")]
    NotAnArray { key: &'static str },
}

/// Pull the raw records of `kind` out of an export document.
///
/// Array entries that are not objects cannot be records; they are logged and
/// dropped.
pub fn records_from_document(kind: EntityKind, document: Value) -> Result<Vec<RawRecord>, DocumentError> {
    let key = kind.export_key();
    let Value::Object(mut root) = document else {
        return Err(DocumentError::NotAnObject);
    };
    let items = match root.remove(key) {
        None => return Err(DocumentError::MissingKey { key }),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(DocumentError::NotAnArray { key }),
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(record) => records.push(record),
            other => tracing::warn!(
                kind = %kind,
                index,
                found = json_kind(&other),
                "skipping non-object export entry"
            ),
        }
    }
    Ok(records)
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_names_follow_export_keys() {
        assert_eq!(EntityKind::Weapon.manifest_file_name("en"), "ExportWeapons_en.json");
        assert_eq!(EntityKind::Resource.manifest_file_name("de"), "ExportResources_de.json");
        assert_eq!(EntityKind::Recipe.manifest_file_name("en"), "ExportRecipes_en.json");
    }

    #[test]
    fn extracts_object_entries_only() {
        let doc = json!({"ExportResources": [{"uniqueName": "A"}, 3, {"uniqueName": "B"}]});
        let records = records_from_document(EntityKind::Resource, doc).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["uniqueName"], json!("B"));
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(matches!(
            records_from_document(EntityKind::Weapon, json!([])),
            Err(DocumentError::NotAnObject)
        ));
        assert!(matches!(
            records_from_document(EntityKind::Weapon, json!({"ExportRecipes": []})),
            Err(DocumentError::MissingKey { key: "ExportWeapons" })
        ));
        assert!(matches!(
            records_from_document(EntityKind::Weapon, json!({"ExportWeapons": {}})),
            Err(DocumentError::NotAnArray { .. })
        ));
    }
}
