use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::types::{Record, RecordId, RecordKind};

pub const DB_PATH: &str = "sees_directory.json";

type Fields = BTreeMap<String, Value>;

/// On-disk layout: one keyed document map per kind,
/// `{ "students": { "<id>": { "<field>": <value> } }, ... }`.
///
/// Unknown top-level collections are preserved on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    collections: BTreeMap<String, BTreeMap<RecordId, Fields>>,
}

impl Document {
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).context("malformed directory document")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Records of one kind. Non-string values are stored as their JSON
    /// text; nulls are dropped.
    pub fn records(&self, kind: RecordKind) -> Vec<Record> {
        let Some(docs) = self.collections.get(kind.storage_name()) else {
            return Vec::new();
        };

        docs.iter()
            .map(|(id, fields)| Record {
                id: id.clone(),
                kind,
                fields: fields
                    .iter()
                    .filter_map(|(name, value)| {
                        let text = match value {
                            Value::Null => return None,
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        Some((name.clone(), text))
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn upsert(&mut self, record: &Record) {
        let fields = record
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        self.collections
            .entry(record.kind.storage_name().to_string())
            .or_default()
            .insert(record.id.clone(), fields);
    }

    /// Returns false when the record was not stored.
    pub fn remove(&mut self, kind: RecordKind, id: &str) -> bool {
        self.collections
            .get_mut(kind.storage_name())
            .and_then(|docs| docs.remove(id))
            .is_some()
    }

    pub fn len(&self, kind: RecordKind) -> usize {
        self.collections
            .get(kind.storage_name())
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

/// Reads the document, treating a missing file as an empty directory.
pub fn load_document(path: &Path) -> Result<Document> {
    match std::fs::read_to_string(path) {
        Ok(text) => Document::from_json(&text)
            .with_context(|| format!("reading {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("[STORE] {} not found, starting empty", path.display());
            Ok(Document::default())
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}
