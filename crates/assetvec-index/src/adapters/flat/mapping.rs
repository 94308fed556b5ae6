//! Persistent `assetId <-> label` mapping for the flat index.
//!
//! The flat index only knows integer labels. Labels are handed out from
//! `next_label` and never reused, so an updated asset always gets a fresh
//! label and the old one is retired.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{IndexError, Result};

/// Label type used by usearch
pub type Label = u64;

/// Bidirectional asset/label map plus the label counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelMapping {
    pub id_to_label: BTreeMap<String, Label>,
    pub label_to_id: BTreeMap<Label, String>,
    pub next_label: Label,
}

impl LabelMapping {
    /// Read a mapping file, `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read(path).map_err(|e| IndexError::io(path, e))?;
        let mut mapping: Self =
            serde_json::from_slice(&content).map_err(|e| IndexError::serialization(path, e))?;
        mapping.repair(path);
        Ok(Some(mapping))
    }

    /// Write the mapping file, replacing any previous one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_vec_pretty(self).map_err(|e| IndexError::serialization(path, e))?;
        std::fs::write(path, content).map_err(|e| IndexError::io(path, e))
    }

    pub fn label_for(&self, asset_id: &str) -> Option<Label> {
        self.id_to_label.get(asset_id).copied()
    }

    pub fn asset_for(&self, label: Label) -> Option<&str> {
        self.label_to_id.get(&label).map(String::as_str)
    }

    /// Number of live assets.
    pub fn len(&self) -> usize {
        self.id_to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_label.is_empty()
    }

    /// Label the next assignment will use.
    pub fn peek_label(&self) -> Label {
        self.next_label
    }

    /// Record `asset_id` under the next label and advance the counter.
    pub fn assign(&mut self, asset_id: &str) -> Label {
        let label = self.next_label;
        self.id_to_label.insert(asset_id.to_string(), label);
        self.label_to_id.insert(label, asset_id.to_string());
        self.next_label += 1;
        label
    }

    /// Advance the counter without assigning, returning the skipped label.
    pub fn skip_label(&mut self) -> Label {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Forget `asset_id`, returning its retired label.
    pub fn release(&mut self, asset_id: &str) -> Option<Label> {
        let label = self.id_to_label.remove(asset_id)?;
        self.label_to_id.remove(&label);
        Some(label)
    }

    /// Drop every entry while keeping the counter.
    pub fn clear_entries(&mut self) {
        self.id_to_label.clear();
        self.label_to_id.clear();
    }

    /// Whether both directions describe the same pairs.
    pub fn is_consistent(&self) -> bool {
        self.id_to_label.len() == self.label_to_id.len()
            && self
                .id_to_label
                .iter()
                .all(|(id, label)| self.label_to_id.get(label) == Some(id))
    }

    /// Drop pairs the two directions disagree on and lift `next_label` past
    /// every label the file mentions.
    fn repair(&mut self, path: &Path) {
        let before = (self.id_to_label.len(), self.label_to_id.len());
        let max_seen = self
            .id_to_label
            .values()
            .chain(self.label_to_id.keys())
            .copied()
            .max();

        let label_to_id = &self.label_to_id;
        self.id_to_label
            .retain(|id, label| label_to_id.get(label) == Some(id));
        let id_to_label = &self.id_to_label;
        self.label_to_id
            .retain(|label, id| id_to_label.get(id) == Some(label));

        let after = (self.id_to_label.len(), self.label_to_id.len());
        if before != after {
            warn!(
                "Mapping {:?}: dropped inconsistent entries (idToLabel {} -> {}, labelToId {} -> {})",
                path, before.0, after.0, before.1, after.1
            );
        }

        if let Some(max) = max_seen {
            if self.next_label <= max {
                warn!(
                    "Mapping {:?}: nextLabel {} not past label {}, raising it",
                    path, self.next_label, max
                );
                self.next_label = max + 1;
            }
        }
    }
}
