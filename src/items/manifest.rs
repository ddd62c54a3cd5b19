//! Manifest parsing and validation for LQ-CORE.
//!
//! A manifest lists items to load, either as a bare array or as an object
//! with a `manifest` array and an optional `path` prefix:
//!
//! ```json
//! { "path": "assets/", "manifest": ["hero.png", { "id": "cfg", "src": "cfg.json" }] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::item::{join_path, LoadItem};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest entry {index} has an empty src")]
    EmptySrc { index: usize },
}

/// One manifest entry: a bare source string or a full item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Src(String),
    Item(LoadItem),
}

impl ManifestEntry {
    fn into_item(self) -> LoadItem {
        match self {
            Self::Src(src) => LoadItem::new(src),
            Self::Item(item) => item,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    List(Vec<ManifestEntry>),
    Object {
        #[serde(default)]
        path: Option<String>,
        manifest: Vec<ManifestEntry>,
    },
}

/// Parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Prefix applied to relative child sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub manifest: Vec<ManifestEntry>,
}

impl Manifest {
    /// Load manifest from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse manifest from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Self::from_slice(json.as_bytes())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        let manifest = match serde_json::from_slice(bytes)? {
            ManifestDocument::List(manifest) => Self { path: None, manifest },
            ManifestDocument::Object { path, manifest } => Self { path, manifest },
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject entries that cannot name anything to load.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for (index, entry) in self.manifest.iter().enumerate() {
            let src = match entry {
                ManifestEntry::Src(src) => src,
                ManifestEntry::Item(item) => &item.src,
            };
            if src.trim().is_empty() {
                return Err(ManifestError::EmptySrc { index });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// Child items with the manifest path applied to relative sources.
    pub fn items(&self) -> Vec<LoadItem> {
        self.manifest
            .iter()
            .cloned()
            .map(|entry| {
                let mut item = entry.into_item();
                if let Some(path) = &self.path {
                    item.src = join_path(path, &item.src);
                }
                item
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemType;

    #[test]
    fn parses_bare_list() {
        let m = Manifest::from_json(r#"["a.png", {"src": "b.json", "id": "b"}]"#).unwrap();
        let items = m.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].src, "a.png");
        assert_eq!(items[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn applies_path_to_relative_children() {
        let m = Manifest::from_json(
            r#"{"path": "img/", "manifest": ["a.png", "/abs/b.png", {"src": "c.svg", "type": "text"}]}"#,
        )
        .unwrap();
        let items = m.items();
        assert_eq!(items[0].src, "img/a.png");
        assert_eq!(items[1].src, "/abs/b.png");
        assert_eq!(items[2].src, "img/c.svg");
        assert_eq!(items[2].item_type, Some(ItemType::Text));
    }

    #[test]
    fn rejects_empty_src() {
        let err = Manifest::from_json(r#"["a.png", " "]"#).unwrap_err();
        assert!(matches!(err, ManifestError::EmptySrc { index: 1 }));
    }

    #[test]
    fn rejects_unknown_shape() {
        assert!(matches!(
            Manifest::from_json(r#"{"files": []}"#),
            Err(ManifestError::Json(_))
        ));
    }
}
