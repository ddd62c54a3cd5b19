//! Decoded load results.

use std::sync::Arc;

use crate::items::LoadItem;

/// Decoded payload of a completed item.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetValue {
    Text(String),
    Json(serde_json::Value),
    /// Opaque bytes; media decoding is left to the host.
    Bytes(Arc<[u8]>),
    /// Child items listed by a manifest, already path-resolved.
    Manifest(Vec<LoadItem>),
}

impl AssetValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Result of a successful load: the decoded value plus the raw bytes it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedContent {
    value: AssetValue,
    raw: Option<Arc<[u8]>>,
}

impl LoadedContent {
    pub fn new(value: AssetValue) -> Self {
        Self { value, raw: None }
    }

    pub fn with_raw(value: AssetValue, raw: impl Into<Arc<[u8]>>) -> Self {
        Self {
            value,
            raw: Some(raw.into()),
        }
    }

    pub fn value(&self) -> &AssetValue {
        &self.value
    }

    /// Undecoded payload, if the loader kept it.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Size of the raw payload in bytes (0 when not kept).
    pub fn raw_len(&self) -> usize {
        self.raw.as_ref().map_or(0, |r| r.len())
    }
}
