//! Built-in loader: fetch through a transport, then decode by format.

use std::sync::Arc;

use super::content::{AssetValue, LoadedContent};
use super::error::LoadError;
use super::loader::{Loader, ProgressReporter};
use super::transport::Transport;
use crate::items::{ItemType, LoadItem, Manifest};

/// Decoding strategy applied to fetched bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// UTF-8 text (text, css, javascript, svg, xml).
    Text,
    /// JSON document (json, spritesheet).
    Json,
    /// JSON wrapped in a callback invocation.
    Jsonp,
    /// Opaque bytes (binary, image, sound, video).
    Binary,
    /// Manifest listing further items.
    Manifest,
}

impl Format {
    pub fn for_type(item_type: ItemType) -> Self {
        match item_type {
            ItemType::Text | ItemType::Css | ItemType::Javascript | ItemType::Svg | ItemType::Xml => {
                Self::Text
            }
            ItemType::Json | ItemType::Spritesheet => Self::Json,
            ItemType::Jsonp => Self::Jsonp,
            ItemType::Binary | ItemType::Image | ItemType::Sound | ItemType::Video => Self::Binary,
            ItemType::Manifest => Self::Manifest,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Jsonp => "jsonp",
            Self::Binary => "binary",
            Self::Manifest => "manifest",
        }
    }

    /// Decode fetched bytes for `item`.
    pub fn decode(&self, item: &LoadItem, bytes: Vec<u8>) -> Result<LoadedContent, LoadError> {
        let value = match self {
            Self::Binary => {
                let shared: Arc<[u8]> = bytes.into();
                return Ok(LoadedContent::with_raw(
                    AssetValue::Bytes(Arc::clone(&shared)),
                    shared,
                ));
            }
            Self::Text => AssetValue::Text(utf8(item, &bytes)?.to_string()),
            Self::Json => AssetValue::Json(
                serde_json::from_slice(&bytes).map_err(|e| LoadError::decode(&item.src, e))?,
            ),
            Self::Jsonp => {
                let body = strip_callback(utf8(item, &bytes)?, item.callback.as_deref())
                    .ok_or_else(|| LoadError::decode(&item.src, "missing JSONP callback wrapper"))?;
                AssetValue::Json(
                    serde_json::from_str(body).map_err(|e| LoadError::decode(&item.src, e))?,
                )
            }
            Self::Manifest => {
                let manifest =
                    Manifest::from_slice(&bytes).map_err(|e| LoadError::decode(&item.src, e))?;
                AssetValue::Manifest(manifest.items())
            }
        };
        Ok(LoadedContent::with_raw(value, bytes))
    }
}

fn utf8<'a>(item: &LoadItem, bytes: &'a [u8]) -> Result<&'a str, LoadError> {
    std::str::from_utf8(bytes).map_err(|e| LoadError::decode(&item.src, e))
}

/// Return the argument of `name( ... )`, with an optional trailing `;`.
fn strip_callback<'a>(text: &'a str, callback: Option<&str>) -> Option<&'a str> {
    let text = text.trim();
    let text = text.strip_suffix(';').unwrap_or(text).trim_end();
    let open = text.find('(')?;
    let name = text[..open].trim();
    let valid_name = match callback {
        Some(expected) => name == expected,
        None => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        }
    };
    if !valid_name {
        return None;
    }
    text[open + 1..].strip_suffix(')')
}

/// The built-in per-format loader.
pub struct FormatLoader {
    format: Format,
    transport: Arc<dyn Transport>,
}

impl FormatLoader {
    pub fn new(format: Format, transport: Arc<dyn Transport>) -> Self {
        Self { format, transport }
    }

    pub fn for_type(item_type: ItemType, transport: Arc<dyn Transport>) -> Self {
        Self::new(Format::for_type(item_type), transport)
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

#[async_trait::async_trait]
impl Loader for FormatLoader {
    fn name(&self) -> &'static str {
        self.format.name()
    }

    async fn load(
        &self,
        item: &LoadItem,
        progress: &ProgressReporter,
    ) -> Result<LoadedContent, LoadError> {
        let bytes = self.transport.fetch(item, progress).await?;
        tracing::trace!(src = %item.src, bytes = bytes.len(), format = self.format.name(), "fetched");
        self.format.decode(item, bytes)
    }
}
