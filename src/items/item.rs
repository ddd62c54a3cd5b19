//! Load item descriptor and type tags.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of asset type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Binary,
    Css,
    Image,
    Javascript,
    Json,
    Jsonp,
    Manifest,
    Sound,
    Spritesheet,
    Svg,
    Text,
    Video,
    Xml,
}

impl ItemType {
    pub const ALL: [ItemType; 13] = [
        Self::Binary,
        Self::Css,
        Self::Image,
        Self::Javascript,
        Self::Json,
        Self::Jsonp,
        Self::Manifest,
        Self::Sound,
        Self::Spritesheet,
        Self::Svg,
        Self::Text,
        Self::Video,
        Self::Xml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Css => "css",
            Self::Image => "image",
            Self::Javascript => "javascript",
            Self::Json => "json",
            Self::Jsonp => "jsonp",
            Self::Manifest => "manifest",
            Self::Sound => "sound",
            Self::Spritesheet => "spritesheet",
            Self::Svg => "svg",
            Self::Text => "text",
            Self::Video => "video",
            Self::Xml => "xml",
        }
    }

    /// Infer a type from a source extension. Unknown extensions load as text.
    pub fn from_src(src: &str) -> Self {
        let path = src.split(['?', '#']).next().unwrap_or(src);
        let file = path.rsplit('/').next().unwrap_or(path);
        let ext = match file.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return Self::Text,
        };
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => Self::Image,
            "ogg" | "mp3" | "wav" | "m4a" | "aac" | "flac" => Self::Sound,
            "mp4" | "webm" | "ts" | "mov" => Self::Video,
            "json" => Self::Json,
            "xml" => Self::Xml,
            "css" => Self::Css,
            "js" => Self::Javascript,
            "svg" => Self::Svg,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown item type: {s}"))
    }
}

/// Request method handed to the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

/// Descriptor of a single asset to fetch and decode.
///
/// Items are immutable once submitted; the queue shares them as `Arc<LoadItem>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadItem {
    pub src: String,
    /// Inferred from `src` when absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub method: Method,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, rename = "loadTimeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintain_order: Option<bool>,
    /// JSONP callback name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl LoadItem {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            item_type: None,
            id: None,
            method: Method::Get,
            headers: BTreeMap::new(),
            data: None,
            timeout_ms: None,
            maintain_order: None,
            callback: None,
            mime_type: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, item_type: ItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_maintain_order(mut self, maintain_order: bool) -> Self {
        self.maintain_order = Some(maintain_order);
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    /// Explicit type, or the one inferred from the source extension.
    pub fn resolved_type(&self) -> ItemType {
        self.item_type.unwrap_or_else(|| ItemType::from_src(&self.src))
    }

    /// Explicit id, or the source as submitted.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.src)
    }

    /// True when `key` names this item by id or by source.
    pub fn matches(&self, key: &str) -> bool {
        self.key() == key || self.src == key
    }

    /// Fill in defaults and prefix relative sources with `base_path`.
    ///
    /// The id is pinned to the source before the prefix is applied.
    pub fn normalized(mut self, base_path: Option<&str>) -> Self {
        self.item_type = Some(self.resolved_type());
        if self.id.is_none() {
            self.id = Some(self.src.clone());
        }
        if let Some(base) = base_path {
            self.src = join_path(base, &self.src);
        }
        self
    }
}

/// True for sources that must not receive a base path prefix.
pub(crate) fn is_absolute(src: &str) -> bool {
    src.starts_with('/') || src.contains("://")
}

pub(crate) fn join_path(base: &str, src: &str) -> String {
    if base.is_empty() || is_absolute(src) {
        return src.to_string();
    }
    if base.ends_with('/') {
        format!("{base}{src}")
    } else {
        format!("{base}/{src}")
    }
}
