//! Media catalog domain model
//!
//! Defines the asset types shared by the sync engine, the persisted catalog
//! and the control API, plus the lenient parser for upstream catalog
//! entries. Upstream data is never trusted: every field has a default, a
//! malformed entry is dropped without aborting the batch, and inactive
//! entries are filtered out before they reach the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Layout of one catalog asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    /// One full-screen source
    Single,
    /// Two-pane split layout driven by sub-assets
    Multiple,
}

impl MediaKind {
    /// Parse the upstream `mediaType` value; anything unrecognized is SINGLE
    pub fn from_api(value: &str) -> Self {
        match value {
            "MULTIPLE" => MediaKind::Multiple,
            _ => MediaKind::Single,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Single => "SINGLE",
            MediaKind::Multiple => "MULTIPLE",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source type of a sub-asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlType {
    Video,
    Image,
}

impl UrlType {
    /// Parse the upstream `urlType` value; anything unrecognized is video
    pub fn from_api(value: &str) -> Self {
        match value {
            "image" => UrlType::Image,
            _ => UrlType::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlType::Video => "video",
            UrlType::Image => "image",
        }
    }
}

impl std::fmt::Display for UrlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pane source of a MULTIPLE asset
///
/// Index 0 renders in the left pane, index 1 in the right pane. Only video
/// sub-assets are ever downloaded; images render from their remote URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAsset {
    pub id: String,
    pub url_type: UrlType,
    pub url: String,
    pub local_path: Option<String>,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: MediaKind,
    pub primary_url: String,
    pub local_path: Option<String>,
    pub thumbnail_url: String,
    pub duration_seconds: i64,
    pub display_order: i64,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub sub_assets: Vec<SubAsset>,
}

impl MediaAsset {
    /// Parse one upstream catalog entry.
    ///
    /// Returns `None` only when the entry has no usable id. Every other
    /// field takes its default on absence or type mismatch. A malformed
    /// element inside `multipleUrl` is skipped without dropping the entry.
    pub fn from_api_entry(entry: &Value) -> Option<MediaAsset> {
        let id = opt_string(entry, "_id", "");
        let id = if id.is_empty() {
            opt_string(entry, "id", "")
        } else {
            id
        };
        if id.is_empty() {
            warn!("Skipping catalog entry without id: {}", entry);
            return None;
        }

        let sub_assets = entry
            .get("multipleUrl")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        if !item.is_object() {
                            warn!("Skipping malformed sub-entry for asset {}", id);
                            return None;
                        }
                        let sub_id = opt_string(item, "_id", "");
                        let sub_id = if sub_id.is_empty() {
                            opt_string(item, "id", "")
                        } else {
                            sub_id
                        };
                        Some(SubAsset {
                            id: sub_id,
                            url_type: UrlType::from_api(&opt_string(item, "urlType", "")),
                            url: opt_string(item, "url", ""),
                            local_path: None,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(MediaAsset {
            id,
            title: opt_string(entry, "title", ""),
            description: opt_string(entry, "description", ""),
            kind: MediaKind::from_api(&opt_string(entry, "mediaType", "")),
            primary_url: opt_string(entry, "url", ""),
            local_path: None,
            thumbnail_url: opt_string(entry, "thumbnailUrl", ""),
            duration_seconds: opt_i64(entry, "duration", 0),
            display_order: opt_i64(entry, "displayOrder", 0),
            active: opt_bool(entry, "isActive", false),
            created_at: opt_string(entry, "createdAt", ""),
            updated_at: opt_string(entry, "updatedAt", ""),
            sub_assets,
        })
    }

    /// Whether the scheduler can do anything with this asset.
    ///
    /// MULTIPLE needs two panes; SINGLE needs some source at all.
    pub fn is_playable(&self) -> bool {
        match self.kind {
            MediaKind::Multiple => self.sub_assets.len() >= 2,
            MediaKind::Single => !self.primary_url.is_empty() || self.local_path.is_some(),
        }
    }
}

/// Parse an upstream `mediaAllData` array: malformed entries are skipped,
/// inactive entries filtered, source order preserved.
pub fn parse_catalog_entries(entries: &[Value]) -> Vec<MediaAsset> {
    entries
        .iter()
        .filter_map(MediaAsset::from_api_entry)
        .filter(|asset| {
            if !asset.active {
                warn!("Dropping inactive catalog entry {}", asset.id);
            }
            asset.active
        })
        .collect()
}

fn opt_string(value: &Value, key: &str, default: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn opt_i64(value: &Value, key: &str, default: i64) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn opt_bool(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(default)
}
