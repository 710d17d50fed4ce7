//! Pipeline and guard configuration.
//!
//! All knobs are serde-deserializable so a host application can ship its own
//! policy file; every field has a default matching the browser-extension
//! project layout this pipeline was built for.

use serde::Deserialize;
use std::collections::BTreeSet;

/// Configuration for one mutation pipeline instance.
///
/// Controls which paths are excluded from the editing context and which
/// extensions are treated as scripts for validation purposes.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory prefix holding icon assets; never offered to the generator.
    #[serde(default = "default_icon_dir")]
    pub icon_dir: String,
    /// Extensions treated as binary image content; never offered to the generator.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: BTreeSet<String>,
    /// Extensions validated through the external lint capability.
    #[serde(default = "default_script_extensions")]
    pub script_extensions: BTreeSet<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            icon_dir: default_icon_dir(),
            image_extensions: default_image_extensions(),
            script_extensions: default_script_extensions(),
        }
    }
}

/// Policy knobs for the deletion guard.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardPolicy {
    /// Basenames that may never be deleted, regardless of confirmation.
    #[serde(default = "default_critical_files")]
    pub critical_files: BTreeSet<String>,
    /// Deletion is denied while the project holds this many files or fewer.
    #[serde(default = "default_min_file_count")]
    pub min_file_count: usize,
    /// Extensions eligible for deletion at all.
    #[serde(default = "default_safe_extensions")]
    pub safe_extensions: BTreeSet<String>,
    /// Directory prefixes whose contents may be deleted only with confirmation.
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,
    /// Core runtime basenames that may be deleted only with confirmation.
    #[serde(default = "default_sensitive_files")]
    pub sensitive_files: BTreeSet<String>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            critical_files: default_critical_files(),
            min_file_count: default_min_file_count(),
            safe_extensions: default_safe_extensions(),
            protected_prefixes: default_protected_prefixes(),
            sensitive_files: default_sensitive_files(),
        }
    }
}

fn default_icon_dir() -> String {
    "icons/".to_string()
}

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_image_extensions() -> BTreeSet<String> {
    string_set(&["png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp"])
}

fn default_script_extensions() -> BTreeSet<String> {
    string_set(&["js", "mjs"])
}

fn default_critical_files() -> BTreeSet<String> {
    string_set(&["manifest.json"])
}

fn default_min_file_count() -> usize {
    4
}

fn default_safe_extensions() -> BTreeSet<String> {
    string_set(&[
        "js", "mjs", "html", "css", "json", "txt", "md", "png", "jpg", "jpeg", "gif", "svg",
        "ico", "webp",
    ])
}

fn default_protected_prefixes() -> Vec<String> {
    vec![
        "icons/".to_string(),
        "assets/".to_string(),
        "images/".to_string(),
    ]
}

fn default_sensitive_files() -> BTreeSet<String> {
    string_set(&["background.js", "content.js", "popup.js", "popup.html"])
}
