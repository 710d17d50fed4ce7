//! File snapshots and the editing-context preparer.
//!
//! A snapshot is the immutable baseline a pipeline run works against; each
//! run owns its own copy, so no locking is needed anywhere in this crate.

use crate::config::PipelineConfig;
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_64;

/// In-memory project files, path -> content. Paths use forward slashes and
/// are relative to the project root.
pub type FileSnapshot = BTreeMap<String, String>;

/// Filter a snapshot down to the paths the generator is allowed to edit.
///
/// Removes icon-directory paths and anything with an image extension.
/// Guarantee: output keys are a subset of input keys and content is never
/// mutated.
pub fn prepare_context(files: &FileSnapshot, config: &PipelineConfig) -> FileSnapshot {
    files
        .iter()
        .filter(|(path, _)| is_mutable_path(path, config))
        .map(|(path, content)| (path.clone(), content.clone()))
        .collect()
}

/// Whether a path may appear in a patch document at all.
pub fn is_mutable_path(path: &str, config: &PipelineConfig) -> bool {
    if path.starts_with(&config.icon_dir) {
        return false;
    }
    match extension(path) {
        Some(ext) => !config.image_extensions.contains(ext),
        None => true,
    }
}

/// Extension of a path, if any.
pub fn extension(path: &str) -> Option<&str> {
    let basename = path.rsplit('/').next().unwrap_or(path);
    basename.rsplit_once('.').map(|(_, ext)| ext)
}

/// xxh3 fingerprint of file content, used for cheap no-op detection.
pub fn content_fingerprint(content: &str) -> u64 {
    xxh3_64(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &str)]) -> FileSnapshot {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn test_prepare_context_drops_icons_and_images() {
        let files = snapshot(&[
            ("manifest.json", "{}"),
            ("background.js", "// bg"),
            ("icons/icon16.png", "<binary>"),
            ("logo.png", "<binary>"),
        ]);
        let config = PipelineConfig::default();
        let prepared = prepare_context(&files, &config);

        assert_eq!(prepared.len(), 2);
        assert!(prepared.contains_key("manifest.json"));
        assert!(prepared.contains_key("background.js"));
        assert!(!prepared.contains_key("icons/icon16.png"));
        assert!(!prepared.contains_key("logo.png"));
    }

    #[test]
    fn test_prepare_context_preserves_content() {
        let files = snapshot(&[("popup.html", "<html></html>")]);
        let prepared = prepare_context(&files, &PipelineConfig::default());
        assert_eq!(prepared.get("popup.html").map(String::as_str), Some("<html></html>"));
    }

    #[test]
    fn test_icon_dir_filter_is_prefix_based() {
        let config = PipelineConfig::default();
        // Only the configured directory is excluded, not names containing "icons"
        assert!(!is_mutable_path("icons/anything.txt", &config));
        assert!(is_mutable_path("my-icons.txt", &config));
    }

    #[test]
    fn test_extension_extraction() {
        assert_eq!(extension("a/b/c.png"), Some("png"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("dir.d/noext"), None);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        assert_eq!(content_fingerprint("abc"), content_fingerprint("abc"));
        assert_ne!(content_fingerprint("abc"), content_fingerprint("abd"));
    }
}
