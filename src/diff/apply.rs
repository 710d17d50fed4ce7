//! Hunk application against an in-memory snapshot.
//!
//! Matching is strict: a hunk applies only where its context and removed
//! lines match exactly (with a single trailing-whitespace-insensitive
//! fallback). When the declared position and the actual match disagree, the
//! occurrence closest to the declared `old_start` wins. Anything fuzzier
//! risks silently corrupting unrelated code.

use crate::context::FileSnapshot;
use crate::diff::errors::DiffError;
use crate::diff::{FileHunkGroup, Hunk, PatchDocument};

/// Verify the document-level invariant: every non-new-file group must target
/// a path present in the snapshot, or the whole document is rejected.
pub fn verify_paths(document: &PatchDocument, snapshot: &FileSnapshot) -> Result<(), DiffError> {
    for group in &document.groups {
        if !group.is_new_file && !snapshot.contains_key(&group.path) {
            return Err(DiffError::UnknownPath {
                path: group.path.clone(),
            });
        }
    }
    Ok(())
}

/// Apply all hunks of one file group and return the new file content.
///
/// Atomic per file: on any hunk failure the error is returned and nothing is
/// committed (the snapshot is never mutated by this function at all).
pub fn apply_group(group: &FileHunkGroup, snapshot: &FileSnapshot) -> Result<String, DiffError> {
    // Building from scratch is only valid when the path is genuinely absent;
    // an all-insertion group against an existing file must not discard its
    // content, so it falls through to ordinary hunk application.
    if group.is_new_file && !snapshot.contains_key(&group.path) {
        return build_new_file(group);
    }

    let original = snapshot
        .get(&group.path)
        .ok_or_else(|| DiffError::UnknownPath {
            path: group.path.clone(),
        })?;

    let had_trailing_newline = original.ends_with('\n');
    let mut lines: Vec<String> = original.lines().map(str::to_string).collect();

    // Offset between declared old-file positions and the working copy as
    // earlier hunks grow or shrink it.
    let mut delta: isize = 0;

    for (index, hunk) in group.hunks.iter().enumerate() {
        delta += apply_hunk(hunk, &mut lines, delta, &group.path, index)?;
    }

    let mut content = lines.join("\n");
    if had_trailing_newline && !lines.is_empty() {
        content.push('\n');
    }
    Ok(content)
}

/// Assemble a created file from its add-only hunks.
fn build_new_file(group: &FileHunkGroup) -> Result<String, DiffError> {
    let mut lines = Vec::new();
    for hunk in &group.hunks {
        for line in hunk.new_lines() {
            lines.push(line);
        }
    }
    let mut content = lines.join("\n");
    if !lines.is_empty() {
        content.push('\n');
    }
    Ok(content)
}

/// Apply one hunk in place. Returns the line-count delta it introduced.
fn apply_hunk(
    hunk: &Hunk,
    lines: &mut Vec<String>,
    delta: isize,
    path: &str,
    index: usize,
) -> Result<isize, DiffError> {
    let old = hunk.old_lines();
    let new = hunk.new_lines();

    // Expected 0-based position of the old block, adjusted for earlier hunks.
    // For pure insertions (old_count == 0) the declared start names the line
    // *after which* to insert, which is the same index 0-based.
    let declared = if hunk.old_count == 0 {
        hunk.old_start as isize + delta
    } else {
        hunk.old_start as isize - 1 + delta
    };
    let anchor = declared.clamp(0, lines.len() as isize) as usize;

    if old.is_empty() {
        let at = anchor.min(lines.len());
        lines.splice(at..at, new.iter().map(|s| s.to_string()));
        return Ok(new.len() as isize);
    }

    let position = match find_block(lines, &old, anchor, str::eq) {
        Some(pos) => pos,
        None => match find_block(lines, &old, anchor, eq_ignore_trailing_ws) {
            Some(pos) => pos,
            None => {
                // The hunk may already be applied; matching new content at
                // the anchor is a no-op, mirroring edit idempotency.
                if !new.is_empty() && find_block(lines, &new, anchor, str::eq).is_some() {
                    return Ok(0);
                }
                return Err(DiffError::ContextMismatch {
                    path: path.to_string(),
                    hunk: index,
                    near_line: hunk.old_start,
                    hint: mismatch_hint(lines, &old, anchor),
                });
            }
        },
    };

    lines.splice(
        position..position + old.len(),
        new.iter().map(|s| s.to_string()),
    );
    Ok(new.len() as isize - old.len() as isize)
}

/// Find the occurrence of `block` in `lines` closest to `anchor`.
///
/// Searches outward from the anchor so that when the block occurs more than
/// once the occurrence nearest the declared position wins.
fn find_block(
    lines: &[String],
    block: &[&str],
    anchor: usize,
    eq: fn(&str, &str) -> bool,
) -> Option<usize> {
    if block.len() > lines.len() {
        return None;
    }
    let last = lines.len() - block.len();
    let start = anchor.min(last);

    for offset in 0..=last {
        if offset <= start {
            let below = start - offset;
            if block_matches(lines, block, below, eq) {
                return Some(below);
            }
        }
        let above = start + offset;
        if offset > 0 && above <= last && block_matches(lines, block, above, eq) {
            return Some(above);
        }
    }
    None
}

fn block_matches(lines: &[String], block: &[&str], at: usize, eq: fn(&str, &str) -> bool) -> bool {
    block
        .iter()
        .zip(&lines[at..at + block.len()])
        .all(|(expected, actual)| eq(expected, actual))
}

fn eq_ignore_trailing_ws(a: &str, b: &str) -> bool {
    a.trim_end() == b.trim_end()
}

/// Render a " (closest line N: ...)" diagnostic naming the file line most
/// similar to the first expected line. Diagnostic only; never used to pick
/// an application site.
fn mismatch_hint(lines: &[String], old: &[&str], anchor: usize) -> String {
    let Some(first_expected) = old.first() else {
        return String::new();
    };
    let window_start = anchor.saturating_sub(5);
    let window_end = (anchor + 6).min(lines.len());

    let best = lines[window_start..window_end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            (
                window_start + i,
                strsim::normalized_levenshtein(first_expected, line),
            )
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((line_idx, score)) if score > 0.5 => format!(
            " (closest line {}: {:?})",
            line_idx + 1,
            lines[line_idx]
        ),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parser::parse;
    use proptest::prelude::*;
    use similar::TextDiff;

    fn snapshot(entries: &[(&str, &str)]) -> FileSnapshot {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    fn single_group(raw: &str) -> FileHunkGroup {
        let parsed = parse(raw).unwrap();
        assert!(parsed.failures.is_empty(), "{:?}", parsed.failures);
        parsed.document.groups.into_iter().next().unwrap()
    }

    #[test]
    fn test_apply_single_line_replacement() {
        let files = snapshot(&[("background.js", "const a = 1;\nconst b = 2;\nconst c = 4;\n")]);
        let group = single_group(
            "--- a/background.js\n+++ b/background.js\n@@ -1,3 +1,3 @@\n const a = 1;\n-const b = 2;\n+const b = 3;\n const c = 4;\n",
        );
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "const a = 1;\nconst b = 3;\nconst c = 4;\n");
    }

    #[test]
    fn test_apply_prefers_occurrence_closest_to_declared_start() {
        // "x" appears at lines 1 and 5; the hunk says line 5.
        let files = snapshot(&[("a.js", "x\nb\nc\nd\nx\nf\n")]);
        let group = single_group("--- a/a.js\n+++ b/a.js\n@@ -5,1 +5,1 @@\n-x\n+y\n");
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "x\nb\nc\nd\ny\nf\n");
    }

    #[test]
    fn test_apply_all_insertion_group_into_existing_file_keeps_content() {
        // Every hunk has an empty old range, so the group is flagged as a
        // creation, but the target already exists; its content must survive.
        let files = snapshot(&[("popup.js", "a();\nb();\nc();\n")]);
        let group = single_group("--- a/popup.js\n+++ b/popup.js\n@@ -2,0 +3,1 @@\n+inserted();\n");
        assert!(group.is_new_file);
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "a();\nb();\ninserted();\nc();\n");
    }

    #[test]
    fn test_apply_pure_insertion() {
        let files = snapshot(&[("a.js", "one\ntwo\n")]);
        let group = single_group("--- a/a.js\n+++ b/a.js\n@@ -1,0 +2,1 @@\n+inserted\n");
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "one\ninserted\ntwo\n");
    }

    #[test]
    fn test_apply_insertion_at_top() {
        let files = snapshot(&[("a.js", "one\n")]);
        let group = single_group("--- a/a.js\n+++ b/a.js\n@@ -0,0 +1,1 @@\n+first\n");
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "first\none\n");
    }

    #[test]
    fn test_apply_multiple_hunks_with_shift() {
        let content = "a\nb\nc\nd\ne\nf\n";
        let files = snapshot(&[("a.js", content)]);
        let raw = "\
--- a/a.js
+++ b/a.js
@@ -1,1 +1,2 @@
-a
+a1
+a2
@@ -5,1 +6,1 @@
-e
+E
";
        let group = single_group(raw);
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "a1\na2\nb\nc\nd\nE\nf\n");
    }

    #[test]
    fn test_apply_context_mismatch_is_error() {
        let files = snapshot(&[("a.js", "completely\ndifferent\ncontent\n")]);
        let group = single_group("--- a/a.js\n+++ b/a.js\n@@ -1,1 +1,1 @@\n-expected line\n+new line\n");
        let err = apply_group(&group, &files).unwrap_err();
        assert!(matches!(err, DiffError::ContextMismatch { hunk: 0, .. }));
    }

    #[test]
    fn test_apply_mismatch_hint_names_similar_line() {
        let files = snapshot(&[("a.js", "const enabled = true;\n")]);
        let group =
            single_group("--- a/a.js\n+++ b/a.js\n@@ -1,1 +1,1 @@\n-const enabled = false;\n+const enabled = null;\n");
        let err = apply_group(&group, &files).unwrap_err();
        match err {
            DiffError::ContextMismatch { hint, .. } => {
                assert!(hint.contains("closest line 1"), "hint was {:?}", hint)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_apply_trailing_whitespace_fallback() {
        let files = snapshot(&[("a.js", "let x = 1;  \n")]);
        let group = single_group("--- a/a.js\n+++ b/a.js\n@@ -1,1 +1,1 @@\n-let x = 1;\n+let x = 2;\n");
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "let x = 2;\n");
    }

    #[test]
    fn test_apply_noop_diff_is_idempotent() {
        // The replacement already happened; re-applying must not fail and
        // must leave content unchanged.
        let files = snapshot(&[("a.js", "const b = 3;\n")]);
        let group = single_group("--- a/a.js\n+++ b/a.js\n@@ -1,1 +1,1 @@\n-const b = 2;\n+const b = 3;\n");
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "const b = 3;\n");
    }

    #[test]
    fn test_apply_context_only_hunk_is_noop() {
        let files = snapshot(&[("a.js", "a\nb\n")]);
        let group = single_group("--- a/a.js\n+++ b/a.js\n@@ -1,2 +1,2 @@\n a\n b\n");
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "a\nb\n");
    }

    #[test]
    fn test_apply_new_file() {
        let files = FileSnapshot::new();
        let group =
            single_group("--- /dev/null\n+++ b/options.html\n@@ -0,0 +1,2 @@\n+<html>\n+</html>\n");
        let result = apply_group(&group, &files).unwrap();
        assert_eq!(result, "<html>\n</html>\n");
    }

    #[test]
    fn test_verify_paths_rejects_unknown_file() {
        let files = snapshot(&[("a.js", "x\n")]);
        let parsed = parse("--- a/missing.js\n+++ b/missing.js\n@@ -1,1 +1,1 @@\n-x\n+y\n").unwrap();
        let err = verify_paths(&parsed.document, &files).unwrap_err();
        assert!(matches!(err, DiffError::UnknownPath { .. }));
        assert!(err.is_document_scoped());
    }

    #[test]
    fn test_verify_paths_allows_new_files() {
        let files = snapshot(&[("a.js", "x\n")]);
        let parsed =
            parse("--- /dev/null\n+++ b/new.js\n@@ -0,0 +1,1 @@\n+hello\n").unwrap();
        assert!(verify_paths(&parsed.document, &files).is_ok());
    }

    proptest! {
        /// A diff produced by `similar` over two arbitrary small texts must
        /// parse and apply back to the modified text.
        #[test]
        fn prop_similar_diff_round_trips(
            old in proptest::collection::vec("[a-z]{0,8}", 1..20),
            new in proptest::collection::vec("[a-z]{0,8}", 1..20),
        ) {
            prop_assume!(old != new);
            let old_text = format!("{}\n", old.join("\n"));
            let new_text = format!("{}\n", new.join("\n"));

            let diff = TextDiff::from_lines(&old_text, &new_text);
            let unified = diff
                .unified_diff()
                .context_radius(2)
                .header("a/file.js", "b/file.js")
                .to_string();

            let parsed = parse(&unified).unwrap();
            prop_assert!(parsed.failures.is_empty());
            prop_assert_eq!(parsed.document.groups.len(), 1);

            let files = snapshot(&[("file.js", &old_text)]);
            let result = apply_group(&parsed.document.groups[0], &files).unwrap();
            prop_assert_eq!(result, new_text);
        }

        /// Touched paths reported by a parsed document are exactly the paths
        /// its groups name.
        #[test]
        fn prop_touched_paths_match_groups(names in proptest::collection::vec("[a-z]{1,6}\\.js", 1..5)) {
            let mut raw = String::new();
            for name in &names {
                raw.push_str(&format!(
                    "--- a/{name}\n+++ b/{name}\n@@ -1,1 +1,1 @@\n-x\n+y\n"
                ));
            }
            let parsed = parse(&raw).unwrap();
            let touched = parsed.document.touched_paths();
            for path in &touched {
                prop_assert!(names.iter().any(|n| n == path));
            }
        }
    }
}
