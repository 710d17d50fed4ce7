//! Unified-diff parsing.
//!
//! The generator is asked for standard unified-diff output, but its text is
//! never trusted to be well-formed: every file section is parsed
//! independently so one malformed section fails only that file, and the
//! document as a whole is rejected only when no section parses at all.

use crate::diff::errors::DiffError;
use crate::diff::{FileHunkGroup, Hunk, HunkLine, PatchDocument};

/// A file section that could not be parsed; surfaced as a per-file failure.
#[derive(Debug, Clone)]
pub struct FileParseFailure {
    pub path: String,
    pub error: DiffError,
}

/// Outcome of parsing raw generator output.
#[derive(Debug, Clone, Default)]
pub struct ParsedPatch {
    pub document: PatchDocument,
    pub failures: Vec<FileParseFailure>,
}

/// Parse raw diff text into a [`PatchDocument`].
///
/// Returns `Err` only when the document is unusable as a whole (no file
/// sections found). Per-file problems land in [`ParsedPatch::failures`].
pub fn parse(raw: &str) -> Result<ParsedPatch, DiffError> {
    let body = strip_code_fences(raw);
    let lines: Vec<&str> = body.lines().collect();

    let mut parsed = ParsedPatch::default();
    let mut i = 0;

    while i < lines.len() {
        if !is_old_header(lines[i]) {
            // Prose or junk between sections is tolerated.
            i += 1;
            continue;
        }

        let section_start = i;
        let section_end = find_section_end(&lines, section_start + 1);
        match parse_section(&lines, section_start, section_end) {
            Ok(group) => parsed.document.groups.push(group),
            Err((path, error)) => parsed.failures.push(FileParseFailure { path, error }),
        }
        i = section_end;
    }

    if parsed.document.groups.is_empty() && parsed.failures.is_empty() {
        return Err(DiffError::EmptyDocument);
    }

    Ok(parsed)
}

/// Generators frequently wrap the diff in a markdown code fence; unwrap it.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return raw;
    };
    // Drop the info string ("diff", "patch", ...) on the opening fence.
    let after_info = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => return raw,
    };
    after_info.strip_suffix("```").map_or(raw, str::trim_end)
}

fn is_old_header(line: &str) -> bool {
    line.starts_with("--- ")
}

fn is_new_header(line: &str) -> bool {
    line.starts_with("+++ ")
}

/// Find the index one past the last line of the section starting at
/// `start` (exclusive end = next `--- ` header or EOF).
fn find_section_end(lines: &[&str], start: usize) -> usize {
    let mut i = start;
    while i < lines.len() {
        if is_old_header(lines[i]) {
            return i;
        }
        i += 1;
    }
    lines.len()
}

/// Strip the `a/` / `b/` prefix convention from a header path.
fn header_path(raw: &str) -> String {
    let path = raw.trim();
    let path = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path);
    path.to_string()
}

type SectionError = (String, DiffError);

/// Parse one file section: header pair followed by one or more hunks.
///
/// On failure returns the path (best-effort) alongside the error so the
/// caller can report a file-scoped failure.
fn parse_section(
    lines: &[&str],
    start: usize,
    end: usize,
) -> Result<FileHunkGroup, SectionError> {
    let old_path = header_path(&lines[start][4..]);

    let new_header_idx = start + 1;
    if new_header_idx >= end || !is_new_header(lines[new_header_idx]) {
        return Err((
            old_path.clone(),
            DiffError::MalformedHeader {
                line: start + 1,
                text: lines[start].to_string(),
            },
        ));
    }
    let new_path = header_path(&lines[new_header_idx][4..]);

    if new_path == "/dev/null" {
        return Err((old_path.clone(), DiffError::DeletionViaPatch { path: old_path }));
    }
    let is_new_file = old_path == "/dev/null";
    let path = new_path;

    let mut hunks = Vec::new();
    let mut i = new_header_idx + 1;

    while i < end {
        let line = lines[i];
        if line.starts_with("@@") {
            let (hunk, consumed) = parse_hunk(lines, i, end).map_err(|e| (path.clone(), e))?;
            hunks.push(hunk);
            i += consumed;
        } else if line.trim().is_empty() {
            i += 1;
        } else if hunks.is_empty() {
            return Err((
                path.clone(),
                DiffError::UnexpectedLine {
                    line: i + 1,
                    text: line.to_string(),
                },
            ));
        } else {
            // Trailing prose after the last hunk; application verifies
            // context anyway, so the section ends here.
            break;
        }
    }

    if hunks.is_empty() {
        return Err((
            path.clone(),
            DiffError::MalformedHeader {
                line: start + 1,
                text: "file section has no hunks".to_string(),
            },
        ));
    }

    // A group is also a new-file creation when every hunk declares an
    // empty old range.
    let all_empty_old = hunks.iter().all(|h| h.old_count == 0);
    let group = FileHunkGroup {
        path: path.clone(),
        hunks,
        is_new_file: is_new_file || all_empty_old,
    };

    if group.is_new_file {
        let has_non_add = group
            .hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .any(|l| !matches!(l, HunkLine::Add(_)));
        if has_non_add {
            return Err((path.clone(), DiffError::MalformedNewFile { path }));
        }
    }

    Ok(group)
}

/// Parse one hunk starting at `lines[start]` (the `@@` header).
///
/// Returns the hunk and the number of lines consumed including the header.
fn parse_hunk(lines: &[&str], start: usize, end: usize) -> Result<(Hunk, usize), DiffError> {
    let header = lines[start];
    let (old_start, _, new_start, _) =
        parse_hunk_header(header).ok_or_else(|| DiffError::MalformedHunkHeader {
            line: start + 1,
            text: header.to_string(),
        })?;

    let mut body = Vec::new();
    let mut i = start + 1;
    while i < end {
        let line = lines[i];
        if line.starts_with("@@") || is_old_header(line) {
            break;
        }
        match line.chars().next() {
            Some(' ') => body.push(HunkLine::Context(line[1..].to_string())),
            Some('+') => body.push(HunkLine::Add(line[1..].to_string())),
            Some('-') => body.push(HunkLine::Remove(line[1..].to_string())),
            // "\ No newline at end of file" markers carry no content.
            Some('\\') => {}
            // A fully blank line is an empty context line with the leading
            // space eaten (generators do this constantly), but only while
            // the body continues; blanks before trailing prose or EOF end
            // the hunk instead.
            None => {
                let mut j = i + 1;
                while j < end && lines[j].is_empty() {
                    j += 1;
                }
                let continues =
                    j < end && matches!(lines[j].chars().next(), Some(' ' | '+' | '-' | '\\'));
                if !continues {
                    break;
                }
                body.push(HunkLine::Context(String::new()));
            }
            // Untagged text ends the hunk body; the caller decides whether
            // it is junk or a malformed section.
            Some(_) => break,
        }
        i += 1;
    }

    // Generators miscount routinely; the tagged body is authoritative, so
    // recompute the counts rather than rejecting the hunk.
    let actual_old = body
        .iter()
        .filter(|l| matches!(l, HunkLine::Context(_) | HunkLine::Remove(_)))
        .count();
    let actual_new = body
        .iter()
        .filter(|l| matches!(l, HunkLine::Context(_) | HunkLine::Add(_)))
        .count();

    let hunk = Hunk {
        old_start,
        old_count: actual_old,
        new_start,
        new_count: actual_new,
        lines: body,
    };

    Ok((hunk, i - start))
}

/// Parse `@@ -old_start[,old_count] +new_start[,new_count] @@ ...`.
///
/// Counts default to 1 when omitted, per the unified-diff convention.
fn parse_hunk_header(header: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = header.strip_prefix("@@")?.trim_start();
    let rest = rest.strip_prefix('-')?;
    let (old_part, rest) = rest.split_once(' ')?;
    let rest = rest.trim_start().strip_prefix('+')?;
    let (new_part, rest) = rest.split_once(' ')?;
    if !rest.trim_start().starts_with("@@") {
        return None;
    }

    let (old_start, old_count) = parse_range(old_part)?;
    let (new_start, new_count) = parse_range(new_part)?;
    Some((old_start, old_count, new_start, new_count))
}

fn parse_range(part: &str) -> Option<(usize, usize)> {
    match part.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((part.parse().ok()?, 1)),
    }
}
