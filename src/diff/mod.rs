//! Patch parsing and application.
//!
//! Raw generator output is parsed into a [`PatchDocument`] and applied
//! against an in-memory snapshot. Application is atomic per file: all hunks
//! of a group commit together or not at all.

pub mod apply;
pub mod errors;
pub mod parser;

pub use apply::{apply_group, verify_paths};
pub use errors::DiffError;
pub use parser::{parse, FileParseFailure, ParsedPatch};

/// One tagged line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    /// Present in both old and new content.
    Context(String),
    /// Present only in new content.
    Add(String),
    /// Present only in old content.
    Remove(String),
}

/// A contiguous old/new line-range region within a file section.
///
/// Line numbers are 1-based per the unified-diff convention. `old_count == 0`
/// marks a pure insertion after line `old_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines expected in the old content (context + removed), in order.
    pub fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(text) | HunkLine::Remove(text) => Some(text.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }

    /// Lines produced in the new content (context + added), in order.
    pub fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(text) | HunkLine::Add(text) => Some(text.as_str()),
                HunkLine::Remove(_) => None,
            })
            .collect()
    }
}

/// All hunks targeting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHunkGroup {
    pub path: String,
    pub hunks: Vec<Hunk>,
    /// True when the group may create the file (`--- /dev/null` header or
    /// every hunk declaring an empty old range). Only authoritative when the
    /// path is absent from the snapshot; against an existing file the hunks
    /// apply as ordinary insertions.
    pub is_new_file: bool,
}

/// An ordered set of file edits parsed from one generator response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchDocument {
    pub groups: Vec<FileHunkGroup>,
}

impl PatchDocument {
    /// Paths this document touches, in document order.
    pub fn touched_paths(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.path.as_str()).collect()
    }
}
