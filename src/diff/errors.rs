use thiserror::Error;

/// Errors from parsing or applying a patch document.
///
/// Variants are either document-scoped (the whole run aborts) or file-scoped
/// (the affected file is reported and the run continues); see
/// [`DiffError::is_document_scoped`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("patch document contains no file sections")]
    EmptyDocument,

    #[error("patch references a file not present in the snapshot: {path}")]
    UnknownPath { path: String },

    #[error("malformed file header at line {line}: {text}")]
    MalformedHeader { line: usize, text: String },

    #[error("malformed hunk header at line {line}: {text}")]
    MalformedHunkHeader { line: usize, text: String },

    #[error("unrecognized patch line {line}: {text}")]
    UnexpectedLine { line: usize, text: String },

    #[error("whole-file deletion of {path} is not allowed in a patch; use the delete tool")]
    DeletionViaPatch { path: String },

    #[error("new-file hunk for {path} contains non-added lines")]
    MalformedNewFile { path: String },

    #[error("hunk {hunk} does not match {path} near line {near_line}{hint}")]
    ContextMismatch {
        path: String,
        /// Zero-based index of the failing hunk within its file group.
        hunk: usize,
        /// Declared 1-based old-file line the hunk expected to match.
        near_line: usize,
        /// Pre-rendered " (closest line: ...)" diagnostic, or empty.
        hint: String,
    },
}

impl DiffError {
    /// Document-scoped failures abort the whole run; everything else is
    /// recovered per file.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            DiffError::EmptyDocument | DiffError::UnknownPath { .. }
        )
    }
}
