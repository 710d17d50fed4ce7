//! Change requests and the eligibility gate.
//!
//! A [`ChangeRequest`] is created once per user turn and is read-only
//! afterward. The eligibility gate decides whether the incremental patch
//! path applies at all; everything else goes through full-file generation,
//! which is a separate code path outside this crate.

use crate::context::FileSnapshot;
use serde::{Deserialize, Serialize};

/// Whether the user is starting a project or modifying an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Generate a project from scratch.
    New,
    /// Modify an already-generated project.
    AddToExisting,
}

/// One user turn: the natural-language request plus the current project files.
#[derive(Debug, Clone)]
pub struct ChangeRequest {
    /// The natural-language change description.
    pub user_request: String,
    pub request_type: RequestType,
    /// Current project files, path -> content. The baseline snapshot.
    pub existing_files: FileSnapshot,
}

impl ChangeRequest {
    pub fn new(
        user_request: impl Into<String>,
        request_type: RequestType,
        existing_files: FileSnapshot,
    ) -> Self {
        Self {
            user_request: user_request.into(),
            request_type,
            existing_files,
        }
    }

    /// Eligibility gate: true iff this request should take the incremental
    /// patch path. `New` requests and empty projects must use full-file
    /// generation instead.
    pub fn wants_incremental_patch(&self) -> bool {
        self.request_type == RequestType::AddToExisting && !self.existing_files.is_empty()
    }
}
