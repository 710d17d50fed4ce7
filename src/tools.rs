//! Agent-facing deletion tools.
//!
//! The LLM agent never deletes files directly; it calls `delete_file` or
//! `delete_multiple_files` through an external tool-dispatch layer, and this
//! module turns those calls into guard verdicts. Actually removing files is
//! the caller's job, and only for verdicts with `allowed = true`.

use crate::guard::{DeletionRequest, Guard, ProtectionVerdict};
use serde::{Deserialize, Serialize};

/// Arguments of the `delete_multiple_files` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMultipleFilesArgs {
    pub files: Vec<DeletionRequest>,
}

/// Evaluate one `delete_file` call.
pub fn delete_file(
    guard: &Guard,
    request: &DeletionRequest,
    total_project_file_count: usize,
) -> ProtectionVerdict {
    guard.evaluate(&request.path, total_project_file_count)
}

/// Evaluate one `delete_multiple_files` call, one verdict per entry.
///
/// The file count shrinks as allowed deletions accumulate, so a batch cannot
/// talk its way under the minimum-file floor.
pub fn delete_multiple_files(
    guard: &Guard,
    args: &DeleteMultipleFilesArgs,
    total_project_file_count: usize,
) -> Vec<ProtectionVerdict> {
    let mut remaining = total_project_file_count;
    args.files
        .iter()
        .map(|request| {
            let verdict = guard.evaluate(&request.path, remaining);
            if verdict.allowed {
                remaining = remaining.saturating_sub(1);
            }
            verdict
        })
        .collect()
}

/// JSON tool definitions for registration with the dispatch layer.
pub fn definitions() -> serde_json::Value {
    serde_json::json!([
        {
            "name": "delete_file",
            "description": "Request deletion of one project file. The request is checked against the protection policy; critical files are never deletable.",
            "parameters": {
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Project-relative path of the file to delete"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Why the file should be deleted"
                    }
                },
                "required": ["file_path", "reason"]
            }
        },
        {
            "name": "delete_multiple_files",
            "description": "Request deletion of several project files at once. Each entry is checked independently against the protection policy.",
            "parameters": {
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "file_path": { "type": "string" },
                                "reason": { "type": "string" }
                            },
                            "required": ["file_path", "reason"]
                        }
                    }
                },
                "required": ["files"]
            }
        }
    ])
}
