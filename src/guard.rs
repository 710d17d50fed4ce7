//! Deletion protection policy.
//!
//! Every agent-issued delete tool call is evaluated here before it is
//! honored. Evaluation is a pure first-match-wins rule chain over the
//! configured [`GuardPolicy`]; a denial is ordinary data, never an error.

use crate::config::GuardPolicy;
use crate::context::extension;
use serde::{Deserialize, Serialize};

/// An agent's request to delete one file. Serialized form matches the
/// `delete_file` tool arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequest {
    #[serde(rename = "file_path")]
    pub path: String,
    pub reason: String,
}

/// The guard's decision for one deletion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionVerdict {
    pub allowed: bool,
    pub requires_confirmation: bool,
    pub reason: String,
}

impl ProtectionVerdict {
    fn denied(reason: &str) -> Self {
        Self {
            allowed: false,
            requires_confirmation: false,
            reason: reason.to_string(),
        }
    }

    fn allowed_with_confirmation(reason: &str) -> Self {
        Self {
            allowed: true,
            requires_confirmation: true,
            reason: reason.to_string(),
        }
    }

    fn allowed(reason: &str) -> Self {
        Self {
            allowed: true,
            requires_confirmation: false,
            reason: reason.to_string(),
        }
    }
}

/// The deletion guard: policy plus evaluation.
#[derive(Debug, Clone, Default)]
pub struct Guard {
    policy: GuardPolicy,
}

impl Guard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Evaluate a deletion request. First matching rule wins:
    ///
    /// 1. Critical basename: denied, no confirmation possible.
    /// 2. Project at or below the minimum file count: denied.
    /// 3. Extension outside the safe set: denied.
    /// 4. Protected directory prefix: allowed, requires confirmation.
    /// 5. Sensitive basename (core runtime file): allowed, requires confirmation.
    /// 6. Otherwise: allowed.
    pub fn evaluate(&self, path: &str, total_project_file_count: usize) -> ProtectionVerdict {
        let base = basename(path);

        if self.policy.critical_files.contains(base) {
            return ProtectionVerdict::denied("Critical system file - cannot be deleted");
        }

        if total_project_file_count <= self.policy.min_file_count {
            return ProtectionVerdict::denied(
                "Project is at its minimum file count - deletion not allowed",
            );
        }

        let safe_extension = extension(path)
            .map(|ext| self.policy.safe_extensions.contains(ext))
            .unwrap_or(false);
        if !safe_extension {
            return ProtectionVerdict::denied("File type is not safe for automated deletion");
        }

        if self
            .policy
            .protected_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return ProtectionVerdict::allowed_with_confirmation(
                "Asset file - deletion requires confirmation",
            );
        }

        if self.policy.sensitive_files.contains(base) {
            return ProtectionVerdict::allowed_with_confirmation(
                "Core runtime file - deletion requires confirmation",
            );
        }

        ProtectionVerdict::allowed("File is safe to delete")
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
