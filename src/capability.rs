//! External capabilities consumed by the pipeline.
//!
//! Text generation and static analysis are black boxes behind traits; this
//! crate never assumes anything about provider, model, or transport. A
//! completion is a tagged value, not a bare string: the response shape is
//! checked before any attempt to parse it as a diff.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque knobs forwarded to the generation provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The provider returned text.
    Text(String),
    /// The provider signalled a failure in-band.
    Error { detail: String },
}

impl Completion {
    /// Unwrap the text, converting an in-band provider error into a
    /// [`CapabilityError`].
    pub fn into_text(self) -> Result<String, CapabilityError> {
        match self {
            Completion::Text(text) => Ok(text),
            Completion::Error { detail } => Err(CapabilityError::Generation { detail }),
        }
    }
}

/// A static-analysis finding for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    /// 1-based line number, 0 when the issue is file-wide.
    pub line: usize,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Failure of an external capability call itself (not of the content it
/// produced). Always aborts the run; no partial commit.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("text generation failed: {detail}")]
    Generation { detail: String },

    #[error("lint capability failed for {path}: {detail}")]
    Lint { path: String, detail: String },
}

/// The text-generation capability.
pub trait TextGenerator {
    fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, CapabilityError>;
}

/// The static-analysis capability for script files.
pub trait Linter {
    fn lint(&self, path: &str, content: &str) -> Result<Vec<LintIssue>, CapabilityError>;
}

/// A generator that replays canned completions in order. Used by tests and
/// offline tooling.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: std::cell::RefCell<std::collections::VecDeque<Completion>>,
}

impl ScriptedGenerator {
    pub fn new(responses: impl IntoIterator<Item = Completion>) -> Self {
        Self {
            responses: std::cell::RefCell::new(responses.into_iter().collect()),
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn complete(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, CapabilityError> {
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or(CapabilityError::Generation {
                detail: "scripted generator exhausted".to_string(),
            })
    }
}

/// A linter that reports nothing. Used when no external analysis is wired
/// up, e.g. the offline CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLinter;

impl Linter for NoopLinter {
    fn lint(&self, _path: &str, _content: &str) -> Result<Vec<LintIssue>, CapabilityError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_into_text() {
        assert_eq!(
            Completion::Text("ok".into()).into_text().unwrap(),
            "ok".to_string()
        );
        let err = Completion::Error {
            detail: "rate limited".into(),
        }
        .into_text()
        .unwrap_err();
        assert!(matches!(err, CapabilityError::Generation { .. }));
    }

    #[test]
    fn test_scripted_generator_replays_in_order() {
        let generator = ScriptedGenerator::new([
            Completion::Text("first".into()),
            Completion::Text("second".into()),
        ]);
        let options = CompletionOptions::default();
        assert_eq!(
            generator.complete("p", &options).unwrap(),
            Completion::Text("first".into())
        );
        assert_eq!(
            generator.complete("p", &options).unwrap(),
            Completion::Text("second".into())
        );
        assert!(generator.complete("p", &options).is_err());
    }

    #[test]
    fn test_lint_issue_serde() {
        let issue = LintIssue {
            line: 3,
            message: "unexpected token".into(),
            severity: Severity::Error,
        };
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains(r#""severity":"error""#));
    }
}
