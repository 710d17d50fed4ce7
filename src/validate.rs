//! Per-file validation of newly produced content.
//!
//! Script files go through the external lint capability; structural files
//! (JSON, i.e. the manifest) get parse-only validation where syntactic
//! validity is a pass. Everything else passes trivially. Validation touches
//! no pipeline state, so independent files could be checked in any order.

use crate::capability::{CapabilityError, LintIssue, Linter, Severity};
use crate::config::PipelineConfig;
use crate::context::extension;
use serde::Serialize;

/// Outcome of validating one file.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub path: String,
    pub passed: bool,
    pub issues: Vec<LintIssue>,
}

impl ValidationReport {
    fn passing(path: &str) -> Self {
        Self {
            path: path.to_string(),
            passed: true,
            issues: Vec::new(),
        }
    }
}

/// Validate one file's content.
///
/// `Err` means the lint capability itself failed, which aborts the run; a
/// failing report is ordinary data that triggers the fallback regenerator.
pub fn validate(
    path: &str,
    content: &str,
    linter: &dyn Linter,
    config: &PipelineConfig,
) -> Result<ValidationReport, CapabilityError> {
    match extension(path) {
        Some(ext) if config.script_extensions.contains(ext) => {
            let issues = linter.lint(path, content)?;
            let passed = !issues.iter().any(|i| i.severity == Severity::Error);
            Ok(ValidationReport {
                path: path.to_string(),
                passed,
                issues,
            })
        }
        Some("json") => Ok(validate_json(path, content)),
        _ => Ok(ValidationReport::passing(path)),
    }
}

/// Parse-only validation for structural files.
fn validate_json(path: &str, content: &str) -> ValidationReport {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(_) => ValidationReport::passing(path),
        Err(e) => ValidationReport {
            path: path.to_string(),
            passed: false,
            issues: vec![LintIssue {
                line: e.line(),
                message: format!("invalid JSON: {e}"),
                severity: Severity::Error,
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::NoopLinter;

    struct FailingLinter;

    impl Linter for FailingLinter {
        fn lint(&self, _path: &str, _content: &str) -> Result<Vec<LintIssue>, CapabilityError> {
            Ok(vec![
                LintIssue {
                    line: 2,
                    message: "unexpected token".into(),
                    severity: Severity::Error,
                },
                LintIssue {
                    line: 5,
                    message: "unused variable".into(),
                    severity: Severity::Warning,
                },
            ])
        }
    }

    struct WarningLinter;

    impl Linter for WarningLinter {
        fn lint(&self, _path: &str, _content: &str) -> Result<Vec<LintIssue>, CapabilityError> {
            Ok(vec![LintIssue {
                line: 1,
                message: "prefer const".into(),
                severity: Severity::Warning,
            }])
        }
    }

    #[test]
    fn test_script_file_fails_on_lint_error() {
        let config = PipelineConfig::default();
        let report = validate("content.js", "syntax error(", &FailingLinter, &config).unwrap();
        assert!(!report.passed);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn test_script_file_passes_with_warnings_only() {
        let config = PipelineConfig::default();
        let report = validate("content.js", "var x = 1;", &WarningLinter, &config).unwrap();
        assert!(report.passed);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_json_parse_only_pass() {
        let config = PipelineConfig::default();
        let report = validate(
            "manifest.json",
            r#"{"manifest_version": 3, "name": "x"}"#,
            &NoopLinter,
            &config,
        )
        .unwrap();
        assert!(report.passed);
    }

    #[test]
    fn test_json_parse_only_fail_reports_line() {
        let config = PipelineConfig::default();
        let report =
            validate("manifest.json", "{\n  \"name\": ,\n}", &NoopLinter, &config).unwrap();
        assert!(!report.passed);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].line, 2);
        assert_eq!(report.issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_other_extensions_pass_trivially() {
        let config = PipelineConfig::default();
        let report = validate("popup.html", "<not<valid<html", &FailingLinter, &config).unwrap();
        assert!(report.passed);
        let report = validate("style.css", "body {", &FailingLinter, &config).unwrap();
        assert!(report.passed);
    }
}
