//! Fallback regeneration for files that failed validation.
//!
//! One dedicated generation call scoped to exactly one file, carrying the
//! validator's diagnostics as corrective context. At most one attempt per
//! file per run; a repair that still fails validation is surfaced, never
//! shipped.

use crate::capability::{CapabilityError, CompletionOptions, LintIssue, TextGenerator};

/// Ask the generator for a corrected full-file version of `path`.
///
/// The returned text has surrounding markdown code fences stripped; no other
/// post-processing happens. The caller re-validates the result.
pub fn regenerate(
    generator: &dyn TextGenerator,
    path: &str,
    user_request: &str,
    content: &str,
    issues: &[LintIssue],
    options: &CompletionOptions,
) -> Result<String, CapabilityError> {
    let prompt = build_repair_prompt(path, user_request, content, issues);
    let text = generator.complete(&prompt, options)?.into_text()?;
    Ok(strip_fences(&text).to_string())
}

/// Build the corrective prompt. The contract asked of the model is a minimal
/// fix returned as complete file content; its output is re-validated, not
/// trusted.
fn build_repair_prompt(path: &str, user_request: &str, content: &str, issues: &[LintIssue]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "The file `{path}` was edited for this request:\n{user_request}\n\n"
    ));
    prompt.push_str("The edited file failed validation with these issues:\n");
    for issue in issues {
        prompt.push_str(&format!(
            "- line {}: {} ({:?})\n",
            issue.line, issue.message, issue.severity
        ));
    }
    prompt.push_str(&format!(
        "\nCurrent content of `{path}`:\n```\n{content}\n```\n\n\
         Return the complete corrected content of `{path}` and nothing else. \
         Fix only the reported issues; do not restructure the file.\n"
    ));
    prompt
}

/// Strip one surrounding markdown code fence, if present.
pub(crate) fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(newline) = rest.find('\n') else {
        return trimmed;
    };
    match rest[newline + 1..].strip_suffix("```") {
        Some(body) => body.trim_end(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Completion, ScriptedGenerator, Severity};

    fn issues() -> Vec<LintIssue> {
        vec![LintIssue {
            line: 3,
            message: "unexpected token )".into(),
            severity: Severity::Error,
        }]
    }

    #[test]
    fn test_regenerate_returns_unfenced_content() {
        let generator = ScriptedGenerator::new([Completion::Text(
            "```js\nconsole.log('fixed');\n```".into(),
        )]);
        let result = regenerate(
            &generator,
            "content.js",
            "log a message",
            "console.log('broken'))",
            &issues(),
            &CompletionOptions::default(),
        )
        .unwrap();
        assert_eq!(result, "console.log('fixed');");
    }

    #[test]
    fn test_regenerate_propagates_provider_error() {
        let generator = ScriptedGenerator::new([Completion::Error {
            detail: "overloaded".into(),
        }]);
        let result = regenerate(
            &generator,
            "content.js",
            "log a message",
            "x",
            &issues(),
            &CompletionOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_repair_prompt_carries_diagnostics() {
        let prompt = build_repair_prompt("content.js", "add a counter", "let x = ;", &issues());
        assert!(prompt.contains("content.js"));
        assert!(prompt.contains("add a counter"));
        assert!(prompt.contains("line 3: unexpected token )"));
        assert!(prompt.contains("let x = ;"));
    }

    #[test]
    fn test_strip_fences_variants() {
        assert_eq!(strip_fences("plain"), "plain");
        assert_eq!(strip_fences("```\nbody\n```"), "body");
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        // Unterminated fence is left alone rather than mangled
        assert_eq!(strip_fences("```\nbody"), "```\nbody");
    }
}
