//! The mutation pipeline orchestrator.
//!
//! One run processes exactly one change request against its own copy of the
//! file snapshot, driving an explicit stage machine:
//!
//! ```text
//! Init -> ContextPrepared -> PatchRequested -> PatchParsed -> FilesApplied
//!      -> Validating -> Done
//!                     | FallbackRegenerating -> DoneWithFallbacks
//!      (document or capability failure at any point -> Aborted)
//! ```
//!
//! Progress events stream through a [`ProgressSink`] so a caller can show
//! live status. The terminal output is one [`MutationResult`] per touched
//! path; nothing is persisted here — that is the caller's job, and only
//! after a terminal state.

use crate::capability::{CapabilityError, CompletionOptions, Linter, TextGenerator};
use crate::config::PipelineConfig;
use crate::context::{self, FileSnapshot};
use crate::diff::{self, DiffError};
use crate::regen;
use crate::request::ChangeRequest;
use crate::validate::{validate, ValidationReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Pipeline stages, in order of progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    ContextPrepared,
    PatchRequested,
    PatchParsed,
    FilesApplied,
    Validating,
    FallbackRegenerating,
    Done,
    DoneWithFallbacks,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::ContextPrepared => "context_prepared",
            Stage::PatchRequested => "patch_requested",
            Stage::PatchParsed => "patch_parsed",
            Stage::FilesApplied => "files_applied",
            Stage::Validating => "validating",
            Stage::FallbackRegenerating => "fallback_regenerating",
            Stage::Done => "done",
            Stage::DoneWithFallbacks => "done_with_fallbacks",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One progress event streamed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

/// Receives progress events during a run.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// A collecting sink, for tests and batch callers.
impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event)
    }
}

/// Adapts a closure into a sink for streaming callers.
pub struct FnSink<F: FnMut(ProgressEvent)>(pub F);

impl<F: FnMut(ProgressEvent)> ProgressSink for FnSink<F> {
    fn emit(&mut self, event: ProgressEvent) {
        (self.0)(event)
    }
}

/// Cooperative cancellation flag, checked at stage and per-file boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-file outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    /// Patch applied cleanly and validated.
    Applied,
    /// The file's section or a hunk could not be parsed or matched.
    FailedParse,
    /// Content failed validation and the one repair attempt did not fix it.
    FailedValidate,
    /// Content failed validation once and the repair attempt passed.
    Regenerated,
    /// The patch touched a path it is not allowed to touch.
    Rejected,
}

/// One file's result. The map of these is the pipeline's sole output.
#[derive(Debug, Clone, Serialize)]
pub struct MutationResult {
    pub path: String,
    pub status: MutationStatus,
    /// For `Applied`/`Regenerated`: the new content. For `FailedValidate`:
    /// the patched content that failed, retained for inspection. For
    /// `FailedParse`/`Rejected`: the unchanged baseline content.
    pub content: String,
    pub diagnostics: Vec<String>,
}

/// Terminal result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub stage: Stage,
    pub files: BTreeMap<String, MutationResult>,
}

impl PipelineOutcome {
    /// True when every touched file ended in a shippable state.
    pub fn all_clean(&self) -> bool {
        self.files.values().all(|r| {
            matches!(
                r.status,
                MutationStatus::Applied | MutationStatus::Regenerated
            )
        })
    }
}

/// Run-level failures. File-scoped problems are recovered locally and show
/// up as [`MutationStatus`] values instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("request is not eligible for incremental patching; use full generation")]
    NotEligible,

    #[error("patch document rejected: {0}")]
    Document(#[from] DiffError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("run was cancelled")]
    Cancelled,
}

/// The orchestrator. Construct once, run once per change request.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    options: CompletionOptions,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            options: CompletionOptions::default(),
        }
    }

    /// Set the options forwarded opaquely to the generation provider.
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute one end-to-end run.
    pub fn run(
        &self,
        request: &ChangeRequest,
        generator: &dyn TextGenerator,
        linter: &dyn Linter,
        sink: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<PipelineOutcome, PipelineError> {
        if !request.wants_incremental_patch() {
            return Err(PipelineError::NotEligible);
        }

        // The run owns its baseline; the request stays untouched.
        let snapshot: FileSnapshot = request.existing_files.clone();

        emit(sink, Stage::Init, None, "starting mutation pipeline");
        check_cancelled(cancel)?;

        let prepared = context::prepare_context(&snapshot, &self.config);
        emit(
            sink,
            Stage::ContextPrepared,
            None,
            &format!(
                "{} of {} files in editing context",
                prepared.len(),
                snapshot.len()
            ),
        );

        let prompt = build_patch_prompt(&request.user_request, &prepared);
        emit(sink, Stage::PatchRequested, None, "requesting patch");
        let raw = generator
            .complete(&prompt, &self.options)?
            .into_text()?;
        check_cancelled(cancel)?;

        let parsed = match diff::parse(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                emit(sink, Stage::Aborted, None, &e.to_string());
                return Err(PipelineError::Document(e));
            }
        };
        if let Err(e) = diff::verify_paths(&parsed.document, &snapshot) {
            emit(sink, Stage::Aborted, None, &e.to_string());
            return Err(PipelineError::Document(e));
        }
        emit(
            sink,
            Stage::PatchParsed,
            None,
            &format!(
                "{} file sections parsed, {} failed",
                parsed.document.groups.len(),
                parsed.failures.len()
            ),
        );

        let mut files: BTreeMap<String, MutationResult> = BTreeMap::new();
        for failure in &parsed.failures {
            files.insert(
                failure.path.clone(),
                MutationResult {
                    path: failure.path.clone(),
                    status: MutationStatus::FailedParse,
                    content: snapshot.get(&failure.path).cloned().unwrap_or_default(),
                    diagnostics: vec![failure.error.to_string()],
                },
            );
        }

        // Apply hunks, atomic per file. Groups apply against a working copy
        // so a document with several sections for one path composes them in
        // order instead of each starting from the baseline.
        let mut working = snapshot.clone();
        let mut applied: Vec<String> = Vec::new();
        for group in &parsed.document.groups {
            check_cancelled(cancel)?;

            // The path already failed parsing or was rejected; further
            // sections for it would ship a half-applied file.
            if files.contains_key(&group.path) {
                continue;
            }

            if !context::is_mutable_path(&group.path, &self.config) {
                files.insert(
                    group.path.clone(),
                    MutationResult {
                        path: group.path.clone(),
                        status: MutationStatus::Rejected,
                        content: snapshot.get(&group.path).cloned().unwrap_or_default(),
                        diagnostics: vec![
                            "patch touches a non-mutable (binary/icon) path".to_string()
                        ],
                    },
                );
                continue;
            }

            emit(
                sink,
                Stage::FilesApplied,
                Some(group.path.as_str()),
                "applying patch",
            );
            match diff::apply_group(group, &working) {
                Ok(content) => {
                    if !applied.iter().any(|p| p == &group.path) {
                        applied.push(group.path.clone());
                    }
                    working.insert(group.path.clone(), content);
                }
                Err(e) => {
                    applied.retain(|p| p != &group.path);
                    files.insert(
                        group.path.clone(),
                        MutationResult {
                            path: group.path.clone(),
                            status: MutationStatus::FailedParse,
                            content: snapshot.get(&group.path).cloned().unwrap_or_default(),
                            diagnostics: vec![e.to_string()],
                        },
                    );
                }
            }
        }

        // Validate everything that applied; collect the failures.
        let mut needs_repair: Vec<(String, String, ValidationReport)> = Vec::new();
        for path in applied {
            check_cancelled(cancel)?;
            let content = working.get(&path).cloned().unwrap_or_default();
            emit(sink, Stage::Validating, Some(path.as_str()), "validating");

            let report = validate(&path, &content, linter, &self.config)?;
            if report.passed {
                let mut diagnostics = issue_strings(&report);
                let unchanged = snapshot
                    .get(&path)
                    .is_some_and(|old| {
                        context::content_fingerprint(old) == context::content_fingerprint(&content)
                    });
                if unchanged {
                    diagnostics.push("content unchanged by patch".to_string());
                }
                files.insert(
                    path.clone(),
                    MutationResult {
                        path,
                        status: MutationStatus::Applied,
                        content,
                        diagnostics,
                    },
                );
            } else {
                needs_repair.push((path, content, report));
            }
        }

        if needs_repair.is_empty() {
            emit(sink, Stage::Done, None, "all files validated");
            return Ok(PipelineOutcome {
                stage: Stage::Done,
                files,
            });
        }

        // One bounded repair attempt per failed file. A repair that still
        // fails is surfaced; content known to fail is never shipped silently.
        for (path, content, report) in needs_repair {
            check_cancelled(cancel)?;
            emit(
                sink,
                Stage::FallbackRegenerating,
                Some(path.as_str()),
                "regenerating",
            );

            let repaired = regen::regenerate(
                generator,
                &path,
                &request.user_request,
                &content,
                &report.issues,
                &self.options,
            )?;
            let recheck = validate(&path, &repaired, linter, &self.config)?;

            let result = if recheck.passed {
                MutationResult {
                    path: path.clone(),
                    status: MutationStatus::Regenerated,
                    content: repaired,
                    diagnostics: issue_strings(&report),
                }
            } else {
                let mut diagnostics = issue_strings(&report);
                diagnostics.extend(issue_strings(&recheck));
                MutationResult {
                    path: path.clone(),
                    status: MutationStatus::FailedValidate,
                    content,
                    diagnostics,
                }
            };
            files.insert(path, result);
        }

        emit(sink, Stage::DoneWithFallbacks, None, "finished with fallbacks");
        Ok(PipelineOutcome {
            stage: Stage::DoneWithFallbacks,
            files,
        })
    }
}

fn check_cancelled(cancel: &CancelFlag) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

fn emit(sink: &mut dyn ProgressSink, stage: Stage, path: Option<&str>, message: &str) {
    sink.emit(ProgressEvent {
        stage,
        path: path.map(str::to_string),
        message: message.to_string(),
    });
}

fn issue_strings(report: &ValidationReport) -> Vec<String> {
    report
        .issues
        .iter()
        .map(|i| format!("{}:{}: {}", report.path, i.line, i.message))
        .collect()
}

/// Build the initial patch-request prompt from the prepared context.
fn build_patch_prompt(user_request: &str, prepared: &FileSnapshot) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are modifying an existing browser-extension project.\n\n");
    prompt.push_str("Current project files:\n\n");
    for (index, (path, content)) in prepared.iter().enumerate() {
        prompt.push_str(&format!("File {}: {path}\n```\n{content}\n```\n\n", index + 1));
    }
    prompt.push_str(&format!("Change request:\n{user_request}\n\n"));
    prompt.push_str(
        "Respond with a unified diff only: `--- a/path` / `+++ b/path` headers \
         followed by `@@` hunks. Keep the change minimal. New files use \
         `--- /dev/null`. Never delete a whole file through the diff; use the \
         delete_file tool for that.\n",
    );
    prompt
}
