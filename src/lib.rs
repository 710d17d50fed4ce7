//! Crx Patcher: incremental mutation pipeline for generated browser-extension
//! projects.
//!
//! Given an in-memory snapshot of an existing project and a natural-language
//! change request, the pipeline asks a text-generation capability for a
//! unified diff, applies it atomically per file, validates every produced
//! file, and repairs a validation failure with exactly one corrective
//! generation call. Deletions never flow through patches: the agent requests
//! them through an explicit tool, gated by a first-match-wins protection
//! policy.
//!
//! # Architecture
//!
//! The pipeline is a single-flow stage machine ([`pipeline::Pipeline`]); all
//! intelligence about *where* edits land lives in diff parsing and strict
//! context matching ([`diff`]), not in application logic. The generation and
//! lint capabilities are black boxes behind traits ([`capability`]).
//!
//! # Safety
//!
//! - Hunks apply only where context matches; ambiguity resolves to the
//!   occurrence nearest the declared position
//! - Application is atomic per file; a run never mutates its baseline snapshot
//! - Validation failures get one bounded repair, then fail loud
//! - Critical files (the manifest) are never deletable, and deletion can
//!   never drop the project below its minimum file count
//!
//! # Example
//!
//! ```no_run
//! use crx_patcher::{
//!     CancelFlag, ChangeRequest, NoopLinter, Pipeline, RequestType, ScriptedGenerator,
//! };
//! use std::collections::BTreeMap;
//!
//! let files = BTreeMap::from([("popup.js".to_string(), "let n = 0;\n".to_string())]);
//! let request = ChangeRequest::new("count clicks", RequestType::AddToExisting, files);
//!
//! let generator = ScriptedGenerator::new([]); // a real provider in production
//! let mut events = Vec::new();
//! let outcome = Pipeline::default().run(
//!     &request,
//!     &generator,
//!     &NoopLinter,
//!     &mut events,
//!     &CancelFlag::new(),
//! );
//! ```

pub mod capability;
pub mod config;
pub mod context;
pub mod diff;
pub mod guard;
pub mod pipeline;
pub mod regen;
pub mod request;
pub mod tools;
pub mod validate;

// Re-exports
pub use capability::{
    CapabilityError, Completion, CompletionOptions, LintIssue, Linter, NoopLinter,
    ScriptedGenerator, Severity, TextGenerator,
};
pub use config::{GuardPolicy, PipelineConfig};
pub use context::{prepare_context, FileSnapshot};
pub use diff::{DiffError, FileHunkGroup, Hunk, HunkLine, PatchDocument};
pub use guard::{DeletionRequest, Guard, ProtectionVerdict};
pub use pipeline::{
    CancelFlag, MutationResult, MutationStatus, Pipeline, PipelineError, PipelineOutcome,
    ProgressEvent, ProgressSink, Stage,
};
pub use request::{ChangeRequest, RequestType};
pub use validate::{validate, ValidationReport};
