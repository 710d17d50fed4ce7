use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use crx_patcher::capability::NoopLinter;
use crx_patcher::config::{GuardPolicy, PipelineConfig};
use crx_patcher::context::FileSnapshot;
use crx_patcher::diff;
use crx_patcher::guard::Guard;
use crx_patcher::validate::validate;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "crx-patcher")]
#[command(about = "Apply validated diffs to a generated browser-extension project", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a unified-diff patch file to a project directory
    Apply {
        /// Path to the project root
        #[arg(short, long)]
        project: PathBuf,

        /// Path to the patch file
        #[arg(long)]
        patch: PathBuf,

        /// Dry run - show what would change without writing files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Evaluate a deletion request against the protection policy
    Guard {
        /// Path to the project root
        #[arg(short, long)]
        project: PathBuf,

        /// Project-relative path of the file to delete
        path: String,

        /// Why the file should be deleted
        #[arg(long, default_value = "manual request")]
        reason: String,
    },

    /// Parse a patch file and summarize its file sections
    Inspect {
        /// Path to the patch file
        #[arg(long)]
        patch: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            project,
            patch,
            dry_run,
            diff,
        } => cmd_apply(&project, &patch, dry_run, diff),

        Commands::Guard {
            project,
            path,
            reason,
        } => cmd_guard(&project, &path, &reason),

        Commands::Inspect { patch } => cmd_inspect(&patch),
    }
}

/// Load all text files under the project root into a snapshot.
///
/// Files that are not valid UTF-8 (icons and other binaries) are skipped;
/// they are never patch targets anyway.
fn load_project(root: &Path) -> Result<FileSnapshot> {
    let mut files = FileSnapshot::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        match fs::read_to_string(entry.path()) {
            Ok(content) => {
                files.insert(rel, content);
            }
            Err(_) => {
                eprintln!("{}", format!("Skipping non-text file: {rel}").dimmed());
            }
        }
    }
    Ok(files)
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Show unified diff between original and modified content.
fn display_diff(path: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {path} (original)").dimmed());
    println!("{}", format!("+++ {path} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(project: &Path, patch: &Path, dry_run: bool, show_diff: bool) -> Result<()> {
    let config = PipelineConfig::default();
    let snapshot = load_project(project)?;
    let raw = fs::read_to_string(patch)
        .with_context(|| format!("failed to read patch file {}", patch.display()))?;

    println!("Project: {}", project.display());
    println!("Patch: {}", patch.display());
    if dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }
    println!();

    let parsed = diff::parse(&raw)?;
    diff::verify_paths(&parsed.document, &snapshot)?;

    let mut applied = 0;
    let mut failed = 0;

    for failure in &parsed.failures {
        eprintln!("{} {}: {}", "✗".red(), failure.path, failure.error);
        failed += 1;
    }

    for group in &parsed.document.groups {
        if !crx_patcher::context::is_mutable_path(&group.path, &config) {
            eprintln!(
                "{} {}: patch touches a non-mutable path",
                "✗".red(),
                group.path
            );
            failed += 1;
            continue;
        }

        let content = match diff::apply_group(group, &snapshot) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), group.path, e);
                failed += 1;
                continue;
            }
        };

        let report = validate(&group.path, &content, &NoopLinter, &config)?;
        if !report.passed {
            eprintln!("{} {}: failed validation", "✗".red(), group.path);
            for issue in &report.issues {
                eprintln!("    line {}: {}", issue.line, issue.message);
            }
            failed += 1;
            continue;
        }

        if show_diff {
            let original = snapshot.get(&group.path).map(String::as_str).unwrap_or("");
            display_diff(&group.path, original, &content);
        }

        if dry_run {
            println!("{} {}: would apply", "✓".green(), group.path);
        } else {
            atomic_write(&project.join(&group.path), &content)?;
            println!("{} {}: applied", "✓".green(), group.path);
        }
        applied += 1;
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{applied}").green());
    println!("  {} failed", format!("{failed}").red());

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_guard(project: &Path, path: &str, reason: &str) -> Result<()> {
    let guard = Guard::new(GuardPolicy::default());
    let total = load_project(project)?.len();

    let verdict = guard.evaluate(path, total);
    println!("Path: {path}");
    println!("Reason given: {reason}");
    println!("Project file count: {total}");
    println!();

    if verdict.allowed && verdict.requires_confirmation {
        println!(
            "{} allowed, requires confirmation: {}",
            "⊙".yellow(),
            verdict.reason
        );
    } else if verdict.allowed {
        println!("{} allowed: {}", "✓".green(), verdict.reason);
    } else {
        println!("{} denied: {}", "✗".red(), verdict.reason);
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_inspect(patch: &Path) -> Result<()> {
    let raw = fs::read_to_string(patch)
        .with_context(|| format!("failed to read patch file {}", patch.display()))?;
    let parsed = diff::parse(&raw)?;

    println!("{}", "Patch summary".bold());
    for group in &parsed.document.groups {
        let kind = if group.is_new_file { "new file" } else { "edit" };
        println!(
            "{} {} ({}, {} hunks)",
            "✓".green(),
            group.path,
            kind,
            group.hunks.len()
        );
        for hunk in &group.hunks {
            println!(
                "    @@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            );
        }
    }
    for failure in &parsed.failures {
        println!("{} {}: {}", "✗".red(), failure.path, failure.error);
    }
    Ok(())
}
