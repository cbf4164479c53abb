use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

use crate::commands::{detect_target, error_file, format_diagnostic, resolver_for, Target};
use crate::compiler::{CompileError, Scanner};
use crate::project::Project;

/// Outcome of checking a set of prompts
#[derive(Debug, Default)]
pub struct CheckReport {
    pub checked: usize,
    pub failures: Vec<CheckFailure>,
}

#[derive(Debug)]
pub struct CheckFailure {
    /// File the error points into, which may be a referenced prompt
    pub file: PathBuf,
    /// Prompt whose scan failed
    pub prompt: PathBuf,
    pub error: CompileError,
}

/// Scan every prompt of a project (or a single prompt) and report errors
pub fn execute(target: &str) -> Result<()> {
    let start = Instant::now();

    let report = match detect_target(target) {
        Target::Project(manifest_path) => {
            let project = Project::load(&manifest_path)?;
            let report = check_project(&project)?;
            if report.checked == 0 && report.failures.is_empty() {
                println!(
                    "{} No prompts found in {}/",
                    "warning:".yellow().bold(),
                    project.config.prompts.root
                );
                return Ok(());
            }
            report
        }
        Target::SingleFile(file_path) => check_file(&file_path)?,
    };

    print_report(&report, start.elapsed().as_secs_f64())
}

/// Check all prompts under the project's prompt root
pub fn check_project(project: &Project) -> Result<CheckReport> {
    let prompts = project.discover_prompts()?;
    let mut report = CheckReport::default();

    for prompt in &prompts {
        let source = fs::read_to_string(&prompt.path)
            .context(format!("Failed to read {}", prompt.path.display()))?;

        let mut resolver = project.resolver();
        let result = Scanner::new()
            .with_resolver(&mut resolver)
            .with_path(prompt.reference_path.as_str())
            .scan(&source);

        match result {
            Ok(metadata) => {
                debug!(prompt = %prompt.reference_path, hash = %metadata.hash, "checked");
                report.checked += 1;
            }
            Err(error) => report.failures.push(CheckFailure {
                file: error_file(&prompt.path, &error, &resolver),
                prompt: prompt.path.clone(),
                error,
            }),
        }
    }

    Ok(report)
}

/// Check a single prompt file, resolving references next to it
pub fn check_file(file_path: &Path) -> Result<CheckReport> {
    if !file_path.is_file() {
        anyhow::bail!("File not found: {}", file_path.display());
    }

    let source = fs::read_to_string(file_path)
        .context(format!("Failed to read {}", file_path.display()))?;
    let (mut resolver, reference) = resolver_for(file_path, None)?;

    let mut scanner = Scanner::new();
    if let Some(reference) = reference {
        scanner = scanner.with_path(reference);
    }

    let mut report = CheckReport::default();
    match scanner.with_resolver(&mut resolver).scan(&source) {
        Ok(_) => report.checked += 1,
        Err(error) => report.failures.push(CheckFailure {
            file: error_file(file_path, &error, &resolver),
            prompt: file_path.to_path_buf(),
            error,
        }),
    }
    Ok(report)
}

fn print_report(report: &CheckReport, elapsed: f64) -> Result<()> {
    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!(
                "{} {}",
                "error:".red().bold(),
                format_diagnostic(&failure.file, &failure.error)
            );
            if failure.file != failure.prompt {
                eprintln!(
                    "  {} included from {}",
                    "note:".cyan().bold(),
                    failure.prompt.display()
                );
            }
            eprintln!();
        }
        anyhow::bail!("Check failed with {} error(s)", report.failures.len());
    }

    println!(
        "   {} {} prompt(s) in {:.2}s",
        "Checked".green().bold(),
        report.checked,
        elapsed
    );
    Ok(())
}
