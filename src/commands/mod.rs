pub mod check;
pub mod scan;
pub mod watch;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::compiler::CompileError;
use crate::config::MANIFEST_FILE;
use crate::project::{self, FsResolver, Project};

/// Represents the type of target we're working with
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A prompt project (manifest path)
    Project(PathBuf),
    /// A single prompt file
    SingleFile(PathBuf),
}

/// Detect whether the target is a project directory or a single prompt
pub fn detect_target(target: &str) -> Target {
    let path = Path::new(target);

    if path.file_name().map_or(false, |name| name == MANIFEST_FILE) {
        return Target::Project(path.to_path_buf());
    }

    if path.is_dir() {
        return Target::Project(path.join(MANIFEST_FILE));
    }

    Target::SingleFile(path.to_path_buf())
}

/// Resolver for references made by a single prompt file, plus the file's
/// own reference path when it lives under the resolver's root.
///
/// `root` overrides the prompt root. Otherwise the nearest promptscan.toml
/// decides, falling back to the file's own directory.
pub fn resolver_for(file: &Path, root: Option<&Path>) -> Result<(FsResolver, Option<String>)> {
    let project = match project::find_manifest(file) {
        Some(manifest) => Some(Project::load(&manifest)?),
        None => None,
    };

    let extension = match &project {
        Some(project) => project.config.prompts.extension.clone(),
        None => file
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("promptl")
            .to_string(),
    };

    let resolver = match (root, &project) {
        (Some(root), _) => FsResolver::new(root, &extension),
        (None, Some(project)) => project.resolver(),
        (None, None) => FsResolver::new(
            file.parent().unwrap_or_else(|| Path::new(".")),
            &extension,
        ),
    };

    let reference = match (file.canonicalize(), resolver.root().canonicalize()) {
        (Ok(file), Ok(root)) => project::reference_path(&root, &file).ok(),
        _ => None,
    };

    Ok((resolver, reference))
}

/// File an error should be reported against: the included prompt it came
/// from, or `file` itself
pub fn error_file(file: &Path, error: &CompileError, resolver: &FsResolver) -> PathBuf {
    error
        .path
        .as_deref()
        .and_then(|path| resolver.locate(path).ok())
        .unwrap_or_else(|| file.to_path_buf())
}

/// Render an error the way compilers do:
///
/// ```text
/// prompts/main.promptl:3:9: [unknown-tag] Unknown tag '<div>'
///    |
///  3 | Hello, <div>
///    |         ^^^^^
/// ```
pub fn format_diagnostic(file: &Path, error: &CompileError) -> String {
    let (line, column) = error.line_col();
    let source_line = error.source_line();
    let gutter = line.to_string().len();

    let line_len = source_line.chars().count();
    let span_len = error
        .source_text
        .get(error.start..error.end)
        .map_or(0, |span| span.chars().count());
    let width = span_len.min(line_len.saturating_sub(column - 1)).max(1);

    format!(
        "{}:{}:{}: [{}] {}\n{:gutter$} |\n{} | {}\n{:gutter$} | {}{}",
        file.display(),
        line,
        column,
        error.code(),
        error.message,
        "",
        line,
        source_line,
        "",
        " ".repeat(column - 1),
        "^".repeat(width),
        gutter = gutter
    )
}
