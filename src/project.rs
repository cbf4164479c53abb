use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::compiler::ReferenceResolver;
use crate::config::{self, Config, MANIFEST_FILE};

/// A prompt project: the directory holding promptscan.toml and its config
#[derive(Debug)]
pub struct Project {
    pub dir: PathBuf,
    pub config: Config,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptFile {
    pub path: PathBuf,             // prompts/support/greeting.promptl
    pub reference_path: String,    // support/greeting
}

impl Project {
    /// Load the project whose manifest is at `manifest_path`
    pub fn load(manifest_path: &Path) -> Result<Project> {
        let config = config::load_config(manifest_path)?;
        let dir = manifest_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        Ok(Project { dir, config })
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.dir.join(&self.config.prompts.root)
    }

    pub fn resolver(&self) -> FsResolver {
        FsResolver::new(self.prompts_dir(), &self.config.prompts.extension)
    }

    /// All prompt files under the prompt root, sorted by path
    pub fn discover_prompts(&self) -> Result<Vec<PromptFile>> {
        let prompts_dir = self.prompts_dir();
        if !prompts_dir.exists() {
            anyhow::bail!(
                "Prompt directory '{}' not found. Check [prompts] root in {}",
                prompts_dir.display(),
                MANIFEST_FILE
            );
        }

        let extension = self.config.prompts.extension.as_str();
        let mut files = Vec::new();
        for entry in WalkDir::new(&prompts_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(extension) {
                let reference_path = reference_path(&prompts_dir, path)
                    .context(format!("Failed to name prompt: {}", path.display()))?;
                files.push(PromptFile {
                    path: path.to_path_buf(),
                    reference_path,
                });
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = files.len(), dir = %prompts_dir.display(), "discovered prompts");
        Ok(files)
    }
}

/// Find the nearest promptscan.toml at or above `start`
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let start = if start.is_file() { start.parent()? } else { start };
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILE))
        .find(|candidate| candidate.is_file())
}

/// Path a prompt is referenced by: relative to the prompt root, `/`
/// separated, without extension
pub fn reference_path(prompts_dir: &Path, file: &Path) -> Result<String> {
    let relative = file.strip_prefix(prompts_dir).map_err(|_| {
        anyhow::anyhow!(
            "{} is outside the prompt directory {}",
            file.display(),
            prompts_dir.display()
        )
    })?;

    let parts: Vec<String> = relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(os_str) => Some(os_str.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        anyhow::bail!("Invalid prompt file: {}", file.display());
    }
    Ok(parts.join("/"))
}

/// Reads referenced prompts from a directory on disk
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
    extension: String,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        FsResolver {
            root: root.into(),
            extension: extension.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File a reference path points at. `<prompt path="a/b" />` maps to
    /// `<root>/a/b.<extension>`; paths that already carry an extension are
    /// used as they are.
    pub fn locate(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            anyhow::bail!("reference '{}' points outside the prompt directory", path);
        }

        let mut file = self.root.join(relative);
        if file.extension().is_none() {
            file.set_extension(&self.extension);
        }
        Ok(file)
    }
}

impl ReferenceResolver for FsResolver {
    fn resolve(&mut self, path: &str, _from: Option<&str>) -> Result<String> {
        let file = self.locate(path)?;
        debug!(reference = path, file = %file.display(), "reading referenced prompt");
        fs::read_to_string(&file).with_context(|| format!("failed to read `{}`", file.display()))
    }
}
