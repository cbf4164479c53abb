use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "promptscan.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    /// Directory holding the prompts, relative to the manifest
    #[serde(default = "default_root")]
    pub root: String,
    /// File extension of prompt files, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extension: default_extension(),
        }
    }
}

fn default_root() -> String {
    "prompts".to_string()
}

fn default_extension() -> String {
    "promptl".to_string()
}

/// Load and parse a promptscan.toml manifest
pub fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!("could not find `{}`", path.display())
        } else {
            anyhow::anyhow!("failed to read `{}`: {}", path.display(), e)
        }
    })?;

    parse_config(&content).map_err(|e| anyhow::anyhow!("failed to parse `{}`: {}", path.display(), e))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate_prompts(&config.prompts)?;
    Ok(config)
}

fn validate_prompts(prompts: &PromptsConfig) -> Result<()> {
    if prompts.root.trim().is_empty() {
        anyhow::bail!("prompts.root cannot be empty");
    }
    if Path::new(&prompts.root).is_absolute() {
        anyhow::bail!(
            "prompts.root '{}' must be relative to the manifest",
            prompts.root
        );
    }

    let extension = &prompts.extension;
    if extension.is_empty() {
        anyhow::bail!("prompts.extension cannot be empty");
    }
    if extension.starts_with('.') {
        anyhow::bail!(
            "prompts.extension '{}' must not start with a dot (use '{}')",
            extension,
            extension.trim_start_matches('.')
        );
    }
    if let Some(ch) = extension
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_' && *ch != '-')
    {
        anyhow::bail!(
            "prompts.extension '{}' contains invalid character '{}'",
            extension,
            ch
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = parse_config("[project]\nname = \"support-bot\"\n").unwrap();
        assert_eq!(config.project.name, "support-bot");
        assert_eq!(config.prompts.root, "prompts");
        assert_eq!(config.prompts.extension, "promptl");
    }

    #[test]
    fn test_custom_prompts_section() {
        let config = parse_config(
            "[project]\nname = \"bot\"\n\n[prompts]\nroot = \"templates\"\nextension = \"prompt\"\n",
        )
        .unwrap();
        assert_eq!(config.prompts.root, "templates");
        assert_eq!(config.prompts.extension, "prompt");
    }

    #[test]
    fn test_extension_with_dot_is_rejected() {
        let error = parse_config("[project]\nname = \"bot\"\n[prompts]\nextension = \".promptl\"\n")
            .unwrap_err();
        assert!(error.to_string().contains("must not start with a dot"));
    }

    #[test]
    fn test_missing_project_section() {
        assert!(parse_config("[prompts]\nroot = \"p\"\n").is_err());
    }

    #[test]
    fn test_missing_manifest() {
        let error = load_config(Path::new("does/not/exist/promptscan.toml")).unwrap_err();
        assert!(error.to_string().contains("could not find"));
    }
}
