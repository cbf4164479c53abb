use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::commands::{error_file, format_diagnostic, resolver_for};
use crate::compiler::{ConversationMetadata, Scanner};

/// Scan one prompt and print its metadata
pub fn execute(file: &str, json: bool, root: Option<&str>, predefined: &[String]) -> Result<()> {
    let start = Instant::now();

    let path = Path::new(file);
    if !path.is_file() {
        anyhow::bail!("File not found: {}", file);
    }
    let source = fs::read_to_string(path).context(format!("Failed to read {}", file))?;

    let (mut resolver, reference) = resolver_for(path, root.map(Path::new))?;
    let mut scanner = Scanner::new().with_parameters(predefined.iter().cloned());
    if let Some(reference) = &reference {
        scanner = scanner.with_path(reference.as_str());
    }

    let metadata = match scanner.with_resolver(&mut resolver).scan(&source) {
        Ok(metadata) => metadata,
        Err(error) => {
            let file = error_file(path, &error, &resolver);
            eprintln!("{} {}", "error:".red().bold(), format_diagnostic(&file, &error));
            anyhow::bail!("could not scan `{}`", path.display());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!(
        "   {} {} in {:.2}s",
        "Scanned".green().bold(),
        file,
        start.elapsed().as_secs_f64()
    );
    print!("{}", render_metadata(&metadata)?);
    Ok(())
}

/// Human readable summary, one labelled row per field
pub fn render_metadata(metadata: &ConversationMetadata) -> Result<String> {
    let list = |items: &indexmap::IndexSet<String>| {
        if items.is_empty() {
            "(none)".dimmed().to_string()
        } else {
            items.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    };

    let config = if metadata.config.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        serde_json::to_string(&metadata.config)?
    };

    Ok(format!(
        "{:>12}  {}\n{:>12}  {}\n{:>12}  {}\n{:>12}  {}\n",
        "hash".cyan(),
        metadata.hash,
        "parameters".cyan(),
        list(&metadata.parameters),
        "references".cyan(),
        list(&metadata.referenced_prompts),
        "config".cyan(),
        config
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::scan;

    #[test]
    fn test_render_metadata() {
        colored::control::set_override(false);
        let metadata = scan("---\nmodel: gpt-4o\n---\n{{ topic }} {{ tone }}").unwrap();
        let rendered = render_metadata(&metadata).unwrap();
        assert!(rendered.contains("  parameters  topic, tone\n"));
        assert!(rendered.contains("  references  (none)\n"));
        assert!(rendered.contains(r#"config  {"model":"gpt-4o"}"#));
        assert!(rendered.contains(&metadata.hash));
    }
}
