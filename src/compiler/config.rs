/// Front matter of a prompt
use serde_json::{Map, Value};

use crate::compiler::ast::Config;
use crate::compiler::error::{CompileError, ErrorKind};

pub type PromptConfig = Map<String, Value>;

/// Parse the YAML body of a Config node into a JSON object map.
///
/// Empty front matter is an empty map. Anything other than a mapping is
/// rejected, since providers read their settings by key.
pub fn parse_config(config: &Config, source: &str) -> Result<PromptConfig, CompileError> {
    if config.value.trim().is_empty() {
        return Ok(PromptConfig::new());
    }

    let invalid = |reason: String| CompileError::new(ErrorKind::InvalidConfig(reason), source, config.span);

    let value: Value = serde_yaml::from_str(&config.value).map_err(|e| invalid(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(PromptConfig::new()),
        other => Err(invalid(format!("expected a mapping, found {}", kind_name(&other)))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Span;

    fn config(value: &str) -> Config {
        Config {
            value: value.to_string(),
            span: Span::new(0, value.len()),
        }
    }

    #[test]
    fn test_parse_mapping() {
        let source = "provider: openai\nmodel: gpt-4o\ntemperature: 0.2\n";
        let parsed = parse_config(&config(source), source).unwrap();
        assert_eq!(parsed.get("model"), Some(&Value::String("gpt-4o".to_string())));
        assert_eq!(parsed.get("temperature").and_then(Value::as_f64), Some(0.2));
    }

    #[test]
    fn test_empty_config() {
        let parsed = parse_config(&config("\n"), "\n").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_non_mapping_is_rejected() {
        let source = "- a\n- b\n";
        let error = parse_config(&config(source), source).unwrap_err();
        assert_eq!(error.code(), "invalid-config");
        assert!(error.message.contains("a list"));
    }

    #[test]
    fn test_malformed_yaml() {
        let source = "model: [unclosed\n";
        let error = parse_config(&config(source), source).unwrap_err();
        assert_eq!(error.code(), "invalid-config");
    }
}
