/// Markdown-based scanner tests
///
/// Each file in tests/scan-examples/ describes one prompt:
///
/// - `## Input`: the prompt source
/// - `## References`: optional `### <path>` subsections holding the
///   prompts the input may reference
/// - `## Parameters`: expected parameters, one per line (empty block for none)
/// - `## Referenced Prompts`: expected referenced paths, one per line
/// - `## Error`: expected error code, instead of parameters

use std::collections::HashMap;

#[derive(Debug, Default)]
struct ScanExample {
    name: String,
    input: String,
    references: HashMap<String, String>,
    parameters: Option<Vec<String>>,
    referenced_prompts: Option<Vec<String>>,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Section {
    None,
    Input,
    Reference(String),
    Parameters,
    ReferencedPrompts,
    Error,
}

/// Parse a markdown test file
fn parse_example(content: &str, filename: &str) -> Result<ScanExample, String> {
    let mut example = ScanExample::default();
    let mut section = Section::None;
    let mut in_code_block = false;
    let mut block = String::new();

    for line in content.lines() {
        if line.starts_with("```") {
            if in_code_block {
                let text = std::mem::take(&mut block);
                store_block(&mut example, &section, text);
            }
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            block.push_str(line);
            block.push('\n');
            continue;
        }

        if let Some(title) = line.strip_prefix("# ") {
            example.name = title.trim().to_string();
        } else if let Some(path) = line.strip_prefix("### ") {
            if section == Section::None || section == Section::Input {
                return Err(format!("Reference '{}' outside ## References in {}", path, filename));
            }
            section = Section::Reference(path.trim().to_string());
        } else if let Some(heading) = line.strip_prefix("## ") {
            section = match heading.trim() {
                "Input" => Section::Input,
                "References" => Section::Reference(String::new()),
                "Parameters" => Section::Parameters,
                "Referenced Prompts" => Section::ReferencedPrompts,
                "Error" => Section::Error,
                // Other sections (like Notes) - skip
                _ => Section::None,
            };
        }
    }

    if example.name.is_empty() {
        return Err(format!("No title found in {}", filename));
    }
    if example.input.is_empty() {
        return Err(format!("No input section found in {}", filename));
    }
    if example.parameters.is_none() && example.error.is_none() {
        return Err(format!("{} expects neither parameters nor an error", filename));
    }

    Ok(example)
}

fn store_block(example: &mut ScanExample, section: &Section, text: String) {
    let lines = || {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    };

    match section {
        Section::Input => example.input = text.trim_end_matches('\n').to_string(),
        Section::Reference(path) if !path.is_empty() => {
            example
                .references
                .insert(path.clone(), text.trim_end_matches('\n').to_string());
        }
        Section::Parameters => example.parameters = Some(lines()),
        Section::ReferencedPrompts => example.referenced_prompts = Some(lines()),
        Section::Error => example.error = lines().into_iter().next(),
        _ => {}
    }
}

fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptscan::Scanner;

    // Macro to generate individual tests for each example
    macro_rules! scan_test {
        ($test_name:ident, $file:expr) => {
            #[test]
            fn $test_name() {
                let content = include_str!(concat!("scan-examples/", $file));
                let example = parse_example(content, $file).expect("Failed to parse test file");

                let references = example.references.clone();
                let mut resolver = |path: &str| {
                    references
                        .get(path)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("prompt '{}' not found", path))
                };
                let result = Scanner::new().with_resolver(&mut resolver).scan(&example.input);

                match (&example.error, result) {
                    (Some(code), Err(error)) => {
                        assert_eq!(
                            error.code(),
                            code.as_str(),
                            "{} ({}): wrong error: {}",
                            $file,
                            example.name,
                            error.message
                        );
                    }
                    (Some(code), Ok(metadata)) => {
                        panic!("{} ({}): expected error {}, got {:?}", $file, example.name, code, metadata);
                    }
                    (None, Err(error)) => {
                        let (line, column) = error.line_col();
                        panic!(
                            "{} ({}): unexpected error at {}:{}: [{}] {}",
                            $file,
                            example.name,
                            line,
                            column,
                            error.code(),
                            error.message
                        );
                    }
                    (None, Ok(metadata)) => {
                        let expected = example.parameters.clone().unwrap_or_default();
                        let actual: Vec<String> = metadata.parameters.iter().cloned().collect();
                        assert_eq!(
                            sorted(actual),
                            sorted(expected),
                            "{} ({}): parameters differ",
                            $file,
                            example.name
                        );

                        if let Some(expected) = &example.referenced_prompts {
                            let actual: Vec<String> =
                                metadata.referenced_prompts.iter().cloned().collect();
                            assert_eq!(
                                sorted(actual),
                                sorted(expected.clone()),
                                "{} ({}): referenced prompts differ",
                                $file,
                                example.name
                            );
                        }
                    }
                }
            }
        };
    }

    // Generate a test for each example file
    scan_test!(example_00_plain_text, "00-plain-text.md");
    scan_test!(example_01_interpolation, "01-interpolation.md");
    scan_test!(example_02_each_loop, "02-each-loop.md");
    scan_test!(example_03_each_else, "03-each-else.md");
    scan_test!(example_04_if_else_chain, "04-if-else-chain.md");
    scan_test!(example_05_messages, "05-messages.md");
    scan_test!(example_06_tool_call_in_assistant, "06-tool-call-in-assistant.md");
    scan_test!(example_07_tool_call_at_end, "07-tool-call-at-end.md");
    scan_test!(example_08_tool_call_without_id, "08-tool-call-without-id.md");
    scan_test!(example_09_loop_shadowing, "09-loop-shadowing.md");
    scan_test!(example_10_references, "10-references.md");
    scan_test!(example_11_reference_with_content, "11-reference-with-content.md");
    scan_test!(example_12_unknown_tag, "12-unknown-tag.md");
    scan_test!(example_13_config, "13-config.md");
    scan_test!(example_14_assignments, "14-assignments.md");
    scan_test!(example_15_unsupported_expression, "15-unsupported-expression.md");
    scan_test!(example_16_tool_message, "16-tool-message.md");
    scan_test!(example_17_nested_references, "17-nested-references.md");
}
