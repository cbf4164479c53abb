use std::cell::RefCell;
use std::collections::HashMap;

use promptscan::compiler::ErrorKind;
use promptscan::{scan, CompileError, ConversationMetadata, Scanner};

/// In-memory prompt store that counts lookups
struct MemoryPrompts {
    prompts: HashMap<String, String>,
    lookups: RefCell<Vec<String>>,
}

impl MemoryPrompts {
    fn new(entries: &[(&str, &str)]) -> Self {
        MemoryPrompts {
            prompts: entries
                .iter()
                .map(|(path, text)| (path.to_string(), text.to_string()))
                .collect(),
            lookups: RefCell::new(Vec::new()),
        }
    }

    fn scan(&self, source: &str) -> Result<ConversationMetadata, CompileError> {
        let mut resolver = |path: &str| {
            self.lookups.borrow_mut().push(path.to_string());
            self.prompts
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("prompt '{}' not found", path))
        };
        Scanner::new().with_resolver(&mut resolver).scan(source)
    }

    fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }
}

fn parameter_names(metadata: &ConversationMetadata) -> Vec<String> {
    let mut names: Vec<String> = metadata.parameters.iter().cloned().collect();
    names.sort();
    names
}

#[test]
fn test_free_variables_without_loops() {
    let source = "{{ greeting }}, {{ user.name }}! {{#if premium}}{{ offer }}{{/if}}";
    let metadata = scan(source).unwrap();
    assert_eq!(parameter_names(&metadata), vec!["greeting", "offer", "premium", "user"]);
    assert!(metadata.referenced_prompts.is_empty());
}

#[test]
fn test_scan_is_idempotent() {
    let source = "<system>{{ a }}</system>{{#each xs as x}}{{ x }} {{ b }}{{/each}}";
    let first = scan(source).unwrap();
    let second = scan(source).unwrap();
    assert_eq!(first.hash, second.hash);
    assert_eq!(parameter_names(&first), parameter_names(&second));
}

#[test]
fn test_hash_depends_on_text() {
    let first = scan("Hello {{ name }}").unwrap();
    let second = scan("Hello {{ name }}!").unwrap();
    assert_ne!(first.hash, second.hash);
    assert_eq!(first.parameters, second.parameters);
}

#[test]
fn test_loop_bindings_in_body_and_else() {
    let source = "{{#each items as item, i}}{{ item }}{{ i }}{{:else}}{{ item }}{{ i }}{{/each}}";
    let metadata = scan(source).unwrap();
    assert_eq!(parameter_names(&metadata), vec!["i", "item", "items"]);

    let body_only = scan("{{#each items as item, i}}{{ item }}{{ i }}{{/each}}").unwrap();
    assert_eq!(parameter_names(&body_only), vec!["items"]);
}

#[test]
fn test_loop_rebinding_names_the_variable() {
    let error = scan("{{#each a as x}}{{#each b as y, x}}{{/each}}{{/each}}").unwrap_err();
    assert_eq!(error.kind, ErrorKind::VariableAlreadyDeclared("x".to_string()));
    assert!(error.message.contains("'x'"));
}

#[test]
fn test_tool_call_followed_by_user_message() {
    let source = r#"<tool_call id="1" name="search" />
<user>and then?</user>"#;
    let error = scan(source).unwrap_err();
    assert_eq!(error.code(), "invalid-tool-call-placement");
}

#[test]
fn test_tool_call_at_end_of_document() {
    let error = scan(r#"<tool_call id="1" name="search" />"#).unwrap_err();
    assert_eq!(error.code(), "invalid-tool-call-placement");

    let error = scan(r#"<tool_call name="search" />"#).unwrap_err();
    assert_eq!(error.code(), "tool-call-tag-without-id");
}

#[test]
fn test_tool_call_closed_by_assistant() {
    let source = r#"<assistant>
  Searching.
  <tool_call id="1" name="search">{{ query }}</tool_call>
</assistant>"#;
    let metadata = scan(source).unwrap();
    assert_eq!(parameter_names(&metadata), vec!["query"]);
}

#[test]
fn test_repeated_reference_is_resolved_once() {
    let prompts = MemoryPrompts::new(&[
        ("b", "B says {{ b_param }}\n<prompt path=\"c\" />"),
        ("c", "C says {{ c_param }}"),
    ]);
    let metadata = prompts
        .scan("<prompt path=\"b\" />\n{{ a_param }}\n<prompt path=\"b\" />")
        .unwrap();

    assert_eq!(prompts.lookups(), vec!["b", "c"]);
    assert_eq!(metadata.referenced_prompts.len(), 2);
    assert_eq!(parameter_names(&metadata), vec!["a_param", "b_param", "c_param"]);
}

#[test]
fn test_root_hash_tracks_transitive_changes() {
    let root = "<prompt path=\"b\" />";
    let scan_with = |c_text: &str| {
        MemoryPrompts::new(&[("b", "<prompt path=\"c\" />"), ("c", c_text)])
            .scan(root)
            .unwrap()
            .hash
    };

    assert_eq!(scan_with("version one"), scan_with("version one"));
    assert_ne!(scan_with("version one"), scan_with("version two"));
}

#[test]
fn test_missing_reference_function() {
    let error = scan("<prompt path=\"other\" />").unwrap_err();
    assert_eq!(error.code(), "missing-reference-function");
}

#[test]
fn test_unresolvable_reference() {
    let prompts = MemoryPrompts::new(&[]);
    let error = prompts.scan("<prompt path=\"ghost\" />").unwrap_err();
    assert_eq!(error.code(), "reference-error");
    assert_eq!((error.start, error.end), (0, 23));
}

#[test]
fn test_resolver_compile_errors_pass_through() {
    let original = scan("{{ }}").unwrap_err();
    let mut resolver = move |_: &str| -> anyhow::Result<String> { Err(original.clone().into()) };
    let error = Scanner::new()
        .with_resolver(&mut resolver)
        .scan("<prompt path=\"x\" />")
        .unwrap_err();
    assert_eq!(error.code(), "empty-expression");
    assert_eq!(error.source_text, "{{ }}");
}

#[test]
fn test_error_offsets_point_into_source() {
    let source = "line one\n<user>{{ a + }}</user>";
    let error = scan(source).unwrap_err();
    assert_eq!(error.source_text, source);
    let (line, _) = error.line_col();
    assert_eq!(line, 2);
    assert!(error.start >= source.find("{{").unwrap());
}

#[test]
fn test_cycles_are_reported() {
    let prompts = MemoryPrompts::new(&[
        ("a", "<prompt path=\"b\" />"),
        ("b", "<prompt path=\"c\" />"),
        ("c", "<prompt path=\"a\" />"),
    ]);
    let error = prompts.scan("<prompt path=\"a\" />").unwrap_err();
    assert_eq!(error.kind, ErrorKind::CyclicReference("a".to_string()));
    assert_eq!(error.path.as_deref(), Some("c"));
    assert_eq!(prompts.lookups(), vec!["a", "b", "c"]);
}

#[test]
fn test_runtime_parameters_are_not_reported() {
    let source = "{{ user.name }} asked {{ question }}";
    let metadata = Scanner::new()
        .with_parameters(["user"])
        .scan(source)
        .unwrap();
    assert_eq!(parameter_names(&metadata), vec!["question"]);

    let error = Scanner::new()
        .with_parameters(["user"])
        .scan("{{#each users as user}}{{ user }}{{/each}}")
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::VariableAlreadyDeclared("user".to_string()));
}

#[test]
fn test_sibling_and_parent_references() {
    let prompts = MemoryPrompts::new(&[
        ("support/a", "<prompt path=\"b\" />\n<prompt path=\"../common/tone\" />"),
        ("support/b", "{{ ticket }}"),
        ("common/tone", "{{ tone }}"),
        ("b", "{{ unrelated }}"),
    ]);
    let metadata = prompts.scan("<prompt path=\"support/a\" />").unwrap();

    assert_eq!(prompts.lookups(), vec!["support/a", "support/b", "common/tone"]);
    assert_eq!(parameter_names(&metadata), vec!["ticket", "tone"]);
    let mut referenced: Vec<String> = metadata.referenced_prompts.iter().cloned().collect();
    referenced.sort();
    assert_eq!(referenced, vec!["common/tone", "support/a", "support/b"]);
}

#[test]
fn test_reference_escaping_root() {
    let prompts = MemoryPrompts::new(&[("a", "<prompt path=\"../../outside\" />")]);
    let error = prompts.scan("<prompt path=\"a\" />").unwrap_err();
    assert_eq!(error.code(), "invalid-reference-path");
    assert_eq!(error.path.as_deref(), Some("a"));
    assert_eq!(prompts.lookups(), vec!["a"]);
}

#[test]
fn test_tool_call_must_sit_inside_the_assistant_message() {
    let outside = r#"<tool_call id="1" name="search" />
<assistant>Looking.</assistant>"#;
    assert_eq!(scan(outside).unwrap_err().code(), "invalid-tool-call-placement");

    let inside = r#"<assistant>Looking.<tool_call id="1" name="search" /></assistant>"#;
    assert!(scan(inside).is_ok());
}
