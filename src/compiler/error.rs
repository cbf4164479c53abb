use thiserror::Error;

use crate::compiler::ast::Span;

/// Every condition a parse or scan can fail with.
///
/// `code()` is stable and meant for editors and callers that render
/// diagnostics; the message is for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    // Parsing
    UnexpectedEof,
    UnexpectedToken(String),
    UnterminatedConfig,
    UnterminatedComment,
    EmptyExpression,
    UnknownBlock(String),
    InvalidBlockHeader(String),
    UnexpectedBlockClose(String),
    UnclosedBlock(String),
    UnexpectedTagClose(String),
    UnclosedTag(String),
    DuplicateAttribute(String),
    InvalidConfig(String),

    // Structure
    ToolCallTagInsideContent,
    ToolCallTagWithoutId,
    ToolCallWithoutName,
    ContentTagInsideContent,
    MessageTagInsideMessage,
    MessageTagWithoutRole,
    InvalidMessageRole(String),
    ToolMessageWithoutId,
    InvalidToolCallPlacement,
    InvalidReferencePromptPlacement,
    ReferenceTagHasContent,
    InvalidStaticAttribute(String),
    ReferenceTagWithoutPrompt,
    InvalidReferencePath(String),
    MissingReferenceFunction,
    ReferenceError(String),
    CyclicReference(String),
    UnknownTag(String),

    // Expressions
    VariableAlreadyDeclared(String),
    UnsupportedExpressionType(String),
    UnsupportedOperator(String),
    InvalidAssignment,
    InvalidUpdate,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedEof => "unexpected-eof",
            ErrorKind::UnexpectedToken(_) => "unexpected-token",
            ErrorKind::UnterminatedConfig => "unterminated-config",
            ErrorKind::UnterminatedComment => "unterminated-comment",
            ErrorKind::EmptyExpression => "empty-expression",
            ErrorKind::UnknownBlock(_) => "unknown-block",
            ErrorKind::InvalidBlockHeader(_) => "invalid-block-header",
            ErrorKind::UnexpectedBlockClose(_) => "unexpected-block-close",
            ErrorKind::UnclosedBlock(_) => "unclosed-block",
            ErrorKind::UnexpectedTagClose(_) => "unexpected-tag-close",
            ErrorKind::UnclosedTag(_) => "unclosed-tag",
            ErrorKind::DuplicateAttribute(_) => "duplicate-attribute",
            ErrorKind::InvalidConfig(_) => "invalid-config",
            ErrorKind::ToolCallTagInsideContent => "tool-call-tag-inside-content",
            ErrorKind::ToolCallTagWithoutId => "tool-call-tag-without-id",
            ErrorKind::ToolCallWithoutName => "tool-call-without-name",
            ErrorKind::ContentTagInsideContent => "content-tag-inside-content",
            ErrorKind::MessageTagInsideMessage => "message-tag-inside-message",
            ErrorKind::MessageTagWithoutRole => "message-tag-without-role",
            ErrorKind::InvalidMessageRole(_) => "invalid-message-role",
            ErrorKind::ToolMessageWithoutId => "tool-message-without-id",
            ErrorKind::InvalidToolCallPlacement => "invalid-tool-call-placement",
            ErrorKind::InvalidReferencePromptPlacement => "invalid-reference-prompt-placement",
            ErrorKind::ReferenceTagHasContent => "reference-tag-has-content",
            ErrorKind::InvalidStaticAttribute(_) => "invalid-static-attribute",
            ErrorKind::ReferenceTagWithoutPrompt => "reference-tag-without-prompt",
            ErrorKind::InvalidReferencePath(_) => "invalid-reference-path",
            ErrorKind::MissingReferenceFunction => "missing-reference-function",
            ErrorKind::ReferenceError(_) => "reference-error",
            ErrorKind::CyclicReference(_) => "cyclic-reference",
            ErrorKind::UnknownTag(_) => "unknown-tag",
            ErrorKind::VariableAlreadyDeclared(_) => "variable-already-declared",
            ErrorKind::UnsupportedExpressionType(_) => "unsupported-expression-type",
            ErrorKind::UnsupportedOperator(_) => "unsupported-operator",
            ErrorKind::InvalidAssignment => "invalid-assignment",
            ErrorKind::InvalidUpdate => "invalid-update",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ErrorKind::UnexpectedEof => "Unexpected end of input".to_string(),
            ErrorKind::UnexpectedToken(token) => format!("Unexpected token '{}'", token),
            ErrorKind::UnterminatedConfig => {
                "Config section is missing its closing '---'".to_string()
            }
            ErrorKind::UnterminatedComment => "Comment is never closed".to_string(),
            ErrorKind::EmptyExpression => "Expected an expression inside '{{ }}'".to_string(),
            ErrorKind::UnknownBlock(name) => format!("Unknown block '{{{{#{}}}}}'", name),
            ErrorKind::InvalidBlockHeader(expected) => {
                format!("Invalid block header, expected {}", expected)
            }
            ErrorKind::UnexpectedBlockClose(name) => {
                format!("Unexpected '{}' with no matching block open", name)
            }
            ErrorKind::UnclosedBlock(name) => format!("Block '{}' is never closed", name),
            ErrorKind::UnexpectedTagClose(name) => {
                format!("Unexpected closing tag '</{}>'", name)
            }
            ErrorKind::UnclosedTag(name) => format!("Tag '<{}>' is never closed", name),
            ErrorKind::DuplicateAttribute(name) => {
                format!("Attribute '{}' is declared more than once", name)
            }
            ErrorKind::InvalidConfig(reason) => format!("Invalid config: {}", reason),
            ErrorKind::ToolCallTagInsideContent => {
                "Tool call tags cannot be placed inside content tags".to_string()
            }
            ErrorKind::ToolCallTagWithoutId => "Tool call tags must have an id".to_string(),
            ErrorKind::ToolCallWithoutName => "Tool call tags must have a name".to_string(),
            ErrorKind::ContentTagInsideContent => {
                "Content tags cannot be nested inside other content tags".to_string()
            }
            ErrorKind::MessageTagInsideMessage => {
                "Message tags cannot be placed inside other message or content tags".to_string()
            }
            ErrorKind::MessageTagWithoutRole => "Message tags must have a role".to_string(),
            ErrorKind::InvalidMessageRole(role) => format!("Invalid message role '{}'", role),
            ErrorKind::ToolMessageWithoutId => "Tool messages must have an id".to_string(),
            ErrorKind::InvalidToolCallPlacement => {
                "Tool calls must be the last content of an assistant message".to_string()
            }
            ErrorKind::InvalidReferencePromptPlacement => {
                "Referenced prompts cannot be placed inside message or content tags".to_string()
            }
            ErrorKind::ReferenceTagHasContent => {
                "Reference tags cannot have any content".to_string()
            }
            ErrorKind::InvalidStaticAttribute(name) => {
                format!("The '{}' attribute cannot contain interpolations", name)
            }
            ErrorKind::ReferenceTagWithoutPrompt => {
                "Reference tags must declare the path of the referenced prompt".to_string()
            }
            ErrorKind::InvalidReferencePath(path) => {
                format!("Reference path '{}' points outside the prompt root", path)
            }
            ErrorKind::MissingReferenceFunction => {
                "A reference resolver is required to include other prompts".to_string()
            }
            ErrorKind::ReferenceError(reason) => {
                format!("Failed to resolve referenced prompt: {}", reason)
            }
            ErrorKind::CyclicReference(path) => {
                format!("Prompt '{}' references itself", path)
            }
            ErrorKind::UnknownTag(name) => format!("Unknown tag '<{}>'", name),
            ErrorKind::VariableAlreadyDeclared(name) => {
                format!("Variable '{}' is already declared", name)
            }
            ErrorKind::UnsupportedExpressionType(kind) => {
                format!("Unsupported expression type '{}'", kind)
            }
            ErrorKind::UnsupportedOperator(op) => format!("Unsupported operator '{}'", op),
            ErrorKind::InvalidAssignment => "Invalid assignment target".to_string(),
            ErrorKind::InvalidUpdate => "Invalid update target".to_string(),
        }
    }
}

/// A positioned failure inside one document
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub source_text: String,
    pub start: usize,
    pub end: usize,
    /// Reference path of the included document the error belongs to, or
    /// `None` for the document that was scanned directly
    pub path: Option<String>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, source: &str, span: Span) -> Self {
        CompileError {
            message: kind.message(),
            kind,
            source_text: source.to_string(),
            start: span.start.min(source.len()),
            end: span.end.min(source.len()),
            path: None,
        }
    }

    pub fn in_document(mut self, path: Option<&str>) -> Self {
        if self.path.is_none() {
            self.path = path.map(str::to_string);
        }
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// 1-based line and column of `start`
    pub fn line_col(&self) -> (usize, usize) {
        let prefix = &self.source_text[..floor_char_boundary(&self.source_text, self.start)];
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map_or(0, |idx| idx + 1);
        let column = prefix[line_start..].chars().count() + 1;
        (line, column)
    }

    /// Source line containing `start`, without its newline
    pub fn source_line(&self) -> &str {
        let source = self.source_text.as_str();
        let start = floor_char_boundary(source, self.start);
        let line_start = source[..start].rfind('\n').map_or(0, |idx| idx + 1);
        let line_end = source[start..]
            .find('\n')
            .map_or(source.len(), |idx| start + idx);
        &source[line_start..line_end]
    }
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    index = index.min(source.len());
    while !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}
