/// Tag names understood by the scanner and how they are classified
use std::fmt;

use crate::compiler::ast::ElementTag;

pub const CUSTOM_MESSAGE_TAG: &str = "message";
pub const CUSTOM_MESSAGE_ROLE_ATTR: &str = "role";
pub const CUSTOM_CONTENT_TAG: &str = "content";
pub const REFERENCE_PROMPT_TAG: &str = "prompt";
pub const REFERENCE_PROMPT_ATTR: &str = "path";
pub const TOOL_CALL_TAGS: &[&str] = &["tool-call", "tool_call"];
pub const CONTENT_TYPE_TAGS: &[&str] = &["text", "image", "file"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn parse(name: &str) -> Option<MessageRole> {
        match name {
            "system" => Some(MessageRole::System),
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "tool" => Some(MessageRole::Tool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCategory {
    ToolCall,
    Content,
    Message,
    Reference,
    Unknown,
}

pub fn classify(tag: &ElementTag) -> TagCategory {
    let name = tag.name.as_str();
    if TOOL_CALL_TAGS.contains(&name) {
        TagCategory::ToolCall
    } else if name == CUSTOM_CONTENT_TAG || CONTENT_TYPE_TAGS.contains(&name) {
        TagCategory::Content
    } else if name == CUSTOM_MESSAGE_TAG || MessageRole::parse(name).is_some() {
        TagCategory::Message
    } else if name == REFERENCE_PROMPT_TAG {
        TagCategory::Reference
    } else {
        TagCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Span;

    fn tag(name: &str) -> ElementTag {
        ElementTag {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&tag("tool-call")), TagCategory::ToolCall);
        assert_eq!(classify(&tag("tool_call")), TagCategory::ToolCall);
        assert_eq!(classify(&tag("image")), TagCategory::Content);
        assert_eq!(classify(&tag("content")), TagCategory::Content);
        assert_eq!(classify(&tag("assistant")), TagCategory::Message);
        assert_eq!(classify(&tag("message")), TagCategory::Message);
        assert_eq!(classify(&tag("prompt")), TagCategory::Reference);
        assert_eq!(classify(&tag("div")), TagCategory::Unknown);
    }
}
