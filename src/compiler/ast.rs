/// Abstract Syntax Tree for prompt templates
use crate::compiler::expression::Expression;

/// Byte range into the document source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

/// Root of a parsed document
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub children: Vec<TemplateNode>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Config(Config),
    Text(Text),
    Comment(Comment),
    Mustache(MustacheTag),
    Element(ElementTag),
    If(IfBlock),
    Each(EachBlock),
}

impl TemplateNode {
    pub fn span(&self) -> Span {
        match self {
            TemplateNode::Config(node) => node.span,
            TemplateNode::Text(node) => node.span,
            TemplateNode::Comment(node) => node.span,
            TemplateNode::Mustache(node) => node.span,
            TemplateNode::Element(node) => node.span,
            TemplateNode::If(node) => node.span,
            TemplateNode::Each(node) => node.span,
        }
    }
}

/// Front matter, kept as raw YAML
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub data: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub data: String,
    pub span: Span,
}

/// `{{ expression }}`
#[derive(Debug, Clone, PartialEq)]
pub struct MustacheTag {
    pub expression: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementTag {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<TemplateNode>,
    pub span: Span,
}

impl ElementTag {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Attribute written without `=`
    Bare,
    Parts(Vec<AttributeValuePart>),
}

impl AttributeValue {
    /// The literal text of a value without interpolations
    pub fn as_static(&self) -> Option<String> {
        match self {
            AttributeValue::Bare => None,
            AttributeValue::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    AttributeValuePart::Text(text) => Some(text.data.as_str()),
                    AttributeValuePart::Mustache(_) => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(|chunks| chunks.concat()),
        }
    }

    pub fn first_mustache(&self) -> Option<&MustacheTag> {
        match self {
            AttributeValue::Bare => None,
            AttributeValue::Parts(parts) => parts.iter().find_map(|part| match part {
                AttributeValuePart::Mustache(tag) => Some(tag),
                AttributeValuePart::Text(_) => None,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValuePart {
    Text(Text),
    Mustache(MustacheTag),
}

/// Children of an `{{:else}}` branch
#[derive(Debug, Clone, PartialEq)]
pub struct ElseBlock {
    pub children: Vec<TemplateNode>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    pub condition: Expression,
    pub children: Vec<TemplateNode>,
    pub else_branch: Option<ElseBlock>,
    pub span: Span,
}

/// Loop binding name with its position
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EachBlock {
    pub iterable: Expression,
    pub context: Binding,
    pub index: Option<Binding>,
    pub children: Vec<TemplateNode>,
    pub else_branch: Option<ElseBlock>,
    pub span: Span,
}
