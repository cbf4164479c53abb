/// Metadata scanner: structural validation, parameter discovery, reference
/// resolution and content hashing for one prompt and everything it includes.
use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::compiler::ast::*;
use crate::compiler::config::{parse_config, PromptConfig};
use crate::compiler::error::{CompileError, ErrorKind};
use crate::compiler::logic::scan_expression;
use crate::compiler::parser::parse;
use crate::compiler::reference::{join_reference_path, ReferenceResolver};
use crate::compiler::scope::ScopeContext;
use crate::compiler::tags::{
    classify, MessageRole, TagCategory, CUSTOM_MESSAGE_ROLE_ATTR, CUSTOM_MESSAGE_TAG,
    REFERENCE_PROMPT_ATTR,
};

/// Result of a successful scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetadata {
    pub hash: String,
    pub parameters: IndexSet<String>,
    pub referenced_prompts: IndexSet<String>,
    pub config: PromptConfig,
}

/// Scan `source` without a reference resolver
pub fn scan(source: &str) -> Result<ConversationMetadata, CompileError> {
    Scanner::new().scan(source)
}

/// Entry point for scans that need references or a known root path
#[derive(Default)]
pub struct Scanner<'r> {
    resolver: Option<&'r mut dyn ReferenceResolver>,
    path: Option<String>,
    parameters: Vec<String>,
}

impl<'r> Scanner<'r> {
    pub fn new() -> Self {
        Scanner {
            resolver: None,
            path: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: &'r mut dyn ReferenceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Path of the document being scanned, relative to the prompt root.
    /// Relative references start from its directory, and a reference back
    /// to it is reported as a cycle.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Names the caller supplies at run time. They are defined for the
    /// scanned document, so they never show up as parameters and loops
    /// cannot rebind them.
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(parameters.into_iter().map(Into::into));
        self
    }

    pub fn scan(self, source: &str) -> Result<ConversationMetadata, CompileError> {
        let Scanner {
            resolver,
            path,
            parameters,
        } = self;
        trace!(path = ?path, predefined = parameters.len(), "scanning prompt");

        let root_path = path.and_then(|path| join_reference_path(None, &path));
        let mut session = ScanSession {
            resolver,
            referenced: IndexMap::new(),
            pending_tool_calls: Vec::new(),
            in_flight: root_path.iter().cloned().collect(),
        };

        let mut root = DocumentScanner::new(&mut session, source, None);
        root.base = root_path.as_deref();
        let document = root.run(&parameters)?;

        // Tool calls can only be closed by an assistant message
        if let Some(error) = session.pending_tool_calls.into_iter().next() {
            return Err(error);
        }

        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        for reference in session.referenced.values() {
            hasher.update(reference.hash.as_bytes());
        }
        let hash = format!("{:x}", hasher.finalize());

        trace!(
            hash = %hash,
            parameters = document.parameters.len(),
            references = session.referenced.len(),
            "scan finished"
        );

        Ok(ConversationMetadata {
            hash,
            parameters: document.parameters,
            referenced_prompts: session.referenced.into_keys().collect(),
            config: document.config,
        })
    }
}

/// State shared by the root document and every document it pulls in
struct ScanSession<'r> {
    resolver: Option<&'r mut dyn ReferenceResolver>,
    /// Resolved references in resolution order
    referenced: IndexMap<String, ResolvedReference>,
    /// Misplacement errors for tool calls not yet closed by a message
    pending_tool_calls: Vec<CompileError>,
    /// Paths currently being scanned, outermost first
    in_flight: Vec<String>,
}

struct ResolvedReference {
    hash: String,
    parameters: IndexSet<String>,
}

struct DocumentResult {
    parameters: IndexSet<String>,
    config: PromptConfig,
    /// Paths this document references itself, in order
    references: IndexSet<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeContext {
    inside_message: bool,
    inside_content: bool,
}

/// Traversal of one document's tree
struct DocumentScanner<'a, 'r> {
    session: &'a mut ScanSession<'r>,
    source: &'a str,
    /// Reference path, `None` for the root document
    path: Option<&'a str>,
    /// Path relative references start from
    base: Option<&'a str>,
    references: IndexSet<String>,
}

impl<'a, 'r> DocumentScanner<'a, 'r> {
    fn new(session: &'a mut ScanSession<'r>, source: &'a str, path: Option<&'a str>) -> Self {
        DocumentScanner {
            session,
            source,
            path,
            base: path,
            references: IndexSet::new(),
        }
    }

    fn run(mut self, predefined: &[String]) -> Result<DocumentResult, CompileError> {
        let fragment = parse(self.source)?;

        let mut config = PromptConfig::new();
        for node in &fragment.children {
            if let TemplateNode::Config(node) = node {
                config = parse_config(node, self.source)?;
            }
        }

        let mut scope = ScopeContext::new();
        for name in predefined {
            scope.define(name);
        }
        self.scan_nodes(&fragment.children, &mut scope, NodeContext::default())?;

        Ok(DocumentResult {
            parameters: scope.into_used_undefined(),
            config,
            references: self.references,
        })
    }

    fn scan_nodes(
        &mut self,
        nodes: &[TemplateNode],
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        for node in nodes {
            self.scan_node(node, scope, context)?;
        }
        Ok(())
    }

    fn scan_node(
        &mut self,
        node: &TemplateNode,
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        match node {
            TemplateNode::Config(_) | TemplateNode::Comment(_) | TemplateNode::Text(_) => Ok(()),
            TemplateNode::Mustache(tag) => scan_expression(&tag.expression, scope, self.source),
            TemplateNode::If(block) => self.scan_if(block, scope, context),
            TemplateNode::Each(block) => self.scan_each(block, scope, context),
            TemplateNode::Element(tag) => self.scan_element(tag, scope, context),
        }
    }

    fn scan_if(
        &mut self,
        block: &IfBlock,
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        scan_expression(&block.condition, scope, self.source)?;

        let mut then_scope = scope.branch();
        self.scan_nodes(&block.children, &mut then_scope, context)?;
        scope.merge_used(then_scope);

        if let Some(else_branch) = &block.else_branch {
            let mut else_scope = scope.branch();
            self.scan_nodes(&else_branch.children, &mut else_scope, context)?;
            scope.merge_used(else_scope);
        }
        Ok(())
    }

    fn scan_each(
        &mut self,
        block: &EachBlock,
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        scan_expression(&block.iterable, scope, self.source)?;

        // The else branch runs for empty lists, where nothing is bound
        if let Some(else_branch) = &block.else_branch {
            let mut else_scope = scope.branch();
            self.scan_nodes(&else_branch.children, &mut else_scope, context)?;
            scope.merge_used(else_scope);
        }

        let bindings: Vec<&Binding> = std::iter::once(&block.context)
            .chain(block.index.as_ref())
            .collect();
        scope
            .check_bindable(bindings.iter().copied())
            .map_err(|(kind, binding)| self.node_error(kind, binding.span))?;

        let mut body_scope = scope.branch();
        for binding in &bindings {
            body_scope.define(&binding.name);
        }
        self.scan_nodes(&block.children, &mut body_scope, context)?;
        scope.merge_used(body_scope);
        Ok(())
    }

    fn scan_element(
        &mut self,
        tag: &ElementTag,
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        match classify(tag) {
            TagCategory::ToolCall => self.scan_tool_call(tag, scope, context),
            TagCategory::Content => {
                if context.inside_content {
                    return Err(self.node_error(ErrorKind::ContentTagInsideContent, tag.span));
                }
                self.scan_attributes(tag, scope, &[])?;
                let inner = NodeContext {
                    inside_content: true,
                    ..context
                };
                self.scan_nodes(&tag.children, scope, inner)
            }
            TagCategory::Message => self.scan_message(tag, scope, context),
            TagCategory::Reference => self.scan_reference(tag, scope, context),
            TagCategory::Unknown => Err(self.node_error(ErrorKind::UnknownTag(tag.name.clone()), tag.span)),
        }
    }

    fn scan_tool_call(
        &mut self,
        tag: &ElementTag,
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        if context.inside_content {
            return Err(self.node_error(ErrorKind::ToolCallTagInsideContent, tag.span));
        }

        let attributes = self.scan_attributes(tag, scope, &[])?;
        if !attributes.contains("id") {
            return Err(self.node_error(ErrorKind::ToolCallTagWithoutId, tag.span));
        }
        if !attributes.contains("name") {
            return Err(self.node_error(ErrorKind::ToolCallWithoutName, tag.span));
        }

        let inner = NodeContext {
            inside_content: true,
            ..context
        };
        self.scan_nodes(&tag.children, scope, inner)?;

        let pending = self.node_error(ErrorKind::InvalidToolCallPlacement, tag.span);
        self.session.pending_tool_calls.push(pending);
        Ok(())
    }

    fn scan_message(
        &mut self,
        tag: &ElementTag,
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        if context.inside_message || context.inside_content {
            return Err(self.node_error(ErrorKind::MessageTagInsideMessage, tag.span));
        }

        let attributes = self.scan_attributes(tag, scope, &[])?;
        let role = if tag.name == CUSTOM_MESSAGE_TAG {
            if !attributes.contains(CUSTOM_MESSAGE_ROLE_ATTR) {
                return Err(self.node_error(ErrorKind::MessageTagWithoutRole, tag.span));
            }
            self.custom_message_role(tag)?
        } else {
            MessageRole::parse(&tag.name)
        };

        if role == Some(MessageRole::Tool) && !attributes.contains("id") {
            return Err(self.node_error(ErrorKind::ToolMessageWithoutId, tag.span));
        }

        self.flush_pending_tool_calls()?;

        let inner = NodeContext {
            inside_message: true,
            ..context
        };
        self.scan_nodes(&tag.children, scope, inner)?;

        if role != Some(MessageRole::Assistant) {
            self.flush_pending_tool_calls()?;
        }
        self.session.pending_tool_calls.clear();
        Ok(())
    }

    /// Role of a `<message role=...>` tag. Interpolated roles are only known
    /// at run time and yield `None`.
    fn custom_message_role(&self, tag: &ElementTag) -> Result<Option<MessageRole>, CompileError> {
        let Some(attribute) = tag.attribute(CUSTOM_MESSAGE_ROLE_ATTR) else {
            return Ok(None);
        };
        let value = match &attribute.value {
            AttributeValue::Bare => String::new(),
            dynamic if dynamic.first_mustache().is_some() => return Ok(None),
            AttributeValue::Parts(_) => attribute.value.as_static().unwrap_or_default(),
        };
        match MessageRole::parse(value.trim()) {
            Some(role) => Ok(Some(role)),
            None => Err(self.node_error(ErrorKind::InvalidMessageRole(value), attribute.span)),
        }
    }

    fn flush_pending_tool_calls(&mut self) -> Result<(), CompileError> {
        let mut pending = std::mem::take(&mut self.session.pending_tool_calls);
        if pending.is_empty() {
            Ok(())
        } else {
            Err(pending.swap_remove(0))
        }
    }

    fn scan_reference(
        &mut self,
        tag: &ElementTag,
        scope: &mut ScopeContext,
        context: NodeContext,
    ) -> Result<(), CompileError> {
        if context.inside_message || context.inside_content {
            return Err(self.node_error(ErrorKind::InvalidReferencePromptPlacement, tag.span));
        }
        if !tag.children.is_empty() {
            return Err(self.node_error(ErrorKind::ReferenceTagHasContent, tag.span));
        }

        self.scan_attributes(tag, scope, &[REFERENCE_PROMPT_ATTR])?;

        let written = tag
            .attribute(REFERENCE_PROMPT_ATTR)
            .and_then(|attribute| attribute.value.as_static())
            .filter(|path| !path.is_empty());
        let Some(written) = written else {
            return Err(self.node_error(ErrorKind::ReferenceTagWithoutPrompt, tag.span));
        };
        let Some(path) = join_reference_path(self.base, &written) else {
            return Err(self.node_error(ErrorKind::InvalidReferencePath(written), tag.span));
        };
        if self.session.resolver.is_none() {
            return Err(self.node_error(ErrorKind::MissingReferenceFunction, tag.span));
        }

        self.references.insert(path.clone());

        if let Some(resolved) = self.session.referenced.get(&path) {
            debug!(path = %path, "reference already resolved");
            for parameter in &resolved.parameters {
                scope.use_variable(parameter);
            }
            return Ok(());
        }

        if self.session.in_flight.contains(&path) {
            return Err(self.node_error(ErrorKind::CyclicReference(path), tag.span));
        }

        debug!(path = %path, "resolving referenced prompt");
        let resolved = self.resolve_reference(&path, tag)?;
        for parameter in &resolved.parameters {
            scope.use_variable(parameter);
        }
        self.session.referenced.insert(path, resolved);
        Ok(())
    }

    /// Fetch and scan a referenced document inside this session
    fn resolve_reference(
        &mut self,
        path: &str,
        tag: &ElementTag,
    ) -> Result<ResolvedReference, CompileError> {
        let fetched = match self.session.resolver.as_deref_mut() {
            Some(resolver) => resolver.resolve(path, self.base),
            None => return Err(self.node_error(ErrorKind::MissingReferenceFunction, tag.span)),
        };
        let text = fetched.map_err(|error| match error.downcast::<CompileError>() {
            Ok(compile_error) => compile_error,
            Err(error) => self.node_error(ErrorKind::ReferenceError(format!("{:#}", error)), tag.span),
        })?;

        self.session.in_flight.push(path.to_string());
        let result = DocumentScanner::new(&mut *self.session, &text, Some(path)).run(&[]);
        self.session.in_flight.pop();
        let document = result.map_err(|error| error.in_document(Some(path)))?;

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        for reference in &document.references {
            if let Some(resolved) = self.session.referenced.get(reference) {
                hasher.update(resolved.hash.as_bytes());
            }
        }

        Ok(ResolvedReference {
            hash: format!("{:x}", hasher.finalize()),
            parameters: document.parameters,
        })
    }

    /// Scan attribute interpolations and return the names that are present.
    /// Attributes listed in `literal` must not be interpolated.
    fn scan_attributes<'t>(
        &self,
        tag: &'t ElementTag,
        scope: &mut ScopeContext,
        literal: &[&str],
    ) -> Result<HashSet<&'t str>, CompileError> {
        let mut names = HashSet::new();
        for attribute in &tag.attributes {
            if let AttributeValue::Parts(parts) = &attribute.value {
                if literal.contains(&attribute.name.as_str()) {
                    if let Some(mustache) = attribute.value.first_mustache() {
                        return Err(self.node_error(
                            ErrorKind::InvalidStaticAttribute(attribute.name.clone()),
                            mustache.span,
                        ));
                    }
                }
                for part in parts {
                    if let AttributeValuePart::Mustache(mustache) = part {
                        scan_expression(&mustache.expression, scope, self.source)?;
                    }
                }
            }
            names.insert(attribute.name.as_str());
        }
        Ok(names)
    }

    fn node_error(&self, kind: ErrorKind, span: Span) -> CompileError {
        CompileError::new(kind, self.source, span).in_document(self.path)
    }
}
