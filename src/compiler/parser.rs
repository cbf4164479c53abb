/// Parser for prompt templates
use crate::compiler::ast::*;
use crate::compiler::error::{CompileError, ErrorKind};
use crate::compiler::expression::parse_expression;

/// Parse a whole document into its root fragment
pub fn parse(source: &str) -> Result<Fragment, CompileError> {
    Parser::new(source).parse()
}

pub struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

/// What made `parse_children` return
#[derive(Debug)]
enum Stop {
    Eof,
    CloseTag { name: String, span: Span },
    Else { condition: Option<(usize, usize)>, span: Span },
    CloseBlock { name: String, span: Span },
}

/// A `{{ ... }}` found in the source
struct Delimited {
    start: usize,
    inner_start: usize,
    inner_end: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser { source, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Fragment, CompileError> {
        let mut children = Vec::new();
        if let Some(config) = self.parse_config()? {
            children.push(TemplateNode::Config(config));
        }

        let (nodes, stop) = self.parse_children()?;
        children.extend(nodes);

        match stop {
            Stop::Eof => Ok(Fragment {
                children,
                span: Span::new(0, self.source.len()),
            }),
            other => Err(self.unexpected_stop(other)),
        }
    }

    /// Front matter delimited by `---` lines at the very start
    fn parse_config(&mut self) -> Result<Option<Config>, CompileError> {
        let trimmed = self.source.trim_start();
        let start = self.source.len() - trimmed.len();
        let first_len = trimmed.find('\n').unwrap_or(trimmed.len());
        if trimmed[..first_len].trim_end() != "---" || first_len == trimmed.len() {
            return Ok(None);
        }

        let body_start = start + first_len + 1;
        let mut line_start = body_start;
        loop {
            let rest = &self.source[line_start..];
            let line_len = rest.find('\n').unwrap_or(rest.len());
            if rest[..line_len].trim_end() == "---" {
                let value = self.source[body_start..line_start].to_string();
                let end = line_start + line_len;
                self.pos = end;
                return Ok(Some(Config {
                    value,
                    span: Span::new(start, end),
                }));
            }
            if line_len == rest.len() {
                break;
            }
            line_start += line_len + 1;
        }

        Err(self.error(ErrorKind::UnterminatedConfig, Span::new(start, body_start)))
    }

    fn parse_children(&mut self) -> Result<(Vec<TemplateNode>, Stop), CompileError> {
        let mut children = Vec::new();
        let mut text = String::new();
        let mut text_start = self.pos;

        let stop = loop {
            if self.pos >= self.source.len() {
                break Stop::Eof;
            }

            if self.starts_with("\\{{") {
                if text.is_empty() {
                    text_start = self.pos;
                }
                text.push_str("{{");
                self.pos += 3;
                continue;
            }

            let is_markup = self.starts_with("{{")
                || self.starts_with("/*")
                || self.starts_with("<!--")
                || self.at_tag_open()
                || self.at_tag_close();
            if !is_markup {
                if text.is_empty() {
                    text_start = self.pos;
                }
                if let Some(c) = self.peek_char() {
                    text.push(c);
                }
                self.advance();
                continue;
            }

            if !text.is_empty() {
                children.push(TemplateNode::Text(Text {
                    data: std::mem::take(&mut text),
                    span: Span::new(text_start, self.pos),
                }));
            }

            if self.starts_with("{{") {
                let delimited = self.read_delimited()?;
                let inner = &self.source[delimited.inner_start..delimited.inner_end];
                let trimmed = inner.trim_start();
                let span = Span::new(delimited.start, delimited.end);

                if let Some(rest) = trimmed.strip_prefix('#') {
                    let keyword_start = delimited.inner_end - rest.len();
                    children.push(self.parse_block(keyword_start, &delimited)?);
                } else if let Some(rest) = trimmed.strip_prefix(':') {
                    let keyword_start = delimited.inner_end - rest.len();
                    break self.parse_else(keyword_start, &delimited)?;
                } else if let Some(rest) = trimmed.strip_prefix('/') {
                    break Stop::CloseBlock {
                        name: rest.trim().to_string(),
                        span,
                    };
                } else {
                    let expression =
                        parse_expression(self.source, delimited.inner_start, delimited.inner_end)?;
                    children.push(TemplateNode::Mustache(MustacheTag { expression, span }));
                }
            } else if self.starts_with("/*") {
                children.push(self.parse_comment("/*", "*/")?);
            } else if self.starts_with("<!--") {
                children.push(self.parse_comment("<!--", "-->")?);
            } else if self.at_tag_close() {
                break self.parse_closing_tag()?;
            } else {
                children.push(self.parse_element()?);
            }
        };

        if !text.is_empty() {
            children.push(TemplateNode::Text(Text {
                data: text,
                span: Span::new(text_start, self.pos),
            }));
        }

        Ok((children, stop))
    }

    fn parse_comment(&mut self, open: &str, close: &str) -> Result<TemplateNode, CompileError> {
        let start = self.pos;
        self.pos += open.len();
        match self.source[self.pos..].find(close) {
            Some(offset) => {
                let data = self.source[self.pos..self.pos + offset].to_string();
                self.pos += offset + close.len();
                Ok(TemplateNode::Comment(Comment {
                    data,
                    span: Span::new(start, self.pos),
                }))
            }
            None => Err(self.error(
                ErrorKind::UnterminatedComment,
                Span::new(start, self.source.len()),
            )),
        }
    }

    /// `{{#if ...}}` or `{{#each ...}}`; `keyword_start` points after the `#`
    fn parse_block(
        &mut self,
        keyword_start: usize,
        delimited: &Delimited,
    ) -> Result<TemplateNode, CompileError> {
        let (keyword, header_start) = self.read_word(keyword_start, delimited.inner_end);
        match keyword {
            "if" => {
                let condition = parse_expression(self.source, header_start, delimited.inner_end)?;
                Ok(TemplateNode::If(self.parse_if_chain(condition, delimited.start)?))
            }
            "each" => Ok(TemplateNode::Each(self.parse_each(header_start, delimited)?)),
            other => Err(self.error(
                ErrorKind::UnknownBlock(other.to_string()),
                Span::new(delimited.start, delimited.end),
            )),
        }
    }

    /// Body of an if block, following `{{:else if}}` links until the one `{{/if}}`
    fn parse_if_chain(
        &mut self,
        condition: crate::compiler::expression::Expression,
        start: usize,
    ) -> Result<IfBlock, CompileError> {
        let (children, stop) = self.parse_children()?;

        let else_branch = match stop {
            Stop::CloseBlock { ref name, .. } if name == "if" => None,
            Stop::Else {
                condition: None,
                span,
            } => {
                let (else_children, else_stop) = self.parse_children()?;
                match else_stop {
                    Stop::CloseBlock { ref name, .. } if name == "if" => {}
                    Stop::Eof => {
                        return Err(self.error(
                            ErrorKind::UnclosedBlock("if".to_string()),
                            Span::new(start, self.source.len()),
                        ))
                    }
                    other => return Err(self.unexpected_stop(other)),
                }
                Some(ElseBlock {
                    children: else_children,
                    span: Span::new(span.start, self.pos),
                })
            }
            Stop::Else {
                condition: Some((expr_start, expr_end)),
                span,
            } => {
                let nested_condition = parse_expression(self.source, expr_start, expr_end)?;
                let nested = self.parse_if_chain(nested_condition, span.start)?;
                Some(ElseBlock {
                    children: vec![TemplateNode::If(nested)],
                    span: Span::new(span.start, self.pos),
                })
            }
            Stop::Eof => {
                return Err(self.error(
                    ErrorKind::UnclosedBlock("if".to_string()),
                    Span::new(start, self.source.len()),
                ))
            }
            other => return Err(self.unexpected_stop(other)),
        };

        Ok(IfBlock {
            condition,
            children,
            else_branch,
            span: Span::new(start, self.pos),
        })
    }

    /// `{{#each <iterable> as <item>[, <index>]}}`
    fn parse_each(
        &mut self,
        header_start: usize,
        delimited: &Delimited,
    ) -> Result<EachBlock, CompileError> {
        let header = &self.source[header_start..delimited.inner_end];
        let header_span = Span::new(delimited.start, delimited.end);
        let Some(as_offset) = header.rfind(" as ") else {
            return Err(self.error(
                ErrorKind::InvalidBlockHeader("'{{#each <list> as <item>}}'".to_string()),
                header_span,
            ));
        };

        let iterable_end = header_start + as_offset;
        let iterable = parse_expression(self.source, header_start, iterable_end)?;

        let bindings_start = iterable_end + " as ".len();
        let mut bindings = Vec::new();
        let mut offset = bindings_start;
        for part in self.source[bindings_start..delimited.inner_end].split(',') {
            let name = part.trim();
            let leading = part.len() - part.trim_start().len();
            let is_identifier = name
                .chars()
                .next()
                .map_or(false, |c| c.is_alphabetic() || c == '_' || c == '$')
                && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            if !is_identifier {
                return Err(self.error(
                    ErrorKind::InvalidBlockHeader("an identifier after 'as'".to_string()),
                    header_span,
                ));
            }
            let start = offset + leading;
            bindings.push(Binding {
                name: name.to_string(),
                span: Span::new(start, start + name.len()),
            });
            offset += part.len() + 1;
        }

        if bindings.len() > 2 {
            return Err(self.error(
                ErrorKind::InvalidBlockHeader("at most an item and an index".to_string()),
                header_span,
            ));
        }
        let mut bindings = bindings.into_iter();
        let context = match bindings.next() {
            Some(binding) => binding,
            None => {
                return Err(self.error(
                    ErrorKind::InvalidBlockHeader("an identifier after 'as'".to_string()),
                    header_span,
                ))
            }
        };
        let index = bindings.next();

        let (children, stop) = self.parse_children()?;
        let else_branch = match stop {
            Stop::CloseBlock { ref name, .. } if name == "each" => None,
            Stop::Else {
                condition: None,
                span,
            } => {
                let (else_children, else_stop) = self.parse_children()?;
                match else_stop {
                    Stop::CloseBlock { ref name, .. } if name == "each" => {}
                    Stop::Eof => {
                        return Err(self.error(
                            ErrorKind::UnclosedBlock("each".to_string()),
                            Span::new(delimited.start, self.source.len()),
                        ))
                    }
                    other => return Err(self.unexpected_stop(other)),
                }
                Some(ElseBlock {
                    children: else_children,
                    span: Span::new(span.start, self.pos),
                })
            }
            Stop::Eof => {
                return Err(self.error(
                    ErrorKind::UnclosedBlock("each".to_string()),
                    Span::new(delimited.start, self.source.len()),
                ))
            }
            other => return Err(self.unexpected_stop(other)),
        };

        Ok(EachBlock {
            iterable,
            context,
            index,
            children,
            else_branch,
            span: Span::new(delimited.start, self.pos),
        })
    }

    /// `{{:else}}` or `{{:else if <condition>}}`
    fn parse_else(&mut self, keyword_start: usize, delimited: &Delimited) -> Result<Stop, CompileError> {
        let span = Span::new(delimited.start, delimited.end);
        let (keyword, rest_start) = self.read_word(keyword_start, delimited.inner_end);
        if keyword != "else" {
            return Err(self.error(ErrorKind::UnknownBlock(format!(":{}", keyword)), span));
        }

        let rest = self.source[rest_start..delimited.inner_end].trim();
        if rest.is_empty() {
            return Ok(Stop::Else {
                condition: None,
                span,
            });
        }

        let (word, condition_start) = self.read_word(rest_start, delimited.inner_end);
        if word != "if" {
            return Err(self.error(ErrorKind::UnexpectedToken(word.to_string()), span));
        }
        Ok(Stop::Else {
            condition: Some((condition_start, delimited.inner_end)),
            span,
        })
    }

    fn parse_element(&mut self) -> Result<TemplateNode, CompileError> {
        let start = self.pos;
        self.expect("<")?;
        let name = self.read_tag_name()?;

        let mut attributes: Vec<Attribute> = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();

            if self.pos >= self.source.len() {
                return Err(self.error(
                    ErrorKind::UnclosedTag(name),
                    Span::new(start, self.source.len()),
                ));
            }
            if self.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if self.peek_char() == Some('>') {
                self.advance();
                break false;
            }

            let attribute = self.parse_attribute()?;
            if attributes.iter().any(|existing| existing.name == attribute.name) {
                return Err(self.error(
                    ErrorKind::DuplicateAttribute(attribute.name),
                    attribute.span,
                ));
            }
            attributes.push(attribute);
        };

        let children = if self_closing {
            Vec::new()
        } else {
            let (children, stop) = self.parse_children()?;
            match stop {
                Stop::CloseTag {
                    name: ref closing, ..
                } if *closing == name => {}
                Stop::Eof => {
                    return Err(self.error(
                        ErrorKind::UnclosedTag(name),
                        Span::new(start, self.source.len()),
                    ))
                }
                other => return Err(self.unexpected_stop(other)),
            }
            children
        };

        Ok(TemplateNode::Element(ElementTag {
            name,
            attributes,
            children,
            span: Span::new(start, self.pos),
        }))
    }

    fn parse_attribute(&mut self) -> Result<Attribute, CompileError> {
        let start = self.pos;
        let name_len = self.source[self.pos..]
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')))
            .unwrap_or(self.source.len() - self.pos);
        if name_len == 0 {
            return Err(self.unexpected_char());
        }
        let name = self.source[self.pos..self.pos + name_len].to_string();
        self.pos += name_len;
        self.skip_whitespace();

        if self.peek_char() != Some('=') {
            return Ok(Attribute {
                name,
                value: AttributeValue::Bare,
                span: Span::new(start, self.pos),
            });
        }
        self.advance();
        self.skip_whitespace();

        let parts = match self.peek_char() {
            Some(quote @ ('"' | '\'')) => {
                self.advance();
                let parts = self.parse_attribute_parts(quote)?;
                self.advance();
                parts
            }
            Some('{') if self.starts_with("{{") => {
                let delimited = self.read_delimited()?;
                let expression =
                    parse_expression(self.source, delimited.inner_start, delimited.inner_end)?;
                vec![AttributeValuePart::Mustache(MustacheTag {
                    expression,
                    span: Span::new(delimited.start, delimited.end),
                })]
            }
            Some(_) => {
                let value_start = self.pos;
                while let Some(c) = self.peek_char() {
                    if c.is_whitespace() || c == '>' || self.starts_with("/>") {
                        break;
                    }
                    self.advance();
                }
                vec![AttributeValuePart::Text(Text {
                    data: self.source[value_start..self.pos].to_string(),
                    span: Span::new(value_start, self.pos),
                })]
            }
            None => return Err(self.error(ErrorKind::UnexpectedEof, Span::new(self.pos, self.pos))),
        };

        Ok(Attribute {
            name,
            value: AttributeValue::Parts(parts),
            span: Span::new(start, self.pos),
        })
    }

    /// Quoted attribute value up to (not including) the closing quote
    fn parse_attribute_parts(&mut self, quote: char) -> Result<Vec<AttributeValuePart>, CompileError> {
        let mut parts = Vec::new();
        let mut text_start = self.pos;

        loop {
            match self.peek_char() {
                None => {
                    return Err(self.error(
                        ErrorKind::UnexpectedEof,
                        Span::new(text_start, self.source.len()),
                    ))
                }
                Some(c) if c == quote => break,
                Some('{') if self.starts_with("{{") => {
                    if self.pos > text_start {
                        parts.push(AttributeValuePart::Text(Text {
                            data: self.source[text_start..self.pos].to_string(),
                            span: Span::new(text_start, self.pos),
                        }));
                    }
                    let delimited = self.read_delimited()?;
                    let expression =
                        parse_expression(self.source, delimited.inner_start, delimited.inner_end)?;
                    parts.push(AttributeValuePart::Mustache(MustacheTag {
                        expression,
                        span: Span::new(delimited.start, delimited.end),
                    }));
                    text_start = self.pos;
                }
                Some(_) => self.advance(),
            }
        }

        if self.pos > text_start {
            parts.push(AttributeValuePart::Text(Text {
                data: self.source[text_start..self.pos].to_string(),
                span: Span::new(text_start, self.pos),
            }));
        }
        Ok(parts)
    }

    fn parse_closing_tag(&mut self) -> Result<Stop, CompileError> {
        let start = self.pos;
        self.expect("</")?;
        let name = self.read_tag_name()?;
        self.skip_whitespace();
        self.expect(">")?;
        Ok(Stop::CloseTag {
            name,
            span: Span::new(start, self.pos),
        })
    }

    /// Consume `{{ ... }}`, skipping over quoted strings and nested braces
    fn read_delimited(&mut self) -> Result<Delimited, CompileError> {
        let start = self.pos;
        let inner_start = start + 2;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for (offset, c) in self.source[inner_start..].char_indices() {
            let index = inner_start + offset;
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '"' | '\'' | '`' => quote = Some(c),
                '{' => depth += 1,
                '}' if depth > 0 => depth -= 1,
                '}' if self.source[index..].starts_with("}}") => {
                    self.pos = index + 2;
                    return Ok(Delimited {
                        start,
                        inner_start,
                        inner_end: index,
                        end: self.pos,
                    });
                }
                _ => {}
            }
        }

        Err(self.error(ErrorKind::UnexpectedEof, Span::new(start, self.source.len())))
    }

    /// Leading identifier of `source[from..to]` and the offset just after it
    fn read_word(&self, from: usize, to: usize) -> (&'a str, usize) {
        let slice = &self.source[from..to];
        let leading = slice.len() - slice.trim_start().len();
        let word_start = from + leading;
        let word_len = self.source[word_start..to]
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(to - word_start);
        (&self.source[word_start..word_start + word_len], word_start + word_len)
    }

    fn read_tag_name(&mut self) -> Result<String, CompileError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            let valid = if self.pos == start {
                c.is_ascii_alphabetic()
            } else {
                c.is_ascii_alphanumeric() || c == '_' || c == '-'
            };
            if !valid {
                break;
            }
            self.advance();
        }

        if self.pos == start {
            Err(self.unexpected_char())
        } else {
            Ok(self.source[start..self.pos].to_string())
        }
    }

    fn unexpected_stop(&self, stop: Stop) -> CompileError {
        match stop {
            Stop::Eof => self.error(
                ErrorKind::UnexpectedEof,
                Span::new(self.source.len(), self.source.len()),
            ),
            Stop::CloseTag { name, span } => self.error(ErrorKind::UnexpectedTagClose(name), span),
            Stop::Else { span, .. } => {
                self.error(ErrorKind::UnexpectedBlockClose(":else".to_string()), span)
            }
            Stop::CloseBlock { name, span } => {
                self.error(ErrorKind::UnexpectedBlockClose(format!("/{}", name)), span)
            }
        }
    }

    fn unexpected_char(&self) -> CompileError {
        match self.peek_char() {
            Some(c) => self.error(
                ErrorKind::UnexpectedToken(c.to_string()),
                Span::new(self.pos, self.pos + c.len_utf8()),
            ),
            None => self.error(ErrorKind::UnexpectedEof, Span::new(self.pos, self.pos)),
        }
    }

    fn error(&self, kind: ErrorKind, span: Span) -> CompileError {
        CompileError::new(kind, self.source, span)
    }

    // Helper methods
    fn at_tag_open(&self) -> bool {
        let mut chars = self.source[self.pos..].chars();
        chars.next() == Some('<') && chars.next().map_or(false, |c| c.is_ascii_alphabetic())
    }

    fn at_tag_close(&self) -> bool {
        let mut chars = self.source[self.pos..].chars();
        chars.next() == Some('<')
            && chars.next() == Some('/')
            && chars.next().map_or(false, |c| c.is_ascii_alphabetic())
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.source[self.pos..].starts_with(s)
    }

    fn expect(&mut self, s: &str) -> Result<(), CompileError> {
        if self.starts_with(s) {
            self.pos += s.len();
            Ok(())
        } else {
            Err(self.unexpected_char())
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}
