/// Expressions inside `{{ }}`, block headers and attribute values.
///
/// A JavaScript subset. Every node carries absolute byte offsets into the
/// document so errors never need a second coordinate system.
use crate::compiler::ast::Span;
use crate::compiler::error::{CompileError, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Identifier(String),
    Literal(Literal),
    Array(Vec<Expression>),
    Object(Vec<ObjectProperty>),
    Member {
        object: Box<Expression>,
        property: MemberProperty,
        optional: bool,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        optional: bool,
    },
    Unary {
        operator: String,
        argument: Box<Expression>,
    },
    Update {
        operator: String,
        prefix: bool,
        argument: Box<Expression>,
    },
    Binary {
        operator: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Assignment {
        operator: String,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Sequence(Vec<Expression>),
    Spread(Box<Expression>),
    /// Syntax the parser understands but templates do not allow
    /// (`this`, `new`, arrow functions, template literals)
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    KeyValue { key: PropertyKey, value: Expression },
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Named(String),
    Computed(Expression),
}

/// Parse the expression found at `source[start..end]`
pub fn parse_expression(source: &str, start: usize, end: usize) -> Result<Expression, CompileError> {
    let tokens = tokenize(source, start, end)?;
    let mut parser = ExpressionParser {
        source,
        tokens,
        pos: 0,
        prev_end: start,
    };

    if parser.at_eof() {
        return Err(CompileError::new(
            ErrorKind::EmptyExpression,
            source,
            Span::new(start, end),
        ));
    }

    let expression = parser.parse_sequence()?;
    if !parser.at_eof() {
        return Err(parser.unexpected());
    }
    Ok(expression)
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Identifier(String),
    Number(f64),
    String(String),
    Template,
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

// Longest first, so the lexer can take the first match
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&", "|",
    "^", "?", ":", ",", ".", "(", ")", "[", "]", "{", "}",
];

const ASSIGNMENT_OPERATORS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=",
    "||=", "??=",
];

fn binary_precedence(operator: &str) -> Option<u8> {
    let precedence = match operator {
        "??" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "in" | "instanceof" => 8,
        "<<" | ">>" | ">>>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        "**" => 12,
        _ => return None,
    };
    Some(precedence)
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn tokenize(source: &str, start: usize, end: usize) -> Result<Vec<Token>, CompileError> {
    let input = &source[start..end];
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token_start = start + offset;

        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if is_identifier_start(c) {
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !is_identifier_part(c) {
                    break;
                }
                name.push(c);
                chars.next();
            }
            let token_end = token_start + name.len();
            tokens.push(Token {
                kind: TokenKind::Identifier(name),
                start: token_start,
                end: token_end,
            });
            continue;
        }

        let rest = &input[offset..];
        let starts_number = c.is_ascii_digit()
            || (c == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit()));
        if starts_number {
            let length = number_length(rest);
            let text = &rest[..length];
            let value = parse_number(text).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::UnexpectedToken(text.to_string()),
                    source,
                    Span::new(token_start, token_start + length),
                )
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                start: token_start,
                end: token_start + length,
            });
            for _ in text.chars() {
                chars.next();
            }
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, next)) = chars.next() {
                if next == c {
                    closed = true;
                    break;
                }
                if next == '\\' {
                    let Some((_, escaped)) = chars.next() else {
                        break;
                    };
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                    continue;
                }
                value.push(next);
            }
            if !closed {
                return Err(CompileError::new(
                    ErrorKind::UnexpectedEof,
                    source,
                    Span::new(token_start, end),
                ));
            }
            let token_end = chars.peek().map_or(end, |&(offset, _)| start + offset);
            let kind = if c == '`' {
                TokenKind::Template
            } else {
                TokenKind::String(value)
            };
            tokens.push(Token {
                kind,
                start: token_start,
                end: token_end,
            });
            continue;
        }

        let punct = PUNCTUATORS
            .iter()
            .find(|p| rest.starts_with(**p))
            .copied()
            // `a?.5:b` is a conditional, not optional chaining
            .map(|p| {
                if p == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                    "?"
                } else {
                    p
                }
            });

        match punct {
            Some(p) => {
                tokens.push(Token {
                    kind: TokenKind::Punct(p),
                    start: token_start,
                    end: token_start + p.len(),
                });
                for _ in 0..p.len() {
                    chars.next();
                }
            }
            None => {
                return Err(CompileError::new(
                    ErrorKind::UnexpectedToken(c.to_string()),
                    source,
                    Span::new(token_start, token_start + c.len_utf8()),
                ));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        start: end,
        end,
    });
    Ok(tokens)
}

fn number_length(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' && matches!(bytes[1], b'x' | b'X' | b'b' | b'B' | b'o' | b'O') {
        return 2 + rest[2..]
            .bytes()
            .take_while(|b| b.is_ascii_hexdigit() || *b == b'_')
            .count();
    }

    let mut length = 0;
    let mut seen_dot = false;
    let mut seen_exponent = false;
    while length < bytes.len() {
        let b = bytes[length];
        if b.is_ascii_digit() || b == b'_' {
            length += 1;
        } else if b == b'.' && !seen_dot && !seen_exponent {
            seen_dot = true;
            length += 1;
        } else if (b == b'e' || b == b'E') && !seen_exponent {
            seen_exponent = true;
            length += 1;
            if length < bytes.len() && (bytes[length] == b'+' || bytes[length] == b'-') {
                length += 1;
            }
        } else {
            break;
        }
    }
    length
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text.replace('_', "");
    let radix = match cleaned.get(..2) {
        Some("0x") | Some("0X") => 16,
        Some("0b") | Some("0B") => 2,
        Some("0o") | Some("0O") => 8,
        _ => return cleaned.parse::<f64>().ok(),
    };
    i64::from_str_radix(&cleaned[2..], radix).ok().map(|n| n as f64)
}

struct ExpressionParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    prev_end: usize,
}

impl<'a> ExpressionParser<'a> {
    fn parse_sequence(&mut self) -> Result<Expression, CompileError> {
        let start = self.current().start;
        let first = self.parse_assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }

        let mut expressions = vec![first];
        while self.eat_punct(",") {
            expressions.push(self.parse_assignment()?);
        }
        Ok(self.finish(ExpressionKind::Sequence(expressions), start))
    }

    fn parse_assignment(&mut self) -> Result<Expression, CompileError> {
        let start = self.current().start;
        let target = self.parse_conditional()?;

        if self.is_punct("=>") {
            return self.skip_arrow_body(start);
        }

        let operator = match &self.current().kind {
            TokenKind::Punct(p) if ASSIGNMENT_OPERATORS.contains(p) => *p,
            _ => return Ok(target),
        };
        self.advance();
        let value = self.parse_assignment()?;
        Ok(self.finish(
            ExpressionKind::Assignment {
                operator: operator.to_string(),
                target: Box::new(target),
                value: Box::new(value),
            },
            start,
        ))
    }

    fn parse_conditional(&mut self) -> Result<Expression, CompileError> {
        let start = self.current().start;
        let test = self.parse_binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }

        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(self.finish(
            ExpressionKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            start,
        ))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expression, CompileError> {
        let start = self.current().start;
        let mut left = self.parse_unary()?;

        loop {
            let operator = match &self.current().kind {
                TokenKind::Punct(p) => p.to_string(),
                TokenKind::Identifier(name) if name == "in" || name == "instanceof" => name.clone(),
                _ => break,
            };
            let Some(precedence) = binary_precedence(&operator) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.advance();

            // `**` is right-associative
            let next_min = if operator == "**" { precedence } else { precedence + 1 };
            let right = self.parse_binary(next_min)?;
            left = self.finish(
                ExpressionKind::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                start,
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, CompileError> {
        let start = self.current().start;
        let operator = match &self.current().kind {
            TokenKind::Punct(p @ ("!" | "-" | "+" | "~")) => Some(p.to_string()),
            TokenKind::Identifier(name) if matches!(name.as_str(), "typeof" | "void" | "delete") => {
                Some(name.clone())
            }
            _ => None,
        };

        if let Some(operator) = operator {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(self.finish(
                ExpressionKind::Unary {
                    operator,
                    argument: Box::new(argument),
                },
                start,
            ));
        }

        if let TokenKind::Punct(p @ ("++" | "--")) = self.current().kind {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(self.finish(
                ExpressionKind::Update {
                    operator: p.to_string(),
                    prefix: true,
                    argument: Box::new(argument),
                },
                start,
            ));
        }

        if self.is_identifier("new") {
            self.advance();
            self.parse_call_chain()?;
            return Ok(self.finish(ExpressionKind::Unsupported("NewExpression"), start));
        }

        let expression = self.parse_call_chain()?;
        if let TokenKind::Punct(p @ ("++" | "--")) = self.current().kind {
            self.advance();
            return Ok(self.finish(
                ExpressionKind::Update {
                    operator: p.to_string(),
                    prefix: false,
                    argument: Box::new(expression),
                },
                start,
            ));
        }
        Ok(expression)
    }

    fn parse_call_chain(&mut self) -> Result<Expression, CompileError> {
        let start = self.current().start;
        let mut expression = self.parse_primary()?;

        loop {
            if self.eat_punct(".") {
                let name = self.expect_property_name()?;
                expression = self.finish(
                    ExpressionKind::Member {
                        object: Box::new(expression),
                        property: MemberProperty::Named(name),
                        optional: false,
                    },
                    start,
                );
            } else if self.eat_punct("?.") {
                if self.eat_punct("(") {
                    let arguments = self.parse_arguments()?;
                    expression = self.finish(
                        ExpressionKind::Call {
                            callee: Box::new(expression),
                            arguments,
                            optional: true,
                        },
                        start,
                    );
                } else if self.eat_punct("[") {
                    let property = self.parse_sequence()?;
                    self.expect_punct("]")?;
                    expression = self.finish(
                        ExpressionKind::Member {
                            object: Box::new(expression),
                            property: MemberProperty::Computed(Box::new(property)),
                            optional: true,
                        },
                        start,
                    );
                } else {
                    let name = self.expect_property_name()?;
                    expression = self.finish(
                        ExpressionKind::Member {
                            object: Box::new(expression),
                            property: MemberProperty::Named(name),
                            optional: true,
                        },
                        start,
                    );
                }
            } else if self.eat_punct("[") {
                let property = self.parse_sequence()?;
                self.expect_punct("]")?;
                expression = self.finish(
                    ExpressionKind::Member {
                        object: Box::new(expression),
                        property: MemberProperty::Computed(Box::new(property)),
                        optional: false,
                    },
                    start,
                );
            } else if self.eat_punct("(") {
                let arguments = self.parse_arguments()?;
                expression = self.finish(
                    ExpressionKind::Call {
                        callee: Box::new(expression),
                        arguments,
                        optional: false,
                    },
                    start,
                );
            } else if self.current().kind == TokenKind::Template {
                self.advance();
                expression = self.finish(
                    ExpressionKind::Unsupported("TaggedTemplateExpression"),
                    start,
                );
            } else {
                break;
            }
        }

        Ok(expression)
    }

    /// Arguments after an already consumed `(`
    fn parse_arguments(&mut self) -> Result<Vec<Expression>, CompileError> {
        let mut arguments = Vec::new();
        while !self.is_punct(")") {
            arguments.push(self.parse_spread_or_assignment()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(arguments)
    }

    fn parse_spread_or_assignment(&mut self) -> Result<Expression, CompileError> {
        let start = self.current().start;
        if self.eat_punct("...") {
            let argument = self.parse_assignment()?;
            return Ok(self.finish(ExpressionKind::Spread(Box::new(argument)), start));
        }
        self.parse_assignment()
    }

    fn parse_primary(&mut self) -> Result<Expression, CompileError> {
        let token = self.current().clone();
        let start = token.start;

        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(self.finish(ExpressionKind::Literal(Literal::Number(value)), start))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(self.finish(ExpressionKind::Literal(Literal::String(value)), start))
            }
            TokenKind::Template => {
                self.advance();
                Ok(self.finish(ExpressionKind::Unsupported("TemplateLiteral"), start))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                let kind = match name.as_str() {
                    "true" => ExpressionKind::Literal(Literal::Boolean(true)),
                    "false" => ExpressionKind::Literal(Literal::Boolean(false)),
                    "null" => ExpressionKind::Literal(Literal::Null),
                    "undefined" => ExpressionKind::Literal(Literal::Undefined),
                    "this" => ExpressionKind::Unsupported("ThisExpression"),
                    _ => ExpressionKind::Identifier(name),
                };
                Ok(self.finish(kind, start))
            }
            TokenKind::Punct("(") => {
                self.advance();
                if self.eat_punct(")") {
                    // Only `() => body` may have empty parentheses
                    if !self.is_punct("=>") {
                        return Err(self.unexpected());
                    }
                    return self.skip_arrow_body(start);
                }
                let inner = self.parse_sequence()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut elements = Vec::new();
                while !self.is_punct("]") {
                    if self.eat_punct(",") {
                        continue;
                    }
                    elements.push(self.parse_spread_or_assignment()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(self.finish(ExpressionKind::Array(elements), start))
            }
            TokenKind::Punct("{") => {
                self.advance();
                let properties = self.parse_object_properties()?;
                Ok(self.finish(ExpressionKind::Object(properties), start))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Properties after an already consumed `{`
    fn parse_object_properties(&mut self) -> Result<Vec<ObjectProperty>, CompileError> {
        let mut properties = Vec::new();

        while !self.is_punct("}") {
            if self.eat_punct("...") {
                properties.push(ObjectProperty::Spread(self.parse_assignment()?));
            } else {
                let token = self.current().clone();
                let key = match token.kind {
                    TokenKind::Punct("[") => {
                        self.advance();
                        let key = self.parse_assignment()?;
                        self.expect_punct("]")?;
                        PropertyKey::Computed(key)
                    }
                    TokenKind::Identifier(ref name) => {
                        self.advance();
                        if self.is_punct(",") || self.is_punct("}") {
                            // Shorthand `{ name }` reads the variable `name`
                            let value = Expression {
                                kind: ExpressionKind::Identifier(name.clone()),
                                span: Span::new(token.start, token.end),
                            };
                            properties.push(ObjectProperty::KeyValue {
                                key: PropertyKey::Named(name.clone()),
                                value,
                            });
                            if !self.eat_punct(",") {
                                break;
                            }
                            continue;
                        }
                        PropertyKey::Named(name.clone())
                    }
                    TokenKind::String(ref value) => {
                        self.advance();
                        PropertyKey::Named(value.clone())
                    }
                    TokenKind::Number(value) => {
                        self.advance();
                        PropertyKey::Named(value.to_string())
                    }
                    _ => return Err(self.unexpected()),
                };
                self.expect_punct(":")?;
                let value = self.parse_assignment()?;
                properties.push(ObjectProperty::KeyValue { key, value });
            }

            if !self.eat_punct(",") {
                break;
            }
        }

        self.expect_punct("}")?;
        Ok(properties)
    }

    /// Consume `=> body` and collapse the whole arrow function into one node
    fn skip_arrow_body(&mut self, start: usize) -> Result<Expression, CompileError> {
        self.expect_punct("=>")?;
        if self.eat_punct("{") {
            let mut depth = 1;
            while depth > 0 {
                match self.current().kind {
                    TokenKind::Eof => return Err(self.unexpected()),
                    TokenKind::Punct("{") => depth += 1,
                    TokenKind::Punct("}") => depth -= 1,
                    _ => {}
                }
                self.advance();
            }
        } else {
            self.parse_assignment()?;
        }
        Ok(self.finish(ExpressionKind::Unsupported("ArrowFunctionExpression"), start))
    }

    fn expect_property_name(&mut self) -> Result<String, CompileError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn finish(&self, kind: ExpressionKind, start: usize) -> Expression {
        Expression {
            kind,
            span: Span::new(start, self.prev_end.max(start)),
        }
    }

    fn current(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.prev_end = self.current().end;
            self.pos += 1;
        }
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.current().kind, TokenKind::Punct(p) if p == punct)
    }

    fn is_identifier(&self, name: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Identifier(n) if n == name)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), CompileError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> CompileError {
        let token = self.current();
        let kind = match &token.kind {
            TokenKind::Eof => ErrorKind::UnexpectedEof,
            _ => ErrorKind::UnexpectedToken(self.source[token.start..token.end].to_string()),
        };
        CompileError::new(kind, self.source, Span::new(token.start, token.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Expression {
        parse_expression(source, 0, source.len()).unwrap()
    }

    #[test]
    fn test_identifier_span_is_absolute() {
        let source = "Hello {{ name }}";
        let expression = parse_expression(source, 8, 14).unwrap();
        assert_eq!(expression.kind, ExpressionKind::Identifier("name".to_string()));
        assert_eq!(expression.span, Span::new(9, 13));
    }

    #[test]
    fn test_precedence() {
        let expression = parse("a + b * c");
        match expression.kind {
            ExpressionKind::Binary { operator, right, .. } => {
                assert_eq!(operator, "+");
                assert!(matches!(right.kind, ExpressionKind::Binary { ref operator, .. } if operator == "*"));
            }
            other => panic!("Expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn test_member_and_call_chain() {
        let expression = parse("user.names.join(', ')");
        match expression.kind {
            ExpressionKind::Call { callee, arguments, .. } => {
                assert_eq!(arguments.len(), 1);
                assert!(matches!(
                    callee.kind,
                    ExpressionKind::Member { property: MemberProperty::Named(ref name), .. } if name == "join"
                ));
            }
            other => panic!("Expected call expression, got {:?}", other),
        }
    }

    #[test]
    fn test_conditional_and_optional_chaining() {
        let expression = parse("user?.name ? user.name : 'anonymous'");
        assert!(matches!(expression.kind, ExpressionKind::Conditional { .. }));
    }

    #[test]
    fn test_numeric_conditional_is_not_optional_chaining() {
        let expression = parse("a?.5:1");
        assert!(matches!(expression.kind, ExpressionKind::Conditional { .. }));
    }

    #[test]
    fn test_object_shorthand() {
        let expression = parse("{ name, 'key': value, [dynamic]: 1, ...rest }");
        match expression.kind {
            ExpressionKind::Object(properties) => assert_eq!(properties.len(), 4),
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment() {
        let expression = parse("total = total + 1");
        assert!(matches!(expression.kind, ExpressionKind::Assignment { ref operator, .. } if operator == "="));
    }

    #[test]
    fn test_unsupported_syntax_is_kept_as_node() {
        assert_eq!(parse("this").kind, ExpressionKind::Unsupported("ThisExpression"));
        assert_eq!(parse("new Date()").kind, ExpressionKind::Unsupported("NewExpression"));
        assert_eq!(parse("(x) => x * 2").kind, ExpressionKind::Unsupported("ArrowFunctionExpression"));
        assert_eq!(parse("() => { return 1 }").kind, ExpressionKind::Unsupported("ArrowFunctionExpression"));
        assert_eq!(parse("`hi ${name}`").kind, ExpressionKind::Unsupported("TemplateLiteral"));
    }

    #[test]
    fn test_empty_expression() {
        let error = parse_expression("{{   }}", 2, 5).unwrap_err();
        assert_eq!(error.kind, ErrorKind::EmptyExpression);
    }

    #[test]
    fn test_unterminated_string() {
        let error = parse_expression("'open", 0, 5).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        let error = parse_expression("a b", 0, 3).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnexpectedToken("b".to_string()));
        assert_eq!(error.start, 2);
    }
}
