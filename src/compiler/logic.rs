/// Static walk over expressions, collecting the identifiers they read
use crate::compiler::error::{CompileError, ErrorKind};
use crate::compiler::expression::{
    Expression, ExpressionKind, MemberProperty, ObjectProperty, PropertyKey,
};
use crate::compiler::scope::ScopeContext;

/// Report every free identifier in `expression` to `scope`.
///
/// Nothing is evaluated. Assignments bind their target in `scope` so later
/// siblings see it as defined.
pub fn scan_expression(
    expression: &Expression,
    scope: &mut ScopeContext,
    source: &str,
) -> Result<(), CompileError> {
    ExpressionScanner { scope, source }.visit(expression)
}

struct ExpressionScanner<'s, 'a> {
    scope: &'s mut ScopeContext,
    source: &'a str,
}

impl ExpressionScanner<'_, '_> {
    fn visit(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match &expression.kind {
            ExpressionKind::Identifier(name) => {
                self.scope.use_variable(name);
                Ok(())
            }
            ExpressionKind::Literal(_) => Ok(()),
            ExpressionKind::Array(elements) | ExpressionKind::Sequence(elements) => {
                elements.iter().try_for_each(|element| self.visit(element))
            }
            ExpressionKind::Object(properties) => {
                for property in properties {
                    match property {
                        ObjectProperty::KeyValue { key, value } => {
                            if let PropertyKey::Computed(key) = key {
                                self.visit(key)?;
                            }
                            self.visit(value)?;
                        }
                        ObjectProperty::Spread(argument) => self.visit(argument)?,
                    }
                }
                Ok(())
            }
            ExpressionKind::Member {
                object, property, ..
            } => {
                self.visit(object)?;
                if let MemberProperty::Computed(property) = property {
                    self.visit(property)?;
                }
                Ok(())
            }
            ExpressionKind::Call {
                callee, arguments, ..
            } => {
                self.visit(callee)?;
                arguments.iter().try_for_each(|argument| self.visit(argument))
            }
            ExpressionKind::Unary { operator, argument } => {
                if matches!(operator.as_str(), "delete" | "void") {
                    return Err(self.error(ErrorKind::UnsupportedOperator(operator.clone()), expression));
                }
                self.visit(argument)
            }
            ExpressionKind::Update { argument, .. } => match &argument.kind {
                ExpressionKind::Identifier(name) => {
                    self.scope.use_variable(name);
                    Ok(())
                }
                ExpressionKind::Member { .. } => self.visit(argument),
                _ => Err(self.error(ErrorKind::InvalidUpdate, argument)),
            },
            ExpressionKind::Binary { left, right, .. } => {
                self.visit(left)?;
                self.visit(right)
            }
            ExpressionKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.visit(test)?;
                self.visit(consequent)?;
                self.visit(alternate)
            }
            ExpressionKind::Assignment {
                operator,
                target,
                value,
            } => match &target.kind {
                ExpressionKind::Identifier(name) => {
                    if operator != "=" {
                        self.scope.use_variable(name);
                    }
                    self.visit(value)?;
                    self.scope.define(name);
                    Ok(())
                }
                ExpressionKind::Member { .. } => {
                    self.visit(target)?;
                    self.visit(value)
                }
                _ => Err(self.error(ErrorKind::InvalidAssignment, target)),
            },
            ExpressionKind::Spread(argument) => self.visit(argument),
            ExpressionKind::Unsupported(kind) => Err(self.error(
                ErrorKind::UnsupportedExpressionType(kind.to_string()),
                expression,
            )),
        }
    }

    fn error(&self, kind: ErrorKind, expression: &Expression) -> CompileError {
        CompileError::new(kind, self.source, expression.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::expression::parse_expression;

    fn free_variables(source: &str) -> Vec<String> {
        let mut scope = ScopeContext::new();
        let expression = parse_expression(source, 0, source.len()).unwrap();
        scan_expression(&expression, &mut scope, source).unwrap();
        scope.into_used_undefined().into_iter().collect()
    }

    fn scan_error(source: &str) -> CompileError {
        let mut scope = ScopeContext::new();
        let expression = parse_expression(source, 0, source.len()).unwrap();
        scan_expression(&expression, &mut scope, source).unwrap_err()
    }

    #[test]
    fn test_member_roots_only() {
        assert_eq!(free_variables("user.profile.name"), vec!["user"]);
        assert_eq!(free_variables("user?.[key]"), vec!["user", "key"]);
    }

    #[test]
    fn test_operators_and_calls() {
        assert_eq!(
            free_variables("format(a + b, c ? d : e) ?? fallback"),
            vec!["format", "a", "b", "c", "d", "e", "fallback"]
        );
    }

    #[test]
    fn test_literals_and_keys() {
        assert_eq!(
            free_variables("{ name: first, [key]: 1, last, ...rest, 'q': undefined }"),
            vec!["first", "key", "last", "rest"]
        );
        assert!(free_variables("[1, 'two', true, null]").is_empty());
    }

    #[test]
    fn test_defined_names_are_skipped() {
        let source = "item.name + other";
        let mut scope = ScopeContext::new();
        scope.define("item");
        let expression = parse_expression(source, 0, source.len()).unwrap();
        scan_expression(&expression, &mut scope, source).unwrap();
        assert_eq!(scope.into_used_undefined().into_iter().collect::<Vec<_>>(), vec!["other"]);
    }

    #[test]
    fn test_assignment_defines_target() {
        assert_eq!(free_variables("(total = price * 2, total)"), vec!["price"]);
        assert_eq!(free_variables("count += 1"), vec!["count"]);
        assert_eq!(free_variables("x = x"), vec!["x"]);
    }

    #[test]
    fn test_update_reports_target() {
        assert_eq!(free_variables("i++"), vec!["i"]);
        assert_eq!(free_variables("--obj.count"), vec!["obj"]);
    }

    #[test]
    fn test_invalid_targets() {
        assert_eq!(scan_error("1 = a").code(), "invalid-assignment");
        assert_eq!(scan_error("f()++").code(), "invalid-update");
    }

    #[test]
    fn test_unsupported_constructs() {
        let error = scan_error("a + new Date()");
        assert_eq!(error.kind, ErrorKind::UnsupportedExpressionType("NewExpression".to_string()));
        assert_eq!(error.start, 4);

        let error = scan_error("delete a.b");
        assert_eq!(error.kind, ErrorKind::UnsupportedOperator("delete".to_string()));
        assert_eq!(scan_error("items.map(i => i)").code(), "unsupported-expression-type");
    }
}
