use std::collections::HashSet;

use indexmap::IndexSet;

use crate::compiler::ast::Binding;
use crate::compiler::error::ErrorKind;

/// Variables visible to one traversal branch, plus the free variables it
/// has discovered so far.
#[derive(Debug, Clone, Default)]
pub struct ScopeContext {
    defined: HashSet<String>,
    used_undefined: IndexSet<String>,
}

impl ScopeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent scope for a diverging branch. Defined names are copied by
    /// value and the free-variable set starts empty; the caller merges it
    /// back with [`ScopeContext::merge_used`].
    pub fn branch(&self) -> ScopeContext {
        ScopeContext {
            defined: self.defined.clone(),
            used_undefined: IndexSet::new(),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains(name)
    }

    pub fn define(&mut self, name: &str) {
        self.defined.insert(name.to_string());
    }

    /// Record a reference to `name`, returning true when it is free
    pub fn use_variable(&mut self, name: &str) -> bool {
        if self.defined.contains(name) {
            return false;
        }
        self.used_undefined.insert(name.to_string());
        true
    }

    pub fn merge_used(&mut self, child: ScopeContext) {
        self.used_undefined.extend(child.used_undefined);
    }

    /// Loop bindings may not shadow anything already in scope
    pub fn check_bindable<'b>(
        &self,
        bindings: impl IntoIterator<Item = &'b Binding>,
    ) -> Result<(), (ErrorKind, &'b Binding)> {
        for binding in bindings {
            if self.defined.contains(&binding.name) {
                return Err((ErrorKind::VariableAlreadyDeclared(binding.name.clone()), binding));
            }
        }
        Ok(())
    }

    pub fn used_undefined(&self) -> &IndexSet<String> {
        &self.used_undefined
    }

    pub fn into_used_undefined(self) -> IndexSet<String> {
        self.used_undefined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Span;

    fn binding(name: &str) -> Binding {
        Binding {
            name: name.to_string(),
            span: Span::new(0, name.len()),
        }
    }

    #[test]
    fn test_branch_copies_defined_but_not_used() {
        let mut parent = ScopeContext::new();
        parent.define("item");
        parent.use_variable("items");

        let mut child = parent.branch();
        assert!(child.is_defined("item"));
        assert!(child.used_undefined().is_empty());

        child.define("local");
        assert!(!parent.is_defined("local"));

        child.use_variable("other");
        parent.merge_used(child);
        let used: Vec<_> = parent.used_undefined().iter().cloned().collect();
        assert_eq!(used, vec!["items", "other"]);
        assert!(!parent.is_defined("local"));
    }

    #[test]
    fn test_defined_names_are_not_free() {
        let mut scope = ScopeContext::new();
        scope.define("x");
        assert!(!scope.use_variable("x"));
        assert!(scope.use_variable("y"));
        assert!(!scope.used_undefined().contains("x"));
    }

    #[test]
    fn test_rebinding_is_rejected() {
        let mut scope = ScopeContext::new();
        scope.define("item");
        let bindings = [binding("entry"), binding("item")];
        let (kind, offending) = scope.check_bindable(&bindings).unwrap_err();
        assert_eq!(kind, ErrorKind::VariableAlreadyDeclared("item".to_string()));
        assert_eq!(offending.name, "item");
    }
}
