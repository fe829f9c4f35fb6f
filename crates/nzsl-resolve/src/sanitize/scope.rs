//! Lexical scope management for the sanitizer.
//!
//! A scope is a name table mapping identifiers to their resolved target;
//! scopes nest in a stack that is pushed around multi-statements, function
//! bodies, loops and scoped statements. Lookup walks from the innermost
//! scope outwards, so shadowing works the usual way.

use indexmap::IndexMap;
use nzsl_ast::ast::IntrinsicType;

/// What a name resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// A declared variable (function parameter, `let`, external var)
    Variable(usize),
    /// A declared function
    Function(usize),
    /// A declared struct
    Struct(usize),
    /// A declared alias
    Alias(usize),
    /// A declared constant
    Constant(usize),
    /// A declared option (also occupying a constant slot for references)
    Option { opt_index: usize, const_index: usize },
    /// A built-in callable
    Intrinsic(IntrinsicType),
}

/// A stack of name tables.
///
/// `IndexMap` keeps registration order deterministic, which keeps renaming
/// and diagnostics stable across runs.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<IndexMap<String, Identifier>>,
}

impl ScopeStack {
    /// A stack with a single (module-level) scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![IndexMap::new()],
        }
    }

    /// Enter a nested scope.
    pub fn enter(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// Leave the innermost scope.
    ///
    /// # Panics
    /// Panics when called on the module-level scope.
    pub fn leave(&mut self) {
        assert!(self.scopes.len() > 1, "cannot leave the module-level scope");
        self.scopes.pop();
    }

    /// Register a name in the innermost scope, shadowing outer entries.
    pub fn register(&mut self, name: impl Into<String>, identifier: Identifier) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.into(), identifier);
    }

    /// Resolve a name, innermost scope first.
    pub fn resolve(&self, name: &str) -> Option<&Identifier> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Whether a name is visible in any scope.
    pub fn is_known(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_resolves_innermost() {
        let mut scopes = ScopeStack::new();
        scopes.register("x", Identifier::Variable(0));

        scopes.enter();
        scopes.register("x", Identifier::Variable(1));
        assert_eq!(scopes.resolve("x"), Some(&Identifier::Variable(1)));

        scopes.leave();
        assert_eq!(scopes.resolve("x"), Some(&Identifier::Variable(0)));
    }

    #[test]
    fn test_unknown_name() {
        let scopes = ScopeStack::new();
        assert!(!scopes.is_known("missing"));
        assert_eq!(scopes.resolve("missing"), None);
    }

    #[test]
    #[should_panic(expected = "module-level scope")]
    fn test_cannot_leave_root_scope() {
        let mut scopes = ScopeStack::new();
        scopes.leave();
    }
}
