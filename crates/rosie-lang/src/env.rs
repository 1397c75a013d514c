//! Binding environments.
//!
//! Environments form a chain of lexical scopes. Parent scopes are shared
//! `Arc` references and are never mutated through a child; binding always
//! writes the current scope, shadowing any parent entry. Every engine's
//! root scope chains to the shared read-only [`crate::prelude`], and
//! imported packages appear as [`EnvValue::Package`] entries exposing only
//! their exported bindings.

use std::collections::HashMap;
use std::sync::Arc;

use rosie_core::{Diagnostic, Span};
use rosie_peg::Pattern;

use crate::ast::Exp;

/// A compiled pattern binding.
#[derive(Clone, Debug)]
pub struct PatternValue {
    /// The matcher this name stands for when referenced.
    pub pat: Pattern,
    /// The matcher without its outer capture, when `pat` carries one.
    /// Re-capture wraps this twin instead of nesting captures.
    pub uncaptured: Option<Pattern>,
    /// Alias bindings produce no capture node.
    pub alias: bool,
}

/// A macro: a pure AST-to-AST expansion, run before compilation.
pub type MacroOp = fn(&[Exp], Span) -> Result<Exp, Diagnostic>;

/// A pfunction: builds a matcher directly from its arguments.
pub type PrimOp = fn(&[Exp], Span) -> Result<Pattern, Diagnostic>;

/// What a name can be bound to.
#[derive(Clone)]
pub enum EnvValue {
    Pattern(PatternValue),
    Macro(MacroOp),
    PFunction(PrimOp),
    Package(Arc<Environment>),
}

impl std::fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvValue::Pattern(v) => f.debug_tuple("Pattern").field(v).finish(),
            EnvValue::Macro(_) => f.write_str("Macro"),
            EnvValue::PFunction(_) => f.write_str("PFunction"),
            EnvValue::Package(_) => f.write_str("Package"),
        }
    }
}

/// One entry in a scope.
#[derive(Clone, Debug)]
pub struct Entry {
    pub value: EnvValue,
    /// Exported entries are visible through a package prefix; internal
    /// ones (grammar forward refs, prelude plumbing) are not.
    pub exported: bool,
}

/// Attempt to bind into a read-only scope.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ReadOnlyScope;

impl std::fmt::Display for ReadOnlyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot bind into a read-only scope")
    }
}

impl std::error::Error for ReadOnlyScope {}

/// A lexical scope, chained to an optional parent.
#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<Arc<Environment>>,
    bindings: HashMap<String, Entry>,
    read_only: bool,
}

impl Environment {
    /// A fresh root scope with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh scope chained to `parent`.
    pub fn extend(parent: Arc<Environment>) -> Self {
        Self {
            parent: Some(parent),
            bindings: HashMap::new(),
            read_only: false,
        }
    }

    /// Freeze this scope; further binds are rejected. Used by the prelude.
    pub fn freeze(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Bind `name` in this scope, shadowing any parent binding.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        value: EnvValue,
        exported: bool,
    ) -> Result<(), ReadOnlyScope> {
        if self.read_only {
            return Err(ReadOnlyScope);
        }
        self.bindings.insert(name.into(), Entry { value, exported });
        Ok(())
    }

    /// Look up an unqualified name, walking the scope chain.
    pub fn lookup(&self, name: &str) -> Option<&EnvValue> {
        match self.bindings.get(name) {
            Some(entry) => Some(&entry.value),
            None => self.parent.as_deref()?.lookup(name),
        }
    }

    /// Look up `package.name`: resolve the package prefix first, then the
    /// name inside it. Only exported entries are visible from outside.
    pub fn lookup_qualified(&self, package: &str, name: &str) -> Option<&EnvValue> {
        match self.lookup(package)? {
            EnvValue::Package(env) => {
                let entry = env.bindings.get(name)?;
                entry.exported.then_some(&entry.value)
            }
            _ => None,
        }
    }

    /// All names visible from this scope, child entries shadowing parents.
    pub fn flatten(&self) -> HashMap<String, EnvValue> {
        let mut out = match &self.parent {
            Some(parent) => parent.flatten(),
            None => HashMap::new(),
        };
        for (name, entry) in &self.bindings {
            out.insert(name.clone(), entry.value.clone());
        }
        out
    }
}
