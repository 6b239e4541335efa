#![forbid(unsafe_code)]

use std::rc::Rc;

use indexmap::IndexMap;
use mzdsl_ast::{FunctionDef, Span};
use mzdsl_ir::{TypeSpec, Value};

use crate::operand::Operand;

pub type ScopeId = usize;

#[derive(Clone, Debug)]
pub enum SymbolKind {
    Constant { ty: Option<TypeSpec>, value: Value },
    /// `target` is the program-level name, which differs from the source
    /// name for variables declared inside inlined functions.
    Variable { target: String, ty: TypeSpec },
    Type(TypeSpec),
    Function { def: Rc<FunctionDef>, source: String },
    /// Symbolic binding; `guard_depth` is the number of guards active when it
    /// was created.
    Local { value: Operand, guard_depth: usize },
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub scope: ScopeId,
}

impl Symbol {
    pub fn describe(&self) -> &'static str {
        match self.kind {
            SymbolKind::Constant { .. } => "constant",
            SymbolKind::Variable { .. } => "decision variable",
            SymbolKind::Type(_) => "type",
            SymbolKind::Function { .. } => "function",
            SymbolKind::Local { .. } => "local binding",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    /// One inlined expansion of a function.
    Function { name: String, expansion: usize },
    Block,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    symbols: IndexMap<String, Symbol>,
}

/// Lexical scope chain. Lookup walks block scopes up to the innermost
/// function frame and then falls back to the global scope.
#[derive(Debug)]
pub struct Scopes {
    stack: Vec<Scope>,
    next_id: ScopeId,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            stack: vec![Scope {
                id: 0,
                kind: ScopeKind::Global,
                symbols: IndexMap::new(),
            }],
            next_id: 1,
        }
    }

    pub fn push(&mut self, kind: ScopeKind) -> ScopeId {
        let id = self.next_id;
        self.next_id += 1;
        self.stack.push(Scope {
            id,
            kind,
            symbols: IndexMap::new(),
        });
        id
    }

    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn frame_base(&self) -> usize {
        self.stack
            .iter()
            .rposition(|s| matches!(s.kind, ScopeKind::Function { .. }))
            .unwrap_or(0)
    }

    fn visible(&self) -> impl Iterator<Item = usize> {
        let base = self.frame_base();
        let global = (base != 0).then_some(0);
        (base..self.stack.len()).rev().chain(global)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.visible().find_map(|i| self.stack[i].symbols.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let idx = self.visible().find(|&i| self.stack[i].symbols.contains_key(name))?;
        self.stack[idx].symbols.get_mut(name)
    }

    /// Lookup restricted to the innermost function frame (or the global scope
    /// outside functions).
    pub fn lookup_frame(&self, name: &str) -> Option<&Symbol> {
        let base = self.frame_base();
        self.stack[base..].iter().rev().find_map(|s| s.symbols.get(name))
    }

    /// Binds in the innermost scope, replacing any binding there.
    pub fn define(&mut self, name: &str, kind: SymbolKind, span: Span) {
        let idx = self.stack.len() - 1;
        self.define_at(idx, name, kind, span);
    }

    /// Binds in the innermost function frame, or globally outside functions.
    pub fn define_in_frame(&mut self, name: &str, kind: SymbolKind, span: Span) {
        let idx = self.frame_base();
        self.define_at(idx, name, kind, span);
    }

    pub fn define_global(&mut self, name: &str, kind: SymbolKind, span: Span) {
        self.define_at(0, name, kind, span);
    }

    fn define_at(&mut self, idx: usize, name: &str, kind: SymbolKind, span: Span) {
        let scope = &mut self.stack[idx];
        let sym = Symbol {
            name: name.to_string(),
            kind,
            span,
            scope: scope.id,
        };
        scope.symbols.insert(name.to_string(), sym);
    }

    /// Function expansions on the stack, innermost first.
    pub fn expansions(&self) -> impl Iterator<Item = (&str, usize)> {
        self.stack.iter().rev().filter_map(|s| match &s.kind {
            ScopeKind::Function { name, expansion } => Some((name.as_str(), *expansion)),
            _ => None,
        })
    }
}
