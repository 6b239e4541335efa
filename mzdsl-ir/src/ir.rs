#![forbid(unsafe_code)]

use indexmap::IndexMap;
use mzdsl_ast::Span;

use crate::types::TypeSpec;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    TypeAlias,
    Constant,
    Variable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub ty: TypeSpec,
    pub value: Option<Value>,
    pub span: Span,
}

impl Declaration {
    /// Same name, kind, type and value; spans are ignored.
    pub fn same_as(&self, other: &Declaration) -> bool {
        self.name == other.name && self.kind == other.kind && self.ty == other.ty && self.value == other.value
    }
}

/// A rendered boolean body, optionally under a conjunction of guards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub guards: Vec<String>,
    pub body: String,
}

impl Constraint {
    pub fn unconditional(body: impl Into<String>) -> Self {
        Self {
            guards: Vec::new(),
            body: body.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Goal {
    Satisfy,
    Minimize(String),
    Maximize(String),
}

#[derive(Debug)]
pub enum Declared {
    New,
    /// An identical declaration already existed.
    Unchanged,
}

/// The flat translation result: declarations and constraints in emission
/// order, plus the solve goal.
#[derive(Clone, Debug)]
pub struct Program {
    pub declarations: IndexMap<String, Declaration>,
    pub constraints: Vec<Constraint>,
    pub goal: Goal,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Self {
            declarations: IndexMap::new(),
            constraints: Vec::new(),
            goal: Goal::Satisfy,
        }
    }

    /// Registers `decl` once per name. A conflicting earlier declaration is
    /// returned as the error.
    pub fn declare(&mut self, decl: Declaration) -> Result<Declared, &Declaration> {
        if self.declarations.contains_key(&decl.name) {
            let existing = &self.declarations[&decl.name];
            if existing.same_as(&decl) {
                return Ok(Declared::Unchanged);
            }
            return Err(existing);
        }
        self.declarations.insert(decl.name.clone(), decl);
        Ok(Declared::New)
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn constrain(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn count(&self, kind: DeclKind) -> usize {
        self.declarations.values().filter(|d| d.kind == kind).count()
    }
}
