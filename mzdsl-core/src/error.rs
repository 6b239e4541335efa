#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::fmt;

use miette::Diagnostic;
use mzdsl_ast::Span;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    UnknownSymbol,
    Redeclaration,
    UnresolvedBound,
    TypeMismatch,
    Recursion,
    /// A construct the translator recognizes but does not lower.
    Unsupported,
    /// Constant folding failed (division by zero, overflow).
    Arithmetic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::UnknownSymbol => "unknown symbol",
            ErrorKind::Redeclaration => "redeclaration",
            ErrorKind::UnresolvedBound => "unresolved bound",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::Recursion => "recursion",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Arithmetic => "arithmetic error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{kind}: {message}")]
#[diagnostic(code(mzdsl::translate))]
#[allow(unused_assignments)]
pub struct TranslationError {
    pub kind: ErrorKind,
    pub message: String,
    #[label]
    pub span: Span,
    /// Innermost call first, when the error surfaced inside inlined functions.
    #[label(collection, "called from here")]
    pub call_sites: Vec<Span>,
}

impl TranslationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            call_sites: Vec::new(),
        }
    }

    pub fn with_call_site(mut self, span: Span) -> Self {
        self.call_sites.push(span);
        self
    }
}

pub(crate) fn unknown(message: impl Into<String>, span: Span) -> TranslationError {
    TranslationError::new(ErrorKind::UnknownSymbol, message, span)
}

pub(crate) fn mismatch(message: impl Into<String>, span: Span) -> TranslationError {
    TranslationError::new(ErrorKind::TypeMismatch, message, span)
}

pub(crate) fn unresolved(message: impl Into<String>, span: Span) -> TranslationError {
    TranslationError::new(ErrorKind::UnresolvedBound, message, span)
}

pub(crate) fn unsupported(message: impl Into<String>, span: Span) -> TranslationError {
    TranslationError::new(ErrorKind::Unsupported, message, span)
}

pub(crate) fn redeclared(message: impl Into<String>, span: Span) -> TranslationError {
    TranslationError::new(ErrorKind::Redeclaration, message, span)
}
