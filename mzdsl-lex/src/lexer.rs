#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use logos::Logos;
use miette::Diagnostic;
use mzdsl_ast::{Span, span_between};
use thiserror::Error;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(mzdsl::lex))]
#[allow(unused_assignments)]
pub struct LexError {
    pub message: String,
    #[label]
    pub span: Span,
}

impl LexError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Lexemes of one physical line. Malformed literals hold `None`.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r]+")]
enum Lexeme {
    #[token("def", |_| TokenKind::KwDef)]
    #[token("return", |_| TokenKind::KwReturn)]
    #[token("if", |_| TokenKind::KwIf)]
    #[token("elif", |_| TokenKind::KwElif)]
    #[token("else", |_| TokenKind::KwElse)]
    #[token("for", |_| TokenKind::KwFor)]
    #[token("in", |_| TokenKind::KwIn)]
    #[token("assert", |_| TokenKind::KwAssert)]
    #[token("and", |_| TokenKind::KwAnd)]
    #[token("or", |_| TokenKind::KwOr)]
    #[token("not", |_| TokenKind::KwNot)]
    #[token("True", |_| TokenKind::KwTrue)]
    #[token("False", |_| TokenKind::KwFalse)]
    #[token("pass", |_| TokenKind::KwPass)]
    #[token("while", |_| TokenKind::KwWhile)]
    #[token("->", |_| TokenKind::Arrow)]
    #[token("==", |_| TokenKind::EqEq)]
    #[token("!=", |_| TokenKind::Neq)]
    #[token("<=", |_| TokenKind::Le)]
    #[token(">=", |_| TokenKind::Ge)]
    #[token("<", |_| TokenKind::Lt)]
    #[token(">", |_| TokenKind::Gt)]
    #[token("+=", |_| TokenKind::PlusEq)]
    #[token("-=", |_| TokenKind::MinusEq)]
    #[token("*=", |_| TokenKind::StarEq)]
    #[token("+", |_| TokenKind::Plus)]
    #[token("-", |_| TokenKind::Minus)]
    #[token("**", |_| TokenKind::StarStar)]
    #[token("*", |_| TokenKind::Star)]
    #[token("//", |_| TokenKind::SlashSlash)]
    #[token("/", |_| TokenKind::Slash)]
    #[token("%", |_| TokenKind::Percent)]
    #[token(".", |_| TokenKind::Dot)]
    #[token(":", |_| TokenKind::Colon)]
    #[token(";", |_| TokenKind::Semicolon)]
    #[token("=", |_| TokenKind::Eq)]
    #[token(",", |_| TokenKind::Comma)]
    #[token("(", |_| TokenKind::LParen)]
    #[token(")", |_| TokenKind::RParen)]
    #[token("{", |_| TokenKind::LBrace)]
    #[token("}", |_| TokenKind::RBrace)]
    #[token("[", |_| TokenKind::LBracket)]
    #[token("]", |_| TokenKind::RBracket)]
    Fixed(TokenKind),

    #[regex(r"[0-9][0-9_]*", |lex| int_literal(lex.slice()))]
    Int(Option<u64>),

    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?", |lex| float_literal(lex.slice()))]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", |lex| float_literal(lex.slice()))]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", |lex| float_literal(lex.slice()))]
    Float(Option<f64>),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| string_literal(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| string_literal(lex.slice()))]
    Str(Option<String>),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Lexeme {
    fn into_kind(self, span: Span) -> Result<TokenKind, LexError> {
        match self {
            Lexeme::Fixed(kind) => Ok(kind),
            Lexeme::Ident(name) => Ok(TokenKind::Ident(name)),
            Lexeme::Int(Some(n)) => Ok(TokenKind::Int(n)),
            Lexeme::Float(Some(x)) => Ok(TokenKind::Float(x)),
            Lexeme::Str(Some(s)) => Ok(TokenKind::String(s)),
            Lexeme::Int(None) => Err(LexError::new("invalid integer literal", span)),
            Lexeme::Float(None) => Err(LexError::new("invalid float literal", span)),
            Lexeme::Str(None) => Err(LexError::new("invalid string literal", span)),
        }
    }
}

/// Digit separators may only sit between digits.
fn well_separated(s: &str) -> bool {
    let b = s.as_bytes();
    b.iter().enumerate().all(|(i, c)| {
        *c != b'_'
            || (i > 0 && b[i - 1].is_ascii_digit() && b.get(i + 1).is_some_and(u8::is_ascii_digit))
    })
}

fn int_literal(s: &str) -> Option<u64> {
    if !well_separated(s) {
        return None;
    }
    s.replace('_', "").parse().ok()
}

fn float_literal(s: &str) -> Option<f64> {
    if !well_separated(s) {
        return None;
    }
    s.replace('_', "").parse().ok()
}

fn string_literal(quoted: &str) -> Option<String> {
    let body = quoted.get(1..quoted.len().saturating_sub(1))?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            c @ ('"' | '\'' | '\\') => c,
            _ => return None,
        });
    }
    Some(out)
}

/// Strips a trailing `#` comment, ignoring `#` inside string literals.
fn strip_comment(code: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in code.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return &code[..i],
            None => {}
        }
    }
    code
}

/// Indentation stack plus the open brackets that suspend it.
struct Layout {
    indents: Vec<usize>,
    brackets: Vec<Span>,
}

impl Layout {
    fn new() -> Self {
        Self {
            indents: vec![0],
            brackets: Vec::new(),
        }
    }

    fn joining(&self) -> bool {
        !self.brackets.is_empty()
    }

    /// Emits the `Indent`/`Dedent` tokens that open a logical line indented
    /// by `width` columns.
    fn open_line(&mut self, width: usize, at: Span, line: Span, out: &mut Vec<Token>) -> Result<(), LexError> {
        let top = self.indents.last().copied().unwrap_or(0);
        if width > top {
            self.indents.push(width);
            out.push(Token { kind: TokenKind::Indent, span: at });
            return Ok(());
        }
        while self.indents.last().is_some_and(|&top| width < top) {
            self.indents.pop();
            out.push(Token { kind: TokenKind::Dedent, span: at });
        }
        if self.indents.last() != Some(&width) {
            return Err(LexError::new("inconsistent indentation", line));
        }
        Ok(())
    }

    fn track(&mut self, kind: &TokenKind, span: Span) -> Result<(), LexError> {
        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.brackets.push(span),
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                if self.brackets.pop().is_none() {
                    return Err(LexError::new("unmatched closing bracket", span));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self, end: usize, out: &mut Vec<Token>) -> Result<(), LexError> {
        if let Some(open) = self.brackets.first() {
            return Err(LexError::new("unclosed bracket", *open));
        }
        let eof = span_between(end, end);
        for _ in 1..self.indents.len() {
            out.push(Token { kind: TokenKind::Dedent, span: eof });
        }
        out.push(Token { kind: TokenKind::Eof, span: eof });
        Ok(())
    }
}

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    /// Tokenizes the whole source. Blank and comment-only lines produce no
    /// tokens; a line ends with `Newline` unless a bracket is still open.
    pub fn lex(&self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut layout = Layout::new();
        let mut offset = 0usize;

        for line in self.src.split_inclusive('\n') {
            let start = offset;
            offset += line.len();
            let text = line.strip_suffix('\n').unwrap_or(line);
            let code_start = text.len() - text.trim_start_matches([' ', '\t']).len();
            let code = strip_comment(&text[code_start..]);
            if code.trim().is_empty() {
                continue;
            }

            if !layout.joining() {
                let at = span_between(start, start + code_start);
                if text[..code_start].contains('\t') {
                    return Err(LexError::new("tabs are not allowed in indentation; use spaces", at));
                }
                layout.open_line(code_start, at, span_between(start, offset), &mut tokens)?;
            }

            let base = start + code_start;
            let mut lexemes = Lexeme::lexer(code);
            while let Some(lexeme) = lexemes.next() {
                let range = lexemes.span();
                let span = span_between(base + range.start, base + range.end);
                let kind = match lexeme {
                    Ok(lexeme) => lexeme.into_kind(span)?,
                    Err(()) => {
                        return Err(LexError::new(
                            format!("unexpected character `{}`", lexemes.slice()),
                            span,
                        ));
                    }
                };
                layout.track(&kind, span)?;
                tokens.push(Token { kind, span });
            }

            if !layout.joining() {
                tokens.push(Token {
                    kind: TokenKind::Newline,
                    span: span_between(offset, offset),
                });
            }
        }

        layout.finish(self.src.len(), &mut tokens)?;
        Ok(tokens)
    }
}
