#![forbid(unsafe_code)]

use mzdsl_ast::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwDef,
    KwReturn,
    KwIf,
    KwElif,
    KwElse,
    KwFor,
    KwIn,
    KwAssert,
    KwAnd,
    KwOr,
    KwNot,
    KwTrue,
    KwFalse,
    KwPass,
    KwWhile,

    // Operators / punctuation
    Arrow,
    Colon,
    Semicolon,
    Eq,
    EqEq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,

    PlusEq,
    MinusEq,
    StarEq,

    Dot,
    Comma,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Newline,
    Indent,
    Dedent,
    Eof,

    // Literals / identifiers
    Ident(String),
    Int(u64),
    Float(f64),
    String(String),
}

impl TokenKind {
    /// Human-readable spelling used in parse diagnostics.
    pub fn describe(&self) -> String {
        let s = match self {
            TokenKind::KwDef => "`def`",
            TokenKind::KwReturn => "`return`",
            TokenKind::KwIf => "`if`",
            TokenKind::KwElif => "`elif`",
            TokenKind::KwElse => "`else`",
            TokenKind::KwFor => "`for`",
            TokenKind::KwIn => "`in`",
            TokenKind::KwAssert => "`assert`",
            TokenKind::KwAnd => "`and`",
            TokenKind::KwOr => "`or`",
            TokenKind::KwNot => "`not`",
            TokenKind::KwTrue => "`True`",
            TokenKind::KwFalse => "`False`",
            TokenKind::KwPass => "`pass`",
            TokenKind::KwWhile => "`while`",
            TokenKind::Arrow => "`->`",
            TokenKind::Colon => "`:`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Eq => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::Neq => "`!=`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::Le => "`<=`",
            TokenKind::Ge => "`>=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::StarStar => "`**`",
            TokenKind::Slash => "`/`",
            TokenKind::SlashSlash => "`//`",
            TokenKind::Percent => "`%`",
            TokenKind::PlusEq => "`+=`",
            TokenKind::MinusEq => "`-=`",
            TokenKind::StarEq => "`*=`",
            TokenKind::Dot => "`.`",
            TokenKind::Comma => "`,`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Newline => "end of line",
            TokenKind::Indent => "indented block",
            TokenKind::Dedent => "end of block",
            TokenKind::Eof => "end of input",
            TokenKind::Ident(name) => return format!("identifier `{name}`"),
            TokenKind::Int(n) => return format!("integer `{n}`"),
            TokenKind::Float(x) => return format!("float `{x}`"),
            TokenKind::String(_) => "string literal",
        };
        s.to_string()
    }
}
