#![forbid(unsafe_code)]

//! Translates the constraint-modeling DSL into MiniZinc text.
//!
//! ```text
//! source -> mzdsl_parse::parse_module -> mzdsl_core::lower_module -> mzdsl_backend_mzn::emit_program
//! ```

pub mod config;

use std::fmt;

use tracing::info_span;

pub use config::{ConfigError, TranslatorConfig};
pub use mzdsl_core::{ErrorKind, IndexBase, LowerConfig, TranslationError};
pub use mzdsl_ir::{DeclKind, Goal, Program};

/// Serialized target program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramText(String);

impl ProgramText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProgramText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Translates `source` with the default configuration.
pub fn translate(source: &str) -> Result<ProgramText, TranslationError> {
    translate_with_config(source, &TranslatorConfig::default())
}

pub fn translate_with_config(source: &str, config: &TranslatorConfig) -> Result<ProgramText, TranslationError> {
    let program = lower(source, config)?;
    let _span = info_span!("translate.emit").entered();
    Ok(ProgramText(mzdsl_backend_mzn::emit_program(&program)))
}

/// Parses and lowers `source` without serializing it.
pub fn lower(source: &str, config: &TranslatorConfig) -> Result<Program, TranslationError> {
    let module = {
        let _span = info_span!("translate.parse", bytes = source.len()).entered();
        mzdsl_parse::parse_module(source).map_err(|e| TranslationError::new(ErrorKind::Syntax, e.message, e.span))?
    };
    mzdsl_core::lower_module(&module, source, &config.to_lower_config())
}
