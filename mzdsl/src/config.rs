#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use mzdsl_core::{IndexBase, LowerConfig};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "mzdsl.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("config error: {message}")]
#[diagnostic(code(mzdsl::config))]
pub struct ConfigError {
    pub message: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBaseSetting {
    #[default]
    One,
    Zero,
}

impl From<IndexBaseSetting> for IndexBase {
    fn from(setting: IndexBaseSetting) -> Self {
        match setting {
            IndexBaseSetting::One => IndexBase::One,
            IndexBaseSetting::Zero => IndexBase::Zero,
        }
    }
}

/// Translator options, as read from `mzdsl.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslatorConfig {
    pub index_base: IndexBaseSetting,
    pub native_aggregates: bool,
    pub max_unrolled_statements: usize,
    pub objective_name: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        let lower = LowerConfig::default();
        Self {
            index_base: IndexBaseSetting::One,
            native_aggregates: lower.native_aggregates,
            max_unrolled_statements: lower.max_unrolled_statements,
            objective_name: lower.objective_name,
        }
    }
}

impl TranslatorConfig {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError {
            message: format!("invalid configuration: {e}"),
        })
    }

    pub fn to_lower_config(&self) -> LowerConfig {
        LowerConfig {
            index_base: self.index_base.into(),
            native_aggregates: self.native_aggregates,
            max_unrolled_statements: self.max_unrolled_statements,
            objective_name: self.objective_name.clone(),
        }
    }
}

/// `mzdsl.toml` next to `input`, if there is one.
pub fn find_config(input: &Path) -> Option<PathBuf> {
    let dir = if input.is_dir() { input } else { input.parent()? };
    let candidate = if dir.as_os_str().is_empty() {
        PathBuf::from(CONFIG_FILE)
    } else {
        dir.join(CONFIG_FILE)
    };
    candidate.exists().then_some(candidate)
}

pub fn load_config(path: &Path) -> Result<TranslatorConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    TranslatorConfig::from_toml(&raw).map_err(|e| ConfigError {
        message: format!("{}: {}", path.display(), e.message),
    })
}
