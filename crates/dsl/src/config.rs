//! Project configuration.
//!
//! A project optionally ships a YAML config declaring the allowed
//! speakers, the environment variables scripts may touch, and the
//! markup tags dialogue text may use. Sections that are absent switch
//! the corresponding analysis off entirely; sections that are present
//! but empty stay binding.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed config load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("default for variable '{name}' does not match its declared type {ty}")]
    DefaultTypeMismatch { name: String, ty: VarType },
    #[error("invalid parameter pattern for markup tag '{name}': {source}")]
    BadPattern { name: String, source: regex::Error },
}

/// Declared type of an environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Bool,
    Int,
    Float,
    String,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Bool => write!(f, "bool"),
            VarType::Int => write!(f, "int"),
            VarType::Float => write!(f, "float"),
            VarType::String => write!(f, "string"),
        }
    }
}

/// A typed YAML scalar used as a variable default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    /// Whether this default is usable for a variable of type `ty`.
    /// Integer defaults are fine for float variables.
    fn matches(&self, ty: VarType) -> bool {
        matches!(
            (self, ty),
            (ConfigValue::Bool(_), VarType::Bool)
                | (ConfigValue::Int(_), VarType::Int)
                | (ConfigValue::Int(_), VarType::Float)
                | (ConfigValue::Float(_), VarType::Float)
                | (ConfigValue::String(_), VarType::String)
        )
    }
}

/// One declared environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConfigValue>,
}

/// One declared markup tag. `parameter` is a regex the tag's parameter
/// must fully match; tags without one take no parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkupDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// The `environment:` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<VariableDecl>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<Vec<MarkupDecl>>,
}

/// The whole project config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentConfig>,
}

impl ProjectConfig {
    /// Declared variables, if the config declares any.
    pub fn variables(&self) -> Option<&[VariableDecl]> {
        self.environment.as_ref()?.variables.as_deref()
    }

    /// Declared markup tags, if the config declares any.
    pub fn markup(&self) -> Option<&[MarkupDecl]> {
        self.environment.as_ref()?.markup.as_deref()
    }

    pub fn find_variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables()?.iter().find(|v| v.name == name)
    }

    pub fn find_markup(&self, name: &str) -> Option<&MarkupDecl> {
        self.markup()?.iter().find(|m| m.name == name)
    }

    /// Reject defaults that contradict their declared type and markup
    /// parameter patterns that do not compile.
    pub fn check(&self) -> Result<(), ConfigError> {
        if let Some(variables) = self.variables() {
            for var in variables {
                if let Some(default) = &var.default {
                    if !default.matches(var.ty) {
                        return Err(ConfigError::DefaultTypeMismatch {
                            name: var.name.clone(),
                            ty: var.ty,
                        });
                    }
                }
            }
        }
        if let Some(markup) = self.markup() {
            for decl in markup {
                if let Some(pattern) = &decl.parameter {
                    full_match_regex(pattern).map_err(|source| ConfigError::BadPattern {
                        name: decl.name.clone(),
                        source,
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// Compile a parameter pattern so it must match the whole parameter.
pub fn full_match_regex(pattern: &str) -> Result<regex::Regex, regex::Error> {
    regex::Regex::new(&format!("^(?:{pattern})$"))
}

/// Load and check a config file.
pub fn load_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ProjectConfig =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.check()?;
    Ok(config)
}
