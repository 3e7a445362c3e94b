//! Compile options, loadable from YAML.

use crate::errors::HqlError;
use crate::macros::MAX_EXPANSION_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Module format the generated code should target. Passed through to code
/// generators untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDialect {
    #[default]
    Esm,
    CommonJs,
}

impl std::str::FromStr for TargetDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "esm" => Ok(Self::Esm),
            "commonjs" | "cjs" => Ok(Self::CommonJs),
            other => Err(format!("unknown target '{}', expected esm or commonjs", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    pub max_expansion_depth: usize,
    pub target: TargetDialect,
    /// Extra globals `fx` functions may reference.
    pub pure_builtins: Vec<String>,
    pub trace_expansion: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_expansion_depth: MAX_EXPANSION_DEPTH,
            target: TargetDialect::default(),
            pure_builtins: Vec::new(),
            trace_expansion: false,
        }
    }
}

impl CompileOptions {
    pub fn from_yaml(text: &str) -> Result<Self, HqlError> {
        let options: Self = serde_yaml::from_str(text).map_err(|e| HqlError::Config {
            message: e.to_string(),
        })?;
        if options.max_expansion_depth == 0 {
            return Err(HqlError::Config {
                message: "max_expansion_depth must be at least 1".to_string(),
            });
        }
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self, HqlError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HqlError::io(path.display().to_string(), &e))?;
        Self::from_yaml(&text)
    }
}
