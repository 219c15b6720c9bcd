//! Renderer configuration.
//!
//! Configuration can be built in code or loaded from YAML:
//!
//! ```rust
//! use viewguard_render::{ErrorDisplay, RendererConfig};
//!
//! let config = RendererConfig::from_yaml(r#"
//! error_view: errors/recursion.jinja
//! error_display: hidden
//! "#).unwrap();
//!
//! assert_eq!(config.error_view, "errors/recursion.jinja");
//! assert_eq!(config.error_display, ErrorDisplay::Hidden);
//! assert!(config.template_dir.is_none());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Template rendered in place of a recursive include, if registered.
pub const DEFAULT_ERROR_VIEW: &str = "recursion_error";

/// How a detected recursion shows up in the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorDisplay {
    /// Render the recursion message (preview environments).
    #[default]
    Verbose,
    /// Render nothing in place of the include (delivery environments).
    Hidden,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Directory templates are loaded from, named `<kind>/<view>.jinja`.
    pub template_dir: Option<PathBuf>,
    /// Name of the template used for recursion errors.
    pub error_view: String,
    pub error_display: ErrorDisplay,
}

impl RendererConfig {
    /// Parses a YAML configuration. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, RenderError> {
        serde_yaml::from_str(yaml).map_err(|e| RenderError::ConfigError(e.to_string()))
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    pub fn with_error_view(mut self, name: impl Into<String>) -> Self {
        self.error_view = name.into();
        self
    }

    pub fn with_error_display(mut self, display: ErrorDisplay) -> Self {
        self.error_display = display;
        self
    }

    /// Checks that the configured template directory exists.
    pub fn validate(&self) -> Result<(), RenderError> {
        if let Some(dir) = &self.template_dir {
            if !dir.exists() {
                return Err(RenderError::ConfigError(format!(
                    "Template directory does not exist: {}",
                    dir.display()
                )));
            }
            if !dir.is_dir() {
                return Err(RenderError::ConfigError(format!(
                    "Path is not a directory: {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            error_view: DEFAULT_ERROR_VIEW.to_string(),
            error_display: ErrorDisplay::Verbose,
        }
    }
}
