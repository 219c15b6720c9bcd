//! Error types for view rendering.
//!
//! [`RenderError`] is the error type of every fallible operation in this
//! crate. It hides MiniJinja's error type behind a stable set of variants.
//!
//! A detected recursion is not a `RenderError`: it is rendered in place and
//! reported through [`viewguard::Rendered::Recursion`].

use thiserror::Error;

/// Error type for view rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template syntax error or evaluation failure.
    #[error("template error: {0}")]
    TemplateError(String),

    /// No template registered or on disk for the requested name.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The content source has no bean with this id.
    #[error("bean not found: {0}")]
    BeanNotFound(String),

    /// Data (de)serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// I/O error while writing to an output channel or reading templates.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid renderer configuration.
    #[error("config error: {0}")]
    ConfigError(String),

    /// Other operational error.
    #[error("{0}")]
    OperationError(String),
}

impl From<std::fmt::Error> for RenderError {
    fn from(err: std::fmt::Error) -> Self {
        RenderError::OperationError(format!("formatting failed: {}", err))
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for RenderError {
    fn from(err: serde_yaml::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<quick_xml::Error> for RenderError {
    fn from(err: quick_xml::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        // Errors raised by a nested include travel through MiniJinja as the
        // source of the template error; surface them as they were raised.
        if let Some(nested) = std::error::Error::source(&err)
            .and_then(|source| source.downcast_ref::<RenderError>())
        {
            return nested.resurface();
        }

        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(err.to_string()),
            ErrorKind::SyntaxError
            | ErrorKind::BadEscape
            | ErrorKind::UndefinedError
            | ErrorKind::UnknownTest
            | ErrorKind::UnknownFunction
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownMethod
            | ErrorKind::MissingArgument
            | ErrorKind::TooManyArguments => RenderError::TemplateError(err.to_string()),
            ErrorKind::BadSerialization => RenderError::SerializationError(err.to_string()),
            _ => RenderError::OperationError(err.to_string()),
        }
    }
}

impl RenderError {
    /// Wraps this error so it can be returned from a MiniJinja callback.
    pub(crate) fn into_template_error(self) -> minijinja::Error {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, self.to_string())
            .with_source(self)
    }

    /// Copies an error raised below a MiniJinja callback.
    ///
    /// An [`io::Error`](std::io::Error) cannot be cloned: the copy keeps its
    /// kind and message but not its inner source.
    fn resurface(&self) -> RenderError {
        match self {
            RenderError::TemplateError(msg) => RenderError::TemplateError(msg.clone()),
            RenderError::TemplateNotFound(name) => RenderError::TemplateNotFound(name.clone()),
            RenderError::BeanNotFound(id) => RenderError::BeanNotFound(id.clone()),
            RenderError::SerializationError(msg) => RenderError::SerializationError(msg.clone()),
            RenderError::IoError(err) => {
                RenderError::IoError(std::io::Error::new(err.kind(), err.to_string()))
            }
            RenderError::ConfigError(msg) => RenderError::ConfigError(msg.clone()),
            RenderError::OperationError(msg) => RenderError::OperationError(msg.clone()),
        }
    }
}
