use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// `render` was called with an empty template.
    #[error("template required")]
    MissingTemplate,

    /// The generated routine source could not be turned into a routine.
    #[error("Compilation failed: {0}")]
    Compile(String),

    /// The compiled routine failed while producing output.
    #[error("Render failed: {0}")]
    Render(String),

    #[error("Plugin '{0}' is not installed on this engine.")]
    PluginNotInstalled(&'static str),

    #[error("IO error: {0}.")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON. Original error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML. Original error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}.")]
    ConfigValidation(String),

    #[error("No configuration file found in '{dir}'. Tried: {config_files}.")]
    ConfigNotFound { dir: String, config_files: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience type alias for Results with [`Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while parsing or evaluating routine source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("SyntaxError: {message} (line {line})")]
    Syntax { line: usize, message: String },

    #[error("{0}")]
    Runtime(String),

    /// A fragment or layout lookup failed.
    #[error("{0}")]
    NotFound(String),

    /// Nested inclusion went past the depth limit.
    #[error("{0}")]
    DepthExceeded(String),
}

impl ScriptError {
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        ScriptError::Runtime(message.into())
    }

    /// Protocol errors must propagate even through code that otherwise
    /// swallows failures.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ScriptError::NotFound(_) | ScriptError::DepthExceeded(_))
    }
}

/// Prints the error and exits the program with the failure status code.
///
/// # Arguments
/// * `err` - The error to report
pub fn default_error_handler(err: Error) -> ! {
    eprintln!("{err}");
    std::process::exit(crate::constants::exit_codes::FAILURE);
}
