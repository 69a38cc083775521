use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    #[error("Duplicate module '{0}'")]
    DuplicateModule(String),

    #[error("Schema node '{name}' not found under '{parent}'")]
    UnknownNode { parent: String, name: String },

    #[error("Augment target '{0}' could not be resolved")]
    AugmentTarget(String),

    #[error("Identity '{0}' is not defined")]
    UnknownIdentity(String),

    #[error("Invalid value for '{node}': {message}")]
    InvalidValue { node: String, message: String },

    #[error("Invalid JSON encoding at '{path}': {message}")]
    InvalidJson { path: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
