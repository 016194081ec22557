use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Container '{0}' not found")]
    ContainerNotFound(String),
    #[error("Container '{0}' has no content")]
    ContainerEmpty(String),
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
    #[error("Unresolved placeholder '@{keyword}' in '{leaf}'")]
    UnresolvedPlaceholder { keyword: String, leaf: String },
    #[error("Cannot parse comparison operand '{0}' as a number")]
    BadOperand(String),
    #[error("Type mismatch")]
    TypeMismatch,
    #[error("Unsupported source kind '{0}'")]
    UnsupportedSource(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
