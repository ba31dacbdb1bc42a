use thiserror::Error;

#[derive(Debug, Error)]
pub enum JunitTraceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, JunitTraceError>;
