use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid insulin profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid dose event: {0}")]
    InvalidEvent(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
