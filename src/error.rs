use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShowdownError>;

#[derive(Error, Debug)]
pub enum ShowdownError {
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Target error: {0}")]
    Target(#[from] crate::targets::TargetError),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShowdownError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}
