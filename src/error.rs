use thiserror::Error;

pub type IbResult<T> = Result<T, IbError>;

#[derive(Debug, Error)]
pub enum IbError {
    /// Unreadable or malformed input files
    #[error("Input error: {0}")]
    Input(String),

    /// A structural or numerical precondition that fails before stepping starts
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {element} references point {index}, but the structure has {count} points")]
    Index {
        element: String,
        index: usize,
        count: usize,
    },

    /// Non-finite velocity, pressure or force. Terminal for the run.
    #[error("Numerical divergence: {0}")]
    Divergence(String),

    #[error("Post Processor error: {0}")]
    PostProcessor(String),
}
