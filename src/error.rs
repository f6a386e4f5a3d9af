use thiserror::Error;

/// All errors produced by the conversation core.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// An orchestration contract was broken (e.g. a second streaming message).
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("message text is empty")]
    EmptyInput,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("conversation session has shut down")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
