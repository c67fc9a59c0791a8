use thiserror::Error;

/// Main error type for the chat service and client
#[derive(Error, Debug)]
pub enum ChatError {
    // Crypto errors
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Ciphertext could not be decoded: {0}")]
    CryptoDecode(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    // Credential store errors
    #[error("Malformed credential record on line {line}: {content:?}")]
    StorageFormat { line: usize, content: String },

    #[error("Credential storage error: {0}")]
    StorageIo(String),

    // Protocol / network errors
    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ChatError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ChatError::Network(format!("Channel send error: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for ChatError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ChatError::CryptoDecode(format!("UTF-8 decode error: {}", err))
    }
}

impl ChatError {
    /// True for failures that end only the session that hit them
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            ChatError::CryptoDecode(_)
                | ChatError::Protocol(_)
                | ChatError::Network(_)
                | ChatError::ConnectionClosed
                | ChatError::Io(_)
        )
    }
}
