//! Error types for the Toast gateway

use thiserror::Error;

/// Result type alias for Toast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Toast gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Persona store query or transport error
    #[error("persona store error: {0}")]
    PersonaStore(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Live session error
    #[error("session error: {0}")]
    Session(String),

    /// Room or access token error
    #[error("token error: {0}")]
    Token(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// JWT encoding error
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}
