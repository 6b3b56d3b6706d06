use thiserror::Error;

/// Error types for the quiz server
#[derive(Debug, Error)]
pub enum QuizError {
    /// Room and session errors
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Question {0} not found")]
    QuestionNotFound(String),

    #[error("Answer submitted without a room id")]
    RoomIdMissing,

    /// Catalog errors
    #[error("Failed to load questions: {0}")]
    CatalogLoadFailure(String),

    #[error("No questions available")]
    NoQuestions,

    #[error("Invalid question catalog: {0}")]
    InvalidCatalog(String),

    /// Signaling errors
    #[error("Invalid client message: {0}")]
    InvalidMessage(String),

    /// Configuration errors
    #[error("Failed to parse configuration: {0}")]
    ConfigurationParseFailed(String),
}

/// Convenience type alias for Results using QuizError
pub type Result<T> = std::result::Result<T, QuizError>;

impl QuizError {
    /// Helper to create catalog load errors with context
    pub fn catalog_load(msg: impl Into<String>) -> Self {
        QuizError::CatalogLoadFailure(msg.into())
    }

    /// Helper to create catalog validation errors
    pub fn invalid_catalog(msg: impl Into<String>) -> Self {
        QuizError::InvalidCatalog(msg.into())
    }

    /// Text sent to the client when a handler fails. Never carries
    /// internal details such as file paths or answer keys.
    pub fn client_message(&self) -> &'static str {
        match self {
            QuizError::RoomNotFound(_) => "Room not found",
            QuizError::QuestionNotFound(_) => "Question not found",
            QuizError::RoomIdMissing => "Room ID not provided",
            QuizError::CatalogLoadFailure(_) | QuizError::InvalidCatalog(_) => {
                "Error fetching questions from the database"
            }
            QuizError::NoQuestions => "No questions available",
            QuizError::InvalidMessage(_) => "Invalid message",
            QuizError::ConfigurationParseFailed(_) => "Internal server error",
        }
    }
}
