use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures caught locally, before any request leaves the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text is empty")]
    EmptyMessage,
    #[error("No conversation is open")]
    NoActiveThread,
    #[error("This conversation cannot receive messages from your account")]
    UnsupportedThread,
    #[error("Please select a mental health professional.")]
    MissingProfessional,
    #[error("Please select a date.")]
    MissingDate,
    #[error("Please select an available time slot.")]
    MissingSlot,
    #[error("The {0} slot is already booked")]
    SlotBooked(String),
    #[error("A booking request is already in flight")]
    SubmitInFlight,
    #[error("Please enter all 6 digits (got {got})")]
    OtpLength { got: usize },
    #[error("The verification code may only contain digits")]
    OtpNonDigit,
    #[error("Please enter both email and password")]
    MissingCredentials,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("{0}")]
    WeakPassword(&'static str),
    #[error("Administrator accounts cannot be registered from the client")]
    AdminRegistration,
    #[error("Administrator accounts have no profile page")]
    NoProfile,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Error connecting to server: {0}")]
    Transport(String),
    #[error("{message} (HTTP {status})")]
    Backend { status: u16, message: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// The message shown inline next to the panel that failed.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Backend { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_backend_rejection(&self) -> bool {
        matches!(self, ClientError::Backend { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(err: rusqlite::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(err.to_string())
    }
}
