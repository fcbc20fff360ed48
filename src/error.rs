use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(caldesk::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(caldesk::config))]
    Config(String),

    #[error("Authentication error: {0}")]
    #[diagnostic(code(caldesk::auth))]
    Auth(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(caldesk::google_calendar))]
    GoogleCalendar(String),

    #[error("Token storage error: {0}")]
    #[diagnostic(code(caldesk::token_store))]
    Storage(String),

    #[error("Window error: {0}")]
    #[diagnostic(code(caldesk::window))]
    Window(String),

    #[error("Notification error: {0}")]
    #[diagnostic(code(caldesk::notification))]
    Notification(String),

    #[error(transparent)]
    #[diagnostic(code(caldesk::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(caldesk::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(caldesk::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Other(format!("Invalid URL: {}", err))
    }
}

/// Type alias for Result with our Error type
pub type WidgetResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(message: &str) -> Error {
    Error::Environment(message.to_string())
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create authentication errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create token storage errors
pub fn storage_error(message: &str) -> Error {
    Error::Storage(message.to_string())
}

/// Helper to create window errors
pub fn window_error(message: &str) -> Error {
    Error::Window(message.to_string())
}

/// Helper to create notification errors
pub fn notification_error(message: &str) -> Error {
    Error::Notification(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
