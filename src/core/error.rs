//! Error types shared across the library.

use thiserror::Error;

/// All errors surfaced by the library.
///
/// Malformed message input (unparseable headers, broken markup) is never an
/// error: the extractors recover locally and return empty or partial results.
/// These variants cover the genuinely fatal conditions: bad configuration,
/// an unreachable state store, and collaborator transports failing outright.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Mail construction error: {0}")]
    Mail(#[from] lettre::error::Error),

    #[error("Invalid mail address: {0}")]
    MailAddress(#[from] lettre::address::AddressError),

    #[error("WebDriver session error: {0}")]
    WebDriverSession(#[from] fantoccini::error::NewSessionError),

    #[error("WebDriver command error: {0}")]
    WebDriverCmd(#[from] fantoccini::error::CmdError),

    #[error("Mail store error: {0}")]
    MailStore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
