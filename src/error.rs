//! Error types for mountck

use std::fmt;
use std::path::PathBuf;

/// Error codes for structured error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: File not found
    FileNotFound = 1,
    /// E002: Gadget description could not be parsed
    InvalidFormat = 2,
    /// E003: Gadget or tool contract violated (e.g. volume count)
    PreconditionFailed = 3,
    /// E004: IO error
    IoError = 4,
    /// E005: External tool could not be run
    ExternalToolFailed = 5,
    /// E006: Tool output could not be interpreted
    ParseError = 6,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::FileNotFound => write!(f, "E001"),
            ErrorCode::InvalidFormat => write!(f, "E002"),
            ErrorCode::PreconditionFailed => write!(f, "E003"),
            ErrorCode::IoError => write!(f, "E004"),
            ErrorCode::ExternalToolFailed => write!(f, "E005"),
            ErrorCode::ParseError => write!(f, "E006"),
        }
    }
}

/// Main error type for mountck
///
/// A `MountckError` is fatal for the run. Expected failures
/// (a partition that does not mount, a wrong label) are recorded as
/// [`crate::verify::MountOutcome`]s instead.
#[derive(Debug)]
pub struct MountckError {
    pub code: ErrorCode,
    pub message: String,
    pub path: Option<PathBuf>,
}

impl MountckError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(ErrorCode::FileNotFound, format!("File not found: {}", path.display()))
            .with_path(path)
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFormat, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PreconditionFailed, message)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    pub fn external_tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalToolFailed,
            format!("{} failed: {}", tool.into(), message.into()),
        )
    }
}

impl fmt::Display for MountckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref path) = self.path {
            write!(f, " ({})", path.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for MountckError {}

impl From<std::io::Error> for MountckError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorCode::IoError, err.to_string())
    }
}

impl From<serde_yaml::Error> for MountckError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::invalid_format(format!("Invalid gadget description: {}", err))
    }
}
