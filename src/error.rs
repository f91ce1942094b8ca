#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Credentials file not found: {}", .0.display())]
    NotFoundError(std::path::PathBuf),

    #[error("Malformed credentials file at line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("Authentication failed ({code}): {message}")]
    AuthError { code: String, message: String },

    #[error("Request throttled ({0})")]
    ThrottleError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API Error ({status}, {code}): {message}")]
    ApiError {
        status: reqwest::StatusCode,
        code: String,
        message: String,
    },

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Fieldless discriminant of [`Error`], for callers branching on failure class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Config,
    NotFound,
    Parse,
    Auth,
    Throttle,
    Network,
    Api,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::ConfigError(_) => ErrorKind::Config,
            Self::NotFoundError(_) => ErrorKind::NotFound,
            Self::ParseError { .. } => ErrorKind::Parse,
            Self::AuthError { .. } => ErrorKind::Auth,
            Self::ThrottleError(_) => ErrorKind::Throttle,
            Self::NetworkError(_) => ErrorKind::Network,
            Self::ApiError { .. } => ErrorKind::Api,
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// Whether a remote call failing with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ThrottleError(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkError(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kind() {
        let e = Error::AuthError {
            code: "AccessDenied".to_string(),
            message: "MultiFactorAuthentication failed with invalid MFA one time pass code."
                .to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::Auth);
        assert!(!e.is_retryable());

        let e = Error::ThrottleError("Rate exceeded".to_string());
        assert_eq!(e.kind(), ErrorKind::Throttle);
        assert!(e.is_retryable());
    }

    #[test]
    fn test_io_error_from() {
        let e: Error = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(e.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_display() {
        let e = Error::ParseError {
            line: 3,
            reason: "unterminated section header".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Malformed credentials file at line 3: unterminated section header"
        );
    }
}
