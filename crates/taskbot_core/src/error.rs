use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("authentication_missing - {0}")]
    AuthenticationMissing(String),
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("remote_error - {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("transport_error - {0}")]
    Transport(String),
    #[error("unresolved_reference - {0}")]
    UnresolvedReference(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl AppError {
    pub fn authentication_missing() -> Self {
        Self::AuthenticationMissing("authentication token is required".to_string())
    }

    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn remote<B: Into<String>>(status: u16, body: B) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    pub fn transport<M: Into<String>>(message: M) -> Self {
        Self::Transport(message.into())
    }

    pub fn unresolved_reference<M: Into<String>>(message: M) -> Self {
        Self::UnresolvedReference(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationMissing(_) => "authentication_missing",
            Self::InvalidInput(_) => "invalid_input",
            Self::Remote { .. } => "remote_error",
            Self::Transport(_) => "transport_error",
            Self::UnresolvedReference(_) => "unresolved_reference",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
        }
    }

    /// The user-facing detail without the code prefix. For remote errors this
    /// is the store's response body, untouched.
    pub fn message(&self) -> &str {
        match self {
            Self::AuthenticationMissing(message)
            | Self::InvalidInput(message)
            | Self::Transport(message)
            | Self::UnresolvedReference(message)
            | Self::InvalidData(message)
            | Self::Io(message) => message,
            Self::Remote { body, .. } => body,
        }
    }

    /// Errors after which an open conversation session is kept alive.
    pub fn preserves_session(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Remote { .. } | Self::Transport(_)
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::InvalidData(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}
