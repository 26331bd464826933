//! Transport errors and their HTTP status mapping.

use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cron(#[from] cadence_cron::Error),

    /// Nothing is listening at the address. Callers may start a scheduler.
    #[error("scheduler unreachable at {address}")]
    Unreachable { address: String },

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("missing query parameter: {name}")]
    MissingParam { name: &'static str },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

impl Error {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Cron(e) => e.is_not_found(),
            Self::Status { status, .. } => *status == StatusCode::NOT_FOUND.as_u16(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::Cron(e) => e.is_invalid_input(),
            Self::MissingParam { .. } => true,
            Self::Status { status, .. } => *status == StatusCode::BAD_REQUEST.as_u16(),
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Cron(cadence_cron::Error::Unsupported { .. }) => StatusCode::NOT_IMPLEMENTED,
            Self::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            },
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            e if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
