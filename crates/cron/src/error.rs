use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),

    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("malformed encoding: {reason}")]
    Malformed { reason: String },

    #[error("invalid job: {reason}")]
    InvalidJob { reason: String },

    #[error("invalid periodicity '{input}': {reason}")]
    InvalidPeriodicity { input: String, reason: String },

    #[error("job not found: {name}")]
    JobNotFound { name: String },

    #[error("{operation} is not supported by this store")]
    Unsupported { operation: &'static str },

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_job(reason: impl Into<String>) -> Self {
        Self::InvalidJob {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_periodicity(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPeriodicity {
            input: input.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn job_not_found(name: impl Into<String>) -> Self {
        Self::JobNotFound { name: name.into() }
    }

    #[must_use]
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True for errors caused by bad input rather than a failing backend.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidJob { .. }
                | Self::InvalidPeriodicity { .. }
                | Self::Decode(_)
                | Self::Malformed { .. }
        )
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
