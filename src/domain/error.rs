//! Domain error types.

/// Top-level error type for hybridtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("invalid sizing: {reason}")]
    InvalidSizing { reason: String },

    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn invalid_sizing(reason: impl Into<String>) -> Self {
        TraderError::InvalidSizing {
            reason: reason.into(),
        }
    }

    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        TraderError::InvariantViolation {
            reason: reason.into(),
        }
    }

    pub(crate) fn data(reason: impl Into<String>) -> Self {
        TraderError::Data {
            reason: reason.into(),
        }
    }

    /// Errors that abort a single decision but never the run.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            TraderError::InvalidSizing { .. } | TraderError::InsufficientHistory { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Data { .. } | TraderError::NoData { .. } => 3,
            TraderError::InvariantViolation { .. }
            | TraderError::InvalidSizing { .. }
            | TraderError::InsufficientHistory { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
