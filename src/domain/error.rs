//! Domain error types.

/// Top-level error type for ledgerlens.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("remote call to {model} timed out after {timeout_secs}s")]
    RemoteTimeout { model: String, timeout_secs: u64 },

    #[error("remote error from {model}: {message}")]
    RemoteError { model: String, message: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("cannot decode {model} record: {reason}")]
    Decode { model: String, reason: String },

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

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Timeouts are recoverable: partial results fetched before one may still be used.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LedgerError::RemoteTimeout { .. })
    }

    pub(crate) fn decode(model: &str, reason: impl Into<String>) -> Self {
        LedgerError::Decode {
            model: model.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        LedgerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) | LedgerError::Csv(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::RemoteTimeout { .. }
            | LedgerError::RemoteError { .. }
            | LedgerError::Transport { .. } => 3,
            LedgerError::Decode { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
