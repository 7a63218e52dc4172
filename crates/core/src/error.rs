/// Result alias that carries the custom [`FeedbackError`] type.
pub type Result<T> = std::result::Result<T, FeedbackError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    /// Free-form failure reported by a collaborator.
    #[error("{0}")]
    Message(String),
    /// A collaborator (perception engine, audio input, surface) failed to
    /// start. The pipeline stays retryable.
    #[error("failed to initialise {component}: {reason}")]
    Initialization {
        component: &'static str,
        reason: String,
    },
    /// A configuration value was rejected by the settings surface.
    #[error("invalid setting `{option}`: {reason}")]
    InvalidSetting {
        option: &'static str,
        reason: String,
    },
    /// The requested activity is not part of the catalog.
    #[error("unknown activity `{name}`")]
    UnknownActivity { name: String },
    /// An activity failed while processing a frame.
    #[error("activity `{name}` failed: {reason}")]
    Activity { name: String, reason: String },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Settings or summary (de)serialisation failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Spectrum analysis failure.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl FeedbackError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn setting(option: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            option,
            reason: reason.into(),
        }
    }
}

impl From<&str> for FeedbackError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for FeedbackError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_culprit() {
        let err = FeedbackError::setting("brushSize", "60 is outside 5..=50");
        assert_eq!(
            err.to_string(),
            "invalid setting `brushSize`: 60 is outside 5..=50"
        );

        let err = FeedbackError::UnknownActivity {
            name: "juggling".to_string(),
        };
        assert!(err.to_string().contains("juggling"));
    }
}
