use eventseq_core::StepError;

/// Errors returned by provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-2xx status.
    #[error("{method} {path} failed with HTTP {status}: {message}")]
    Api {
        method: &'static str,
        path: String,
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, proxy).
    #[error("transport error calling {path}: {message}")]
    Transport { path: String, message: String },

    /// The response body was not the expected JSON shape.
    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },

    /// The blocking request task panicked or was cancelled.
    #[error("request task failed: {0}")]
    Join(String),
}

impl ProviderError {
    /// True when the provider refused the request (4xx).
    ///
    /// Timelines that expect a call to be rejected check this, so transport
    /// failures are never mistaken for a documented rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProviderError::Api { status, .. } if (400..500).contains(status))
    }
}

impl From<ProviderError> for StepError {
    fn from(err: ProviderError) -> Self {
        StepError::Provider(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ProviderError {
        ProviderError::Api {
            method: "POST",
            path: "/v1/setup_intents/seti_1/cancel".into(),
            status,
            code: None,
            message: "cannot cancel".into(),
        }
    }

    #[test]
    fn client_errors_are_rejections() {
        assert!(api(400).is_rejection());
        assert!(api(404).is_rejection());
        assert!(!api(500).is_rejection());
    }

    #[test]
    fn transport_is_not_a_rejection() {
        let err = ProviderError::Transport {
            path: "/v1/events".into(),
            message: "connection reset".into(),
        };
        assert!(!err.is_rejection());
    }

    #[test]
    fn converts_into_step_error() {
        let step: StepError = api(402).into();
        assert!(step.to_string().contains("HTTP 402"));
    }
}
