/// Errors produced while resolving remote content.
///
/// The error is stored inside [`FetchState::Failure`](crate::FetchState) and
/// handed to every waiter of the entry, so it is cheap to clone and carries
/// owned strings rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The transport failed to produce a response body.
    ///
    /// Covers connection errors, timeouts and non-success HTTP statuses.
    #[error("network failure fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// The response arrived but did not have the expected shape.
    #[error("unexpected response shape: {reason}")]
    ResponseShape { reason: String },

    /// The embed directive itself is unusable, so no fetch was attempted.
    #[error("invalid directive: {reason}")]
    Directive { reason: String },
}

impl FetchError {
    /// Shorthand for a [`FetchError::Network`] with owned fields.
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`FetchError::ResponseShape`].
    pub fn response_shape(reason: impl Into<String>) -> Self {
        Self::ResponseShape {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`FetchError::Directive`].
    pub fn directive(reason: impl Into<String>) -> Self {
        Self::Directive {
            reason: reason.into(),
        }
    }
}
