/// Errors talking to the build service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 404 is kept apart from [`ApiError::Remote`] because the history
    /// builder downgrades one specific 404 into an unexpanded retry.
    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("build service error ({status}): {summary}")]
    Remote { status: u16, summary: String },

    #[error("malformed server response: {detail}")]
    Xml { detail: String },

    #[error("invalid API URL '{0}'")]
    BadUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub(crate) fn xml(detail: impl Into<String>) -> Self {
        ApiError::Xml {
            detail: detail.into(),
        }
    }
}
