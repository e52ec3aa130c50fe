use thiserror::Error;

/// Errors returned by [`crate::client::CatalogClient`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The request never produced a response (connect, DNS, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered, but not with a usable listing.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The response body did not match the expected schema.
    #[error("failed to decode {path}: {message} (raw: {raw})")]
    Decode {
        path: String,
        raw: String,
        message: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CatalogError {
    /// HTTP status for [`CatalogError::Api`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

const SNIPPET_LIMIT: usize = 512;

/// Truncates diagnostic text on a char boundary.
pub(crate) fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_LIMIT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SNIPPET_LIMIT).collect();
    out.push('…');
    out
}
