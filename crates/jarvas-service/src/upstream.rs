//! Errors raised by external collaborators (identity, inference, storage).

/// Error type for collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Status {
        /// Collaborator name.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The inference service answered without an image.
    #[error("no image generated by the model")]
    NoImage,

    /// The response could not be decoded.
    #[error("invalid response from {service}: {message}")]
    InvalidResponse {
        /// Collaborator name.
        service: &'static str,
        /// What was wrong.
        message: String,
    },

    /// Credentials or settings are missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Longest response body excerpt kept in errors.
const MAX_ERROR_BODY: usize = 512;

impl UpstreamError {
    /// Build a `Status` error from a failed response, consuming its body.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Self::Status {
            service,
            status,
            body,
        }
    }
}
