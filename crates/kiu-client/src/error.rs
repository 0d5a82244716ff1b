use thiserror::Error;

/// Setup errors of the client binary. Runtime failures inside channels are
/// reported through channel state, never through this type.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No channels configured")]
    NoChannels,
}
