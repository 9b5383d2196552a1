use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request to gateway failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),
}
