use std::io;

#[derive(thiserror::Error, Debug)]
pub enum NinaError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("host error: {0}")]
    Host(String),
    #[error("unknown error")]
    Unknown,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for NinaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NinaError::Timeout
        } else if err.is_connect() {
            NinaError::Network(err.to_string())
        } else if err.is_status() {
            NinaError::Http(err.to_string())
        } else if err.is_decode() || err.is_body() {
            NinaError::Parse(err.to_string())
        } else if err.is_request() {
            NinaError::Network(err.to_string())
        } else {
            NinaError::Unknown
        }
    }
}

impl From<serde_json::Error> for NinaError {
    fn from(err: serde_json::Error) -> Self {
        NinaError::Parse(err.to_string())
    }
}
