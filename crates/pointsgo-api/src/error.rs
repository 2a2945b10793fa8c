// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid backend url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("build HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),
    #[error("cannot reach {base_url} -- is the backend running? ({source})")]
    Connection {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
