use std::fmt::Display;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no {endpoint_type} endpoint for service type '{service_type}' in the service catalog")]
    EndpointNotFound {
        service_type: String,
        endpoint_type: String,
    },

    #[error("monitoring query failed: {0}")]
    Monitoring(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),
}

/// Logs the error of a failed call and hands it back unchanged.
pub trait Logged<T> {
    fn logged(self, operation: &str) -> Result<T>;
}

impl<T, E> Logged<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn logged(self, operation: &str) -> Result<T> {
        self.map_err(|e| {
            let e = e.into();
            log_failure(operation, &e);
            e
        })
    }
}

fn log_failure(operation: &str, err: &dyn Display) {
    tracing::error!(operation, error = %err, "call failed");
}
