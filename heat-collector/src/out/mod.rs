use crate::config::PublisherConfig;
use crate::error::Result;
use crate::types::Sample;
use serde::Deserialize;

pub mod http;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutMode {
    #[default]
    Stdout,
    Http,
}

impl OutMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "http" => OutMode::Http,
            _ => OutMode::Stdout,
        }
    }
}

/// Where finished samples go.
pub struct Publisher {
    mode: OutMode,
    endpoint: String,
    batch_size: usize,
    batch_flush_ms: u64,
    source: String,
    client: reqwest::Client,
}

impl Publisher {
    pub fn new(cfg: &PublisherConfig, source: &str) -> Result<Self> {
        Ok(Self {
            mode: cfg.mode,
            endpoint: cfg.endpoint.clone(),
            batch_size: cfg.batch_size.max(1),
            batch_flush_ms: cfg.batch_flush_ms,
            source: source.to_string(),
            client: http::build_client()?,
        })
    }

    pub fn mode(&self) -> OutMode {
        self.mode
    }

    pub async fn publish(&self, samples: &[Sample]) -> Result<()> {
        match self.mode {
            OutMode::Stdout => emit_stdout(samples),
            OutMode::Http => {
                http::post_batches(
                    &self.client,
                    &self.endpoint,
                    &self.source,
                    samples,
                    self.batch_size,
                    self.batch_flush_ms,
                )
                .await
            }
        }
    }
}

pub fn emit_stdout(samples: &[Sample]) -> Result<()> {
    for s in samples {
        println!("{}", serde_json::to_string(s)?);
    }
    Ok(())
}
