use crate::error::{Error, Result};
use crate::types::{Sample, SamplePayload};
use crate::utils::chunked;
use reqwest::Client;
use std::time::Duration;

const CONNECT_TIMEOUT: u64 = 5;
const READ_TIMEOUT: u64 = 30;

pub fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
        .timeout(Duration::from_secs(READ_TIMEOUT))
        .build()?)
}

pub async fn post_batches(
    client: &Client,
    endpoint: &str,
    source: &str,
    samples: &[Sample],
    batch_size: usize,
    batch_flush_ms: u64,
) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    for (n, batch) in chunked(samples, batch_size).iter().enumerate() {
        let payload = SamplePayload {
            source,
            samples: batch,
        };
        let resp = client.post(endpoint).json(&payload).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                method: "POST",
                url: format!("{endpoint} (batch {n})"),
                status,
                body,
            });
        }
        tracing::debug!(batch = n, samples = batch.len(), "published batch");

        // flush 간격
        if batch_flush_ms > 0 {
            tokio::time::sleep(Duration::from_millis(batch_flush_ms)).await;
        }
    }

    Ok(())
}
