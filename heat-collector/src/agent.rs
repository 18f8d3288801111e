//! Poll loop: discovery, then every pollster, then publish.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use futures::StreamExt;

use crate::collector_core::{Discovery, Pollster};
use crate::error::{Error, Result};
use crate::out::Publisher;
use crate::types::Sample;

pub struct PollingAgent {
    discoveries: Vec<Arc<dyn Discovery>>,
    pollsters: Vec<Arc<dyn Pollster>>,
}

impl PollingAgent {
    pub fn new(discoveries: Vec<Arc<dyn Discovery>>, pollsters: Vec<Arc<dyn Pollster>>) -> Self {
        Self {
            discoveries,
            pollsters,
        }
    }

    fn discovery_for(&self, name: &str) -> Result<&Arc<dyn Discovery>> {
        self.discoveries
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| Error::UnknownPlugin(name.to_string()))
    }

    /// Runs one poll cycle. Discovery runs once per distinct discovery name;
    /// any discovery failure aborts the cycle.
    pub async fn poll_once(&self) -> Result<Vec<Sample>> {
        let mut samples = Vec::new();
        let mut discovered: Vec<(&'static str, Vec<_>)> = Vec::new();

        for pollster in &self.pollsters {
            let name = pollster.default_discovery();
            if !discovered.iter().any(|(n, _)| *n == name) {
                let resources = self.discovery_for(name)?.discover(None).await?;
                discovered.push((name, resources));
            }
            let resources = discovered
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, r)| r.as_slice())
                .unwrap_or_default();

            let before = samples.len();
            samples.extend(pollster.get_samples(resources).collect::<Vec<_>>().await);
            tracing::info!(
                meter = pollster.name(),
                resources = resources.len(),
                samples = samples.len() - before,
                "poll complete"
            );
        }

        Ok(samples)
    }

    /// Polls every `interval` and publishes the samples. A failed cycle is
    /// logged and the loop carries on.
    pub async fn run(&self, publisher: &Publisher, interval: Duration, once: bool) {
        let mut ticker = poll_ticker(interval);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(samples) => {
                    if let Err(e) = publisher.publish(&samples).await {
                        tracing::error!(error = %e, "failed to publish samples");
                    }
                }
                Err(e) => tracing::error!(error = %e, "poll cycle failed"),
            }
            if once {
                break;
            }
        }
    }
}

/// Interval that waits a full period after an overrunning cycle instead of
/// firing the missed ticks back to back.
fn poll_ticker(interval: Duration) -> Interval {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
