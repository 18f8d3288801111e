use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Map;

use crate::collector_core::{Ec2Instance, Pollster};
use crate::collectors::ec2::DISCOVERY_NAME;
use crate::common::{make_sample_from_ec2_instance, Measurement};
use crate::config::ReservedMetadata;
use crate::inspector::Inspector;
use crate::types::{Sample, SampleType};

pub const METER_NAME: &str = "cpu_util";

/// Emits a `cpu_util` gauge for every discovered instance.
pub struct CpuUtilPollster {
    inspector: Arc<dyn Inspector>,
    reserved: ReservedMetadata,
    source: String,
    last_poll: Mutex<Option<DateTime<Utc>>>,
}

impl CpuUtilPollster {
    pub fn new(inspector: Arc<dyn Inspector>, reserved: ReservedMetadata, source: &str) -> Self {
        Self {
            inspector,
            reserved,
            source: source.to_string(),
            last_poll: Mutex::new(None),
        }
    }

    /// Seconds since the previous poll; `None` on the first one.
    fn record_poll_time(&self) -> Option<u64> {
        let now = Utc::now();
        let mut last = self
            .last_poll
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let duration = last.map(|prev| (now - prev).num_seconds().max(0) as u64);
        *last = Some(now);
        duration
    }

    async fn sample_for(&self, instance: &Ec2Instance, duration: Option<u64>) -> Option<Sample> {
        tracing::debug!(instance = %instance.id, "checking CPU util for AWS EC2 instance");
        match self.inspector.inspect_cpu_util(instance, duration).await {
            Ok(stats) => {
                tracing::debug!(instance = %instance.id, util = stats.util, "CPU UTIL");
                Some(make_sample_from_ec2_instance(
                    instance,
                    Measurement {
                        name: METER_NAME,
                        sample_type: SampleType::Gauge,
                        unit: "%",
                        volume: stats.util,
                        resource_id: None,
                        additional_metadata: Map::new(),
                    },
                    &self.reserved,
                    &self.source,
                ))
            }
            Err(e) => {
                tracing::error!(instance = %instance.id, error = %e, "could not get CPU util");
                None
            }
        }
    }
}

impl Pollster for CpuUtilPollster {
    fn name(&self) -> &'static str {
        METER_NAME
    }

    fn default_discovery(&self) -> &'static str {
        DISCOVERY_NAME
    }

    fn get_samples<'a>(&'a self, resources: &'a [Ec2Instance]) -> BoxStream<'a, Sample> {
        // the poll window only moves once the stream is actually polled
        stream::once(async move { self.record_poll_time() })
            .flat_map(move |duration| {
                stream::iter(resources).then(move |instance| self.sample_for(instance, duration))
            })
            .filter_map(futures::future::ready)
            .boxed()
    }
}
