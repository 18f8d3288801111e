//! CPU utilization inspection through CloudWatch.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudwatch as cloudwatch;
use aws_sdk_cloudwatch::error::DisplayErrorContext;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Datapoint, Dimension, Statistic};

use crate::collector_core::Ec2Instance;
use crate::config::CloudWatchConfig;
use crate::error::{Error, Result};
use crate::types::CpuUtilStats;

const DEFAULT_DURATION_SECS: u64 = 60;

#[async_trait]
pub trait Inspector: Send + Sync {
    /// Utilization over the last `duration` seconds (60 when unknown).
    async fn inspect_cpu_util(
        &self,
        instance: &Ec2Instance,
        duration: Option<u64>,
    ) -> Result<CpuUtilStats>;
}

pub struct CloudWatchInspector {
    client: cloudwatch::Client,
    namespace: String,
    metric_name: String,
    statistic: Statistic,
}

impl CloudWatchInspector {
    pub async fn from_config(cfg: &CloudWatchConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &cfg.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let conf = loader.load().await;
        Self::with_client(cloudwatch::Client::new(&conf), cfg)
    }

    pub fn with_client(client: cloudwatch::Client, cfg: &CloudWatchConfig) -> Self {
        Self {
            client,
            namespace: cfg.namespace.clone(),
            metric_name: cfg.metric_name.clone(),
            statistic: Statistic::from(cfg.statistic.as_str()),
        }
    }
}

#[async_trait]
impl Inspector for CloudWatchInspector {
    async fn inspect_cpu_util(
        &self,
        instance: &Ec2Instance,
        duration: Option<u64>,
    ) -> Result<CpuUtilStats> {
        let duration = effective_duration(duration);
        let end = SystemTime::now();
        let start = end - Duration::from_secs(duration);

        let resp = self
            .client
            .get_metric_statistics()
            .namespace(&self.namespace)
            .metric_name(&self.metric_name)
            .dimensions(
                Dimension::builder()
                    .name("InstanceId")
                    .value(&instance.ec2_id)
                    .build(),
            )
            .start_time(DateTime::from(start))
            .end_time(DateTime::from(end))
            .period(period_for(duration))
            .statistics(self.statistic.clone())
            .send()
            .await
            .map_err(|e| Error::Monitoring(DisplayErrorContext(e).to_string()))?;

        Ok(CpuUtilStats {
            util: latest_value(resp.datapoints(), &self.statistic),
        })
    }
}

pub fn effective_duration(duration: Option<u64>) -> u64 {
    match duration {
        Some(d) if d > 0 => d,
        _ => DEFAULT_DURATION_SECS,
    }
}

/// CloudWatch periods are whole minutes.
pub fn period_for(duration_secs: u64) -> i32 {
    let minutes = duration_secs.div_ceil(60).max(1);
    i32::try_from(minutes * 60).unwrap_or(i32::MAX - i32::MAX % 60)
}

/// Value of `statistic` in the most recent data point, 0 with no data.
pub fn latest_value(datapoints: &[Datapoint], statistic: &Statistic) -> f64 {
    datapoints
        .iter()
        .max_by_key(|d| d.timestamp().map(|t| (t.secs(), t.subsec_nanos())))
        .and_then(|d| match statistic {
            Statistic::Average => d.average(),
            Statistic::Maximum => d.maximum(),
            Statistic::Minimum => d.minimum(),
            Statistic::Sum => d.sum(),
            Statistic::SampleCount => d.sample_count(),
            _ => None,
        })
        .unwrap_or(0.0)
}
