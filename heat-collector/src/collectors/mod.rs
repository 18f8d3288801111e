pub mod cpu;
pub mod ec2;

use crate::collector_core::Pollster;
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::inspector::Inspector;
use std::sync::Arc;

pub enum MeterKind {
    CpuUtil,
}

impl MeterKind {
    pub fn parse(s: &str) -> Result<MeterKind> {
        match s.trim().to_lowercase().as_str() {
            cpu::METER_NAME => Ok(MeterKind::CpuUtil),
            other => Err(Error::UnknownPlugin(other.to_string())),
        }
    }

    pub fn parse_list(names: &[String]) -> Result<Vec<MeterKind>> {
        names.iter().map(|n| MeterKind::parse(n)).collect()
    }
}

pub fn build_pollsters(
    meters: &[MeterKind],
    inspector: Arc<dyn Inspector>,
    config: &AgentConfig,
) -> Vec<Arc<dyn Pollster>> {
    let mut v: Vec<Arc<dyn Pollster>> = vec![];
    for meter in meters {
        match meter {
            MeterKind::CpuUtil => v.push(Arc::new(cpu::CpuUtilPollster::new(
                inspector.clone(),
                config.reserved_metadata.clone(),
                &config.polling.source,
            ))),
        }
    }
    v
}
