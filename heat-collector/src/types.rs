use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Gauge,
    Delta,
    Cumulative,
}

/// One normalized telemetry measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub sample_type: SampleType,
    pub unit: String,
    pub volume: f64,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub resource_id: String,
    pub timestamp: String, // ISO-8601 UTC, e.g. 2026-10-16T08:30:00Z
    pub source: String,
    #[serde(default)]
    pub resource_metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuUtilStats {
    pub util: f64,
}

#[derive(Debug, Serialize)]
pub struct SamplePayload<'a> {
    pub source: &'a str,
    pub samples: &'a [Sample],
}
