use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::collector_core::Ec2Instance;
use crate::config::ReservedMetadata;
use crate::types::{Sample, SampleType};

/// Measurement fields a pollster supplies for one sample.
#[derive(Debug, Clone)]
pub struct Measurement<'a> {
    pub name: &'a str,
    pub sample_type: SampleType,
    pub unit: &'a str,
    pub volume: f64,
    pub resource_id: Option<&'a str>,
    pub additional_metadata: Map<String, Value>,
}

pub fn make_sample_from_ec2_instance(
    instance: &Ec2Instance,
    m: Measurement<'_>,
    reserved: &ReservedMetadata,
    source: &str,
) -> Sample {
    let resource_metadata =
        add_reserved_user_metadata(&instance.metadata, m.additional_metadata, reserved);
    Sample {
        id: Uuid::new_v4(),
        name: m.name.to_string(),
        sample_type: m.sample_type,
        unit: m.unit.to_string(),
        volume: m.volume,
        user_id: instance.user_id.clone(),
        project_id: instance.tenant_id.clone(),
        resource_id: m.resource_id.unwrap_or(&instance.id).to_string(),
        timestamp: isotime(),
        source: source.to_string(),
        resource_metadata,
    }
}

/// Copies metadata under the reserved prefixes into `dest["user_metadata"]`,
/// prefix stripped and dots turned into underscores.
pub fn add_reserved_user_metadata(
    src: &Map<String, Value>,
    mut dest: Map<String, Value>,
    reserved: &ReservedMetadata,
) -> Map<String, Value> {
    let mut user_metadata = Map::new();
    for prefix in &reserved.namespace {
        for (k, v) in src {
            let Some(stripped) = k.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let key = stripped.replace('.', "_");
            if dest.contains_key(&key) {
                continue;
            }
            let value = match v {
                Value::String(s) => Value::String(s.chars().take(reserved.length).collect()),
                other => other.clone(),
            };
            user_metadata.insert(key, value);
        }
    }
    if !user_metadata.is_empty() {
        dest.insert("user_metadata".into(), Value::Object(user_metadata));
    }
    dest
}

pub fn isotime() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
