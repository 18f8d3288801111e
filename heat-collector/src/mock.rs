//! Offline discovery and inspector used by `--mock` runs.

use async_trait::async_trait;
use serde_json::json;

use crate::collector_core::{Discovery, Ec2Instance};
use crate::collectors::ec2::DISCOVERY_NAME;
use crate::error::Result;
use crate::inspector::Inspector;
use crate::types::CpuUtilStats;

pub fn mock_instances() -> Vec<Ec2Instance> {
    vec![
        Ec2Instance {
            id: "WebServer".into(),
            ec2_id: "i-0123456789abcdef0".into(),
            display_name: "WebServer".into(),
            name: "WebServer".into(),
            status: "CREATE_COMPLETE".into(),
            metadata: json!({
                "metering.stack": "demo-web",
                "AWS::CloudFormation::Init": {}
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
            user_id: Some("heat-admin".into()),
            tenant_id: Some("demo".into()),
        },
        Ec2Instance {
            id: "DbServer".into(),
            ec2_id: "i-0fedcba9876543210".into(),
            display_name: "DbServer".into(),
            name: "DbServer".into(),
            status: "CREATE_COMPLETE".into(),
            metadata: Default::default(),
            user_id: Some("heat-admin".into()),
            tenant_id: Some("demo".into()),
        },
    ]
}

pub struct MockDiscovery;

#[async_trait]
impl Discovery for MockDiscovery {
    fn name(&self) -> &'static str {
        DISCOVERY_NAME
    }

    async fn discover(&self, _param: Option<&str>) -> Result<Vec<Ec2Instance>> {
        Ok(mock_instances())
    }
}

/// Reports a fixed utilization derived from the instance id.
pub struct MockInspector;

#[async_trait]
impl Inspector for MockInspector {
    async fn inspect_cpu_util(
        &self,
        instance: &Ec2Instance,
        _duration: Option<u64>,
    ) -> Result<CpuUtilStats> {
        let util = instance.ec2_id.bytes().map(u64::from).sum::<u64>() % 100;
        Ok(CpuUtilStats { util: util as f64 })
    }
}
