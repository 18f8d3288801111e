use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Sample;

/// An EC2-style instance declared in a Heat stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ec2Instance {
    /// Logical resource id inside the stack.
    pub id: String,
    /// Physical id, i.e. the EC2 instance id.
    pub ec2_id: String,
    pub display_name: String,
    pub name: String,
    pub status: String,
    pub metadata: Map<String, Value>,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
}

// Discovery interface
#[async_trait]
pub trait Discovery: Send + Sync {
    fn name(&self) -> &'static str;
    async fn discover(&self, param: Option<&str>) -> Result<Vec<Ec2Instance>>;
}

// Pollster interface
pub trait Pollster: Send + Sync {
    /// Meter name of the samples produced.
    fn name(&self) -> &'static str;

    /// Name of the discovery whose resources this pollster consumes.
    fn default_discovery(&self) -> &'static str;

    /// Lazily inspects each resource and yields one sample per success.
    fn get_samples<'a>(&'a self, resources: &'a [Ec2Instance]) -> BoxStream<'a, Sample>;
}
