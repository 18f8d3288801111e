use std::sync::Arc;

use async_trait::async_trait;

use crate::collector_core::{Discovery, Ec2Instance};
use crate::config::AgentConfig;
use crate::error::{Logged, Result};
use crate::heat::{OrchestrationApi, StackListQuery, StackResource};
use crate::utils::stack_identifier;

pub const DISCOVERY_NAME: &str = "aws_ec2_instances";

/// Finds EC2 instance resources across all Heat stacks.
pub struct Ec2InstancesDiscovery {
    heat: Arc<dyn OrchestrationApi>,
    resource_type: String,
    nested_depth: u32,
    stack_limit: u32,
    user_id: Option<String>,
    tenant_id: String,
}

impl Ec2InstancesDiscovery {
    pub fn new(heat: Arc<dyn OrchestrationApi>, config: &AgentConfig) -> Self {
        Self {
            heat,
            resource_type: config.heat.instance_resource_type.clone(),
            nested_depth: config.heat.nested_depth,
            stack_limit: config.heat.stack_limit,
            user_id: config.heat.admin_user_id.clone(),
            tenant_id: config.service_credentials.owning_tenant().to_string(),
        }
    }

    pub async fn ec2_instance_get_all(&self) -> Result<Vec<Ec2Instance>> {
        self.collect().await.logged("discover ec2 instances")
    }

    async fn collect(&self) -> Result<Vec<Ec2Instance>> {
        let query = StackListQuery {
            limit: Some(self.stack_limit),
            sort_key: Some("created_at".into()),
            sort_dir: Some("desc".into()),
            global_tenant: true,
            filters: Vec::new(),
        };
        let stacks = self.heat.list_stacks(&query).await?;

        let mut out = Vec::new();
        for stack in &stacks {
            let stack_id = stack_identifier(&stack.stack_name, &stack.id);
            let resources = self.heat.list_resources(&stack_id, self.nested_depth).await?;

            for resource in resources.iter().filter(|r| r.resource_type == self.resource_type) {
                // nested resources report the nested stack through their link
                let Some(owner) = resource.owning_stack() else {
                    tracing::debug!(
                        resource = %resource.resource_name,
                        stack = %stack_id,
                        "instance resource has no stack link, skipping"
                    );
                    continue;
                };
                out.push(self.to_instance(resource, &owner).await?);
            }
        }

        tracing::info!(stacks = stacks.len(), instances = out.len(), "discovered ec2 instances");
        Ok(out)
    }

    async fn to_instance(&self, resource: &StackResource, owner: &str) -> Result<Ec2Instance> {
        let metadata = self
            .heat
            .resource_metadata(owner, &resource.resource_name)
            .await?;

        Ok(Ec2Instance {
            id: resource.logical_resource_id.clone(),
            ec2_id: resource.physical_resource_id.clone().unwrap_or_default(),
            display_name: resource.resource_name.clone(),
            name: resource.resource_name.clone(),
            status: resource.resource_status.clone(),
            metadata,
            user_id: self.user_id.clone(),
            tenant_id: Some(self.tenant_id.clone()),
        })
    }
}

#[async_trait]
impl Discovery for Ec2InstancesDiscovery {
    fn name(&self) -> &'static str {
        DISCOVERY_NAME
    }

    async fn discover(&self, _param: Option<&str>) -> Result<Vec<Ec2Instance>> {
        self.ec2_instance_get_all().await
    }
}
