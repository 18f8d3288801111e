//! Agent configuration.
//!
//! Loaded from a TOML file. Every section is optional; service credential
//! defaults are read from the usual `OS_*` environment variables so a bare
//! config file works on a host with an openrc sourced.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::out::OutMode;
use crate::utils::env_or;

/// Top-level collector configuration.
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    /// Timeout in seconds for HTTP requests to OpenStack services.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub service_credentials: ServiceCredentials,

    #[serde(default)]
    pub service_types: ServiceTypes,

    #[serde(default)]
    pub heat: HeatConfig,

    #[serde(default)]
    pub cloudwatch: CloudWatchConfig,

    #[serde(default)]
    pub reserved_metadata: ReservedMetadata,

    #[serde(default)]
    pub publisher: PublisherConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            http_timeout: default_http_timeout(),
            polling: PollingConfig::default(),
            service_credentials: ServiceCredentials::default(),
            service_types: ServiceTypes::default(),
            heat: HeatConfig::default(),
            cloudwatch: CloudWatchConfig::default(),
            reserved_metadata: ReservedMetadata::default(),
            publisher: PublisherConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.polling.interval_secs == 0 {
            return Err(Error::Config("polling.interval_secs must be positive".into()));
        }
        if self.heat.stack_limit == 0 {
            return Err(Error::Config("heat.stack_limit must be positive".into()));
        }
        if self.publisher.batch_size == 0 {
            return Err(Error::Config("publisher.batch_size must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Meter names to poll, e.g. `cpu_util`.
    #[serde(default = "default_meters")]
    pub meters: Vec<String>,

    /// Value stamped into `Sample::source`.
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            meters: default_meters(),
            source: default_source(),
        }
    }
}

/// Credentials the collector uses to talk to the identity service.
#[derive(Debug, Deserialize)]
pub struct ServiceCredentials {
    #[serde(default = "default_os_username")]
    pub os_username: String,

    #[serde(default = "default_os_password")]
    pub os_password: SecretString,

    #[serde(default = "default_os_tenant_id")]
    pub os_tenant_id: String,

    #[serde(default = "default_os_tenant_name")]
    pub os_tenant_name: String,

    #[serde(default = "default_os_auth_url")]
    pub os_auth_url: String,

    #[serde(default = "default_os_region_name")]
    pub os_region_name: Option<String>,

    /// Endpoint type to pick from the service catalog (`publicURL`,
    /// `internalURL`, `adminURL`).
    #[serde(default = "default_os_endpoint_type")]
    pub os_endpoint_type: String,

    #[serde(default = "default_os_cacert")]
    pub os_cacert: Option<PathBuf>,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for ServiceCredentials {
    fn default() -> Self {
        Self {
            os_username: default_os_username(),
            os_password: default_os_password(),
            os_tenant_id: default_os_tenant_id(),
            os_tenant_name: default_os_tenant_name(),
            os_auth_url: default_os_auth_url(),
            os_region_name: default_os_region_name(),
            os_endpoint_type: default_os_endpoint_type(),
            os_cacert: default_os_cacert(),
            insecure: false,
        }
    }
}

impl ServiceCredentials {
    /// Tenant that owns every discovered instance: the tenant id, or the
    /// tenant name when no id is configured.
    pub fn owning_tenant(&self) -> &str {
        if self.os_tenant_id.is_empty() {
            &self.os_tenant_name
        } else {
            &self.os_tenant_id
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceTypes {
    #[serde(default = "default_heat_service_type")]
    pub heat: String,
}

impl Default for ServiceTypes {
    fn default() -> Self {
        Self {
            heat: default_heat_service_type(),
        }
    }
}

/// Orchestration service options.
#[derive(Debug, Deserialize)]
pub struct HeatConfig {
    /// Fixed orchestration endpoint. Skips the service catalog lookup.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub admin_user_id: Option<String>,

    #[serde(default)]
    pub admin_username: Option<String>,

    #[serde(default)]
    pub admin_password: Option<SecretString>,

    #[serde(default = "default_os_auth_url")]
    pub admin_auth_url: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub cafile: Option<PathBuf>,

    /// Per-request timeout in seconds. Falls back to `http_timeout`.
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default = "default_instance_resource_type")]
    pub instance_resource_type: String,

    #[serde(default = "default_nested_depth")]
    pub nested_depth: u32,

    #[serde(default = "default_stack_limit")]
    pub stack_limit: u32,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            url: None,
            admin_user_id: None,
            admin_username: None,
            admin_password: None,
            admin_auth_url: default_os_auth_url(),
            insecure: false,
            cafile: None,
            timeout: None,
            instance_resource_type: default_instance_resource_type(),
            nested_depth: default_nested_depth(),
            stack_limit: default_stack_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudWatchConfig {
    /// AWS region. Uses the SDK's provider chain when unset.
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default = "default_cw_namespace")]
    pub namespace: String,

    #[serde(default = "default_cw_metric_name")]
    pub metric_name: String,

    #[serde(default = "default_cw_statistic")]
    pub statistic: String,
}

impl Default for CloudWatchConfig {
    fn default() -> Self {
        Self {
            region: None,
            namespace: default_cw_namespace(),
            metric_name: default_cw_metric_name(),
            statistic: default_cw_statistic(),
        }
    }
}

/// Which instance metadata keys are forwarded into samples as
/// `user_metadata`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservedMetadata {
    #[serde(default = "default_reserved_namespace")]
    pub namespace: Vec<String>,

    /// Maximum length of a forwarded string value.
    #[serde(default = "default_reserved_length")]
    pub length: usize,
}

impl Default for ReservedMetadata {
    fn default() -> Self {
        Self {
            namespace: default_reserved_namespace(),
            length: default_reserved_length(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    #[serde(default)]
    pub mode: OutMode,

    #[serde(default = "default_publisher_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub batch_flush_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            mode: OutMode::default(),
            endpoint: default_publisher_endpoint(),
            batch_size: default_batch_size(),
            batch_flush_ms: 0,
        }
    }
}

fn default_http_timeout() -> u64 {
    600
}

fn default_interval_secs() -> u64 {
    600
}

fn default_meters() -> Vec<String> {
    vec!["cpu_util".to_string()]
}

fn default_source() -> String {
    "openstack".to_string()
}

fn default_os_username() -> String {
    env_or("OS_USERNAME", "ceilometer")
}

fn default_os_password() -> SecretString {
    SecretString::from(env_or("OS_PASSWORD", "admin"))
}

fn default_os_tenant_id() -> String {
    env_or("OS_TENANT_ID", "")
}

fn default_os_tenant_name() -> String {
    env_or("OS_TENANT_NAME", "admin")
}

fn default_os_auth_url() -> String {
    env_or("OS_AUTH_URL", "http://localhost:5000/v2.0")
}

fn default_os_region_name() -> Option<String> {
    std::env::var("OS_REGION_NAME").ok()
}

fn default_os_endpoint_type() -> String {
    env_or("OS_ENDPOINT_TYPE", "publicURL")
}

fn default_os_cacert() -> Option<PathBuf> {
    std::env::var_os("OS_CACERT").map(PathBuf::from)
}

fn default_heat_service_type() -> String {
    "orchestration".to_string()
}

fn default_instance_resource_type() -> String {
    "AWS::VPC::EC2Instance".to_string()
}

fn default_nested_depth() -> u32 {
    3
}

fn default_stack_limit() -> u32 {
    1000
}

fn default_cw_namespace() -> String {
    "AWS/EC2".to_string()
}

fn default_cw_metric_name() -> String {
    "CPUUtilization".to_string()
}

fn default_cw_statistic() -> String {
    "Average".to_string()
}

fn default_reserved_namespace() -> Vec<String> {
    vec!["metering.".to_string()]
}

fn default_reserved_length() -> usize {
    256
}

fn default_publisher_endpoint() -> String {
    "http://localhost:8080/api/samples".to_string()
}

fn default_batch_size() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AgentConfig::from_toml("").unwrap();
        assert_eq!(config.http_timeout, 600);
        assert_eq!(config.polling.meters, vec!["cpu_util"]);
        assert_eq!(config.service_types.heat, "orchestration");
        assert_eq!(config.heat.instance_resource_type, "AWS::VPC::EC2Instance");
        assert_eq!(config.heat.nested_depth, 3);
        assert_eq!(config.heat.stack_limit, 1000);
        assert_eq!(config.cloudwatch.namespace, "AWS/EC2");
        assert_eq!(config.cloudwatch.metric_name, "CPUUtilization");
        assert_eq!(config.reserved_metadata.namespace, vec!["metering."]);
        assert_eq!(config.reserved_metadata.length, 256);
        assert_eq!(config.publisher.mode, OutMode::Stdout);
    }

    #[test]
    fn parses_sections() {
        let toml = r#"
            http_timeout = 30

            [polling]
            interval_secs = 60

            [service_credentials]
            os_username = "svc"
            os_password = "s3cret"
            os_tenant_id = "t-123"
            os_tenant_name = "services"
            os_auth_url = "http://keystone:5000/v2.0"
            os_region_name = "RegionOne"

            [heat]
            admin_user_id = "u-1"
            admin_username = "heat-admin"
            admin_password = "hunter2"
            timeout = 15

            [cloudwatch]
            region = "eu-west-1"

            [publisher]
            mode = "http"
            endpoint = "http://sink:9000/samples"
            batch_size = 10
        "#;

        let config = AgentConfig::from_toml(toml).unwrap();
        assert_eq!(config.http_timeout, 30);
        assert_eq!(config.polling.interval_secs, 60);
        assert_eq!(config.service_credentials.os_username, "svc");
        assert_eq!(config.service_credentials.os_password.expose_secret(), "s3cret");
        assert_eq!(config.service_credentials.os_region_name.as_deref(), Some("RegionOne"));
        assert_eq!(config.heat.admin_user_id.as_deref(), Some("u-1"));
        assert_eq!(
            config.heat.admin_password.as_ref().map(|p| p.expose_secret()),
            Some("hunter2")
        );
        assert_eq!(config.heat.timeout, Some(15));
        assert_eq!(config.cloudwatch.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.publisher.mode, OutMode::Http);
        assert_eq!(config.publisher.batch_size, 10);
    }

    #[test]
    fn owning_tenant_prefers_id() {
        let config = AgentConfig::from_toml(
            r#"
            [service_credentials]
            os_tenant_id = "t-123"
            os_tenant_name = "services"
        "#,
        )
        .unwrap();
        assert_eq!(config.service_credentials.owning_tenant(), "t-123");
    }

    #[test]
    fn owning_tenant_falls_back_to_name() {
        let config = AgentConfig::from_toml(
            r#"
            [service_credentials]
            os_tenant_id = ""
            os_tenant_name = "services"
        "#,
        )
        .unwrap();
        assert_eq!(config.service_credentials.owning_tenant(), "services");
    }

    #[test]
    fn rejects_zero_interval() {
        let err = AgentConfig::from_toml("[polling]\ninterval_secs = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = AgentConfig::from_toml("[heat\nurl = ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let config = AgentConfig::from_toml(
            "[service_credentials]\nos_password = \"do-not-print\"\n",
        )
        .unwrap();
        let dbg = format!("{:?}", config.service_credentials);
        assert!(!dbg.contains("do-not-print"));
    }
}
