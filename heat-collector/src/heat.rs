//! Client for the Heat orchestration API.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::AgentConfig;
use crate::error::{Error, Logged, Result};
use crate::identity::{IdentityClient, PasswordAuth};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Stack {
    pub id: String,
    pub stack_name: String,
    #[serde(default)]
    pub stack_status: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StackResource {
    pub resource_name: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_status: String,
    pub resource_type: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl StackResource {
    /// Identifier (`name/id`) of the stack the resource lives in, taken from
    /// its `stack` link. With nested listing this is the nested stack.
    pub fn owning_stack(&self) -> Option<String> {
        let link = self.links.iter().find(|l| l.rel == "stack")?;
        let url = Url::parse(&link.href).ok()?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [.., name, id] => Some(format!("{name}/{id}")),
            _ => None,
        }
    }
}

/// Query for `GET /stacks`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackListQuery {
    pub limit: Option<u32>,
    pub sort_key: Option<String>,
    pub sort_dir: Option<String>,
    /// List stacks of every tenant (admin only).
    pub global_tenant: bool,
    /// Extra filters passed through as query parameters (`status=...`).
    pub filters: Vec<(String, String)>,
}

impl StackListQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(k) = &self.sort_key {
            pairs.push(("sort_key".to_string(), k.clone()));
        }
        if let Some(d) = &self.sort_dir {
            pairs.push(("sort_dir".to_string(), d.clone()));
        }
        if self.global_tenant {
            pairs.push(("global_tenant".to_string(), "True".to_string()));
        }
        pairs.extend(self.filters.iter().cloned());
        pairs
    }
}

// Orchestration interface
#[async_trait]
pub trait OrchestrationApi: Send + Sync {
    async fn list_stacks(&self, query: &StackListQuery) -> Result<Vec<Stack>>;

    async fn list_resources(&self, stack_id: &str, nested_depth: u32)
        -> Result<Vec<StackResource>>;

    async fn resource_metadata(
        &self,
        stack_id: &str,
        resource_name: &str,
    ) -> Result<Map<String, Value>>;
}

#[derive(Deserialize)]
struct StackList {
    stacks: Vec<Stack>,
}

#[derive(Deserialize)]
struct ResourceList {
    resources: Vec<StackResource>,
}

#[derive(Deserialize)]
struct MetadataBody {
    #[serde(default)]
    metadata: Map<String, Value>,
}

pub struct HeatClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<SecretString>,
    reauth: Option<(IdentityClient, PasswordAuth)>,
}

impl HeatClient {
    pub fn new(http: reqwest::Client, base_url: &str, token: SecretString) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid orchestration url '{base_url}': {e}")))?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(token),
            reauth: None,
        })
    }

    /// Credentials used to fetch a fresh token when heat rejects the
    /// current one.
    pub fn with_reauth(mut self, identity: IdentityClient, auth: PasswordAuth) -> Self {
        self.reauth = Some((identity, auth));
        self
    }

    /// Authenticates against keystone and builds a client for the
    /// orchestration endpoint found in the service catalog.
    pub async fn connect(config: &AgentConfig) -> Result<Self> {
        Self::try_connect(config).await.logged("connect to orchestration service")
    }

    async fn try_connect(config: &AgentConfig) -> Result<Self> {
        let http = build_http_client(config)?;
        let identity = IdentityClient::new(http.clone());
        let creds = &config.service_credentials;
        let heat = &config.heat;

        let service_auth = PasswordAuth {
            auth_url: creds.os_auth_url.clone(),
            user_id: None,
            username: Some(creds.os_username.clone()),
            password: copy_secret(&creds.os_password),
            tenant_id: Some(creds.os_tenant_id.clone()),
            tenant_name: Some(creds.os_tenant_name.clone()),
        };
        let service_access = identity.authenticate(&service_auth).await?;

        let heat_url = match &heat.url {
            Some(url) => url.clone(),
            None => service_access.catalog.url_for(
                &config.service_types.heat,
                &creds.os_endpoint_type,
                creds.os_region_name.as_deref(),
            )?,
        };

        let (token, auth) = if heat.admin_user_id.is_none() && heat.admin_username.is_none() {
            (service_access.token, service_auth)
        } else {
            let password = heat.admin_password.as_ref().ok_or_else(|| {
                Error::Config("heat.admin_password is required with heat admin credentials".into())
            })?;
            let admin_auth = PasswordAuth {
                auth_url: heat.admin_auth_url.clone(),
                user_id: heat.admin_user_id.clone(),
                username: heat.admin_username.clone(),
                password: copy_secret(password),
                tenant_id: Some(creds.os_tenant_id.clone()),
                tenant_name: Some(creds.os_tenant_name.clone()),
            };
            let token = identity.authenticate(&admin_auth).await?.token;
            (token, admin_auth)
        };

        tracing::info!(url = %heat_url, "orchestration client ready");
        Ok(Self::new(http, &heat_url, token)?.with_reauth(identity, auth))
    }

    fn endpoint(&self, path: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("'{}' cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    /// GET with the current token. A 401 triggers one re-authentication
    /// and retry when credentials are known.
    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(String, String)]) -> Result<T> {
        match self.send_get(&url, query).await {
            Err(Error::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED && self.reauth.is_some() =>
            {
                tracing::info!(%url, "orchestration token rejected, re-authenticating");
                self.refresh_token().await?;
                self.send_get(&url, query).await
            }
            other => other,
        }
    }

    async fn send_get<T: DeserializeOwned>(&self, url: &Url, query: &[(String, String)]) -> Result<T> {
        tracing::debug!(%url, "GET");
        let token = self.current_token();
        let resp = self
            .http
            .get(url.clone())
            .query(query)
            .header("X-Auth-Token", token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                method: "GET",
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn current_token(&self) -> SecretString {
        let token = self.token.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        copy_secret(&token)
    }

    async fn refresh_token(&self) -> Result<()> {
        let Some((identity, auth)) = &self.reauth else {
            return Ok(());
        };
        let access = identity.authenticate(auth).await?;
        *self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = access.token;
        Ok(())
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

#[async_trait]
impl OrchestrationApi for HeatClient {
    async fn list_stacks(&self, query: &StackListQuery) -> Result<Vec<Stack>> {
        let fetch = async {
            let url = self.endpoint(&["stacks"])?;
            let list: StackList = self.get_json(url, &query.to_pairs()).await?;
            Ok::<_, Error>(list.stacks)
        };
        fetch.await.logged("list stacks")
    }

    async fn list_resources(
        &self,
        stack_id: &str,
        nested_depth: u32,
    ) -> Result<Vec<StackResource>> {
        let fetch = async {
            let mut path = vec!["stacks"];
            path.extend(stack_id.split('/'));
            path.push("resources");
            let url = self.endpoint(&path)?;
            let query = [("nested_depth".to_string(), nested_depth.to_string())];
            let list: ResourceList = self.get_json(url, &query).await?;
            Ok::<_, Error>(list.resources)
        };
        fetch.await.logged("list resources")
    }

    async fn resource_metadata(
        &self,
        stack_id: &str,
        resource_name: &str,
    ) -> Result<Map<String, Value>> {
        let fetch = async {
            let mut path = vec!["stacks"];
            path.extend(stack_id.split('/'));
            path.extend(["resources", resource_name, "metadata"]);
            let url = self.endpoint(&path)?;
            let body: MetadataBody = self.get_json(url, &[]).await?;
            Ok::<_, Error>(body.metadata)
        };
        fetch.await.logged("get resource metadata")
    }
}

fn build_http_client(config: &AgentConfig) -> Result<reqwest::Client> {
    let heat = &config.heat;
    let timeout = heat.timeout.unwrap_or(config.http_timeout);

    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .danger_accept_invalid_certs(accept_invalid_certs(config));

    let cafile = heat
        .cafile
        .as_ref()
        .or(config.service_credentials.os_cacert.as_ref());
    if let Some(path) = cafile {
        let pem = std::fs::read(path)?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }

    Ok(builder.build()?)
}

/// Either section may switch off certificate verification; the heat and
/// identity requests share one client.
fn accept_invalid_certs(config: &AgentConfig) -> bool {
    config.heat.insecure || config.service_credentials.insecure
}
