//! Keystone v2 password authentication and service catalog lookup.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Logged, Result};

/// Password credentials for a v2 token request.
#[derive(Debug)]
pub struct PasswordAuth {
    pub auth_url: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub password: SecretString,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
}

impl PasswordAuth {
    fn token_url(&self) -> String {
        format!("{}/tokens", self.auth_url.trim_end_matches('/'))
    }

    fn body(&self) -> Value {
        let mut creds = serde_json::Map::new();
        // v2 takes one of username / userId
        if let Some(u) = &self.username {
            creds.insert("username".into(), json!(u));
        } else if let Some(id) = &self.user_id {
            creds.insert("userId".into(), json!(id));
        }
        creds.insert("password".into(), json!(self.password.expose_secret()));

        let mut auth = serde_json::Map::new();
        auth.insert("passwordCredentials".into(), Value::Object(creds));
        match (
            non_empty(self.tenant_id.as_deref()),
            non_empty(self.tenant_name.as_deref()),
        ) {
            (Some(id), _) => {
                auth.insert("tenantId".into(), json!(id));
            }
            (None, Some(name)) => {
                auth.insert("tenantName".into(), json!(name));
            }
            (None, None) => {}
        }
        json!({ "auth": auth })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// A token together with the catalog that came with it.
#[derive(Debug)]
pub struct Access {
    pub token: SecretString,
    pub catalog: ServiceCatalog,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceCatalog {
    services: Vec<CatalogService>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogService {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEndpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(flatten)]
    urls: HashMap<String, Value>,
}

impl ServiceCatalog {
    /// Endpoint URL of the first service of `service_type` that exposes
    /// `endpoint_type` (`public`/`publicURL`, ...) in `region`, if given.
    pub fn url_for(
        &self,
        service_type: &str,
        endpoint_type: &str,
        region: Option<&str>,
    ) -> Result<String> {
        let key = endpoint_key(endpoint_type);
        self.services
            .iter()
            .filter(|s| s.service_type == service_type)
            .flat_map(|s| s.endpoints.iter())
            .filter(|e| match region {
                Some(r) => e.region.as_deref() == Some(r),
                None => true,
            })
            .find_map(|e| e.urls.get(&key).and_then(Value::as_str))
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or_else(|| Error::EndpointNotFound {
                service_type: service_type.to_string(),
                endpoint_type: key,
            })
    }
}

fn endpoint_key(endpoint_type: &str) -> String {
    if endpoint_type.ends_with("URL") {
        endpoint_type.to_string()
    } else {
        format!("{endpoint_type}URL")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access: AccessBody,
}

#[derive(Deserialize)]
struct AccessBody {
    token: TokenBody,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogService>,
}

#[derive(Deserialize)]
struct TokenBody {
    id: String,
}

pub fn parse_token_response(body: &str) -> Result<Access> {
    let resp: TokenResponse = serde_json::from_str(body)?;
    Ok(Access {
        token: SecretString::from(resp.access.token.id),
        catalog: ServiceCatalog {
            services: resp.access.service_catalog,
        },
    })
}

#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
}

impl IdentityClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn authenticate(&self, auth: &PasswordAuth) -> Result<Access> {
        self.request_token(auth).await.logged("authenticate")
    }

    async fn request_token(&self, auth: &PasswordAuth) -> Result<Access> {
        let url = auth.token_url();
        tracing::debug!(%url, "requesting identity token");
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&auth.body())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                method: "POST",
                url,
                status,
                body,
            });
        }
        parse_token_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    const TOKEN_RESPONSE: &str = r#"{
        "access": {
            "token": {"id": "tok-abc", "expires": "2026-10-17T00:00:00Z"},
            "serviceCatalog": [
                {
                    "type": "compute",
                    "name": "nova",
                    "endpoints": [{"region": "RegionOne", "publicURL": "http://nova:8774/v2"}]
                },
                {
                    "type": "orchestration",
                    "name": "heat",
                    "endpoints": [
                        {
                            "region": "RegionOne",
                            "publicURL": "http://heat-one:8004/v1/t1/",
                            "internalURL": "http://heat-one.internal:8004/v1/t1"
                        },
                        {
                            "region": "RegionTwo",
                            "publicURL": "http://heat-two:8004/v1/t1"
                        }
                    ]
                }
            ],
            "user": {"id": "u1", "name": "ceilometer"}
        }
    }"#;

    #[test]
    fn parses_token_and_catalog() {
        let access = parse_token_response(TOKEN_RESPONSE).unwrap();
        assert_eq!(access.token.expose_secret(), "tok-abc");
        assert_eq!(
            access.catalog.url_for("orchestration", "publicURL", None).unwrap(),
            "http://heat-one:8004/v1/t1"
        );
    }

    #[test]
    fn url_for_filters_region_and_endpoint_type() {
        let access = parse_token_response(TOKEN_RESPONSE).unwrap();
        let c = &access.catalog;
        assert_eq!(
            c.url_for("orchestration", "publicURL", Some("RegionTwo")).unwrap(),
            "http://heat-two:8004/v1/t1"
        );
        assert_eq!(
            c.url_for("orchestration", "internal", Some("RegionOne")).unwrap(),
            "http://heat-one.internal:8004/v1/t1"
        );
    }

    #[test]
    fn url_for_reports_missing_endpoint() {
        let access = parse_token_response(TOKEN_RESPONSE).unwrap();
        let err = access
            .catalog
            .url_for("orchestration", "adminURL", Some("RegionTwo"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::EndpointNotFound { ref service_type, ref endpoint_type }
                if service_type == "orchestration" && endpoint_type == "adminURL"
        ));
    }

    #[test]
    fn body_prefers_username_and_tenant_id() {
        let auth = PasswordAuth {
            auth_url: "http://keystone:5000/v2.0/".into(),
            user_id: Some("u-1".into()),
            username: Some("admin".into()),
            password: SecretString::from("pw"),
            tenant_id: Some("t-1".into()),
            tenant_name: Some("services".into()),
        };
        assert_eq!(auth.token_url(), "http://keystone:5000/v2.0/tokens");
        let body = auth.body();
        assert_eq!(body["auth"]["passwordCredentials"]["username"], "admin");
        assert_eq!(body["auth"]["passwordCredentials"]["password"], "pw");
        assert!(body["auth"]["passwordCredentials"].get("userId").is_none());
        assert_eq!(body["auth"]["tenantId"], "t-1");
        assert!(body["auth"].get("tenantName").is_none());
    }

    #[test]
    fn body_uses_user_id_and_tenant_name_fallbacks() {
        let auth = PasswordAuth {
            auth_url: "http://keystone:5000/v2.0".into(),
            user_id: Some("u-1".into()),
            username: None,
            password: SecretString::from("pw"),
            tenant_id: Some(String::new()),
            tenant_name: Some("services".into()),
        };
        let body = auth.body();
        assert_eq!(body["auth"]["passwordCredentials"]["userId"], "u-1");
        assert_eq!(body["auth"]["tenantName"], "services");
        assert!(body["auth"].get("tenantId").is_none());
    }

    fn keystone_auth(addr: std::net::SocketAddr) -> PasswordAuth {
        PasswordAuth {
            auth_url: format!("http://{addr}/v2.0"),
            user_id: None,
            username: Some("ceilometer".into()),
            password: SecretString::from("pw"),
            tenant_id: Some("t-1".into()),
            tenant_name: None,
        }
    }

    #[tokio::test]
    async fn authenticate_posts_credentials_and_reads_token() {
        let (addr, server) = testing::serve(vec![("200 OK", TOKEN_RESPONSE)]).await;
        let client = IdentityClient::new(reqwest::Client::new());
        let access = client.authenticate(&keystone_auth(addr)).await.unwrap();
        assert_eq!(access.token.expose_secret(), "tok-abc");

        let requests = server.await.unwrap();
        let head = testing::head(&requests[0]);
        assert!(head.starts_with("post /v2.0/tokens http/1.1"));
        assert!(head.contains("accept: application/json"));
        assert!(requests[0].contains(r#""username":"ceilometer""#));
        assert!(requests[0].contains(r#""tenantId":"t-1""#));
    }

    #[tokio::test]
    async fn rejected_credentials_keep_status_and_body() {
        let (addr, server) =
            testing::serve(vec![("401 Unauthorized", r#"{"error": "bad password"}"#)]).await;
        let client = IdentityClient::new(reqwest::Client::new());
        let err = client.authenticate(&keystone_auth(addr)).await.unwrap_err();
        server.await.unwrap();

        match err {
            Error::Status {
                method,
                url,
                status,
                body,
            } => {
                assert_eq!(method, "POST");
                assert_eq!(url, format!("http://{addr}/v2.0/tokens"));
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert_eq!(body, r#"{"error": "bad password"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
