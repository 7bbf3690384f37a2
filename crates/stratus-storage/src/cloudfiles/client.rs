use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use stratus_core::constants::DEFAULT_USERAGENT;
use stratus_core::{DriverConfig, ObjectEntry};

use super::{CloudFilesApi, CloudFilesConnector, ObjectProbe};
use crate::backend::{BackendError, BackendResult};

const DEFAULT_AUTH_URL: &str = "https://identity.api.rackspacecloud.com/v2.0/tokens";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const AUTH_TOKEN: &str = "X-Auth-Token";
const COPY_FROM: &str = "X-Copy-From";
const CDN_ENABLED: &str = "X-CDN-Enabled";
const CDN_TTL: &str = "X-TTL";
const CDN_URI: &str = "X-Cdn-Uri";

/// Percent-encode each segment of an object key, keeping `/` separators.
pub(crate) fn encode_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

/// Map a non-success HTTP status onto the backend categories.
fn check(response: Response, context: &str) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = format!("{} returned HTTP {}", context, status.as_u16());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Authentication(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::CONFLICT => BackendError::NotEmpty(message),
        s if s.is_server_error() => BackendError::Transport(message),
        _ => BackendError::Rejected(message),
    })
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<Service>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    name: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

impl Access {
    /// Public URL of a catalog service, preferring `region` when given.
    fn endpoint(&self, service: &str, region: Option<&str>) -> Option<String> {
        let endpoints = &self
            .service_catalog
            .iter()
            .find(|s| s.name == service)?
            .endpoints;

        region
            .and_then(|region| {
                endpoints.iter().find(|e| {
                    e.region
                        .as_deref()
                        .is_some_and(|r| r.eq_ignore_ascii_case(region))
                })
            })
            .or_else(|| endpoints.first())
            .map(|e| e.public_url.trim_end_matches('/').to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    bytes: u64,
}

/// Authenticates against the Rackspace identity service (v2.0, API key
/// credentials) and talks to CloudFiles with the resulting token.
///
/// Extra keys: `auth_url`, `region`.
#[derive(Debug, Clone)]
pub struct RackspaceConnector {
    http: Client,
}

impl RackspaceConnector {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl Default for RackspaceConnector {
    fn default() -> Self {
        Self::new(
            Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl CloudFilesConnector for RackspaceConnector {
    async fn connect(&self, config: &DriverConfig) -> BackendResult<Box<dyn CloudFilesApi>> {
        let auth_url = config.extra_str("auth_url").unwrap_or(DEFAULT_AUTH_URL);
        let useragent = if config.useragent.is_empty() {
            DEFAULT_USERAGENT.to_string()
        } else {
            config.useragent.clone()
        };

        let body = serde_json::json!({
            "auth": {
                "RAX-KSKEY:apiKeyCredentials": {
                    "username": config.access_key,
                    "apiKey": config.access_secret,
                }
            }
        });

        let response = self
            .http
            .post(auth_url)
            .header(USER_AGENT, &useragent)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        // Any identity rejection is an authentication failure
        let response = match check(response, "Identity service") {
            Ok(response) => response,
            Err(BackendError::Transport(message)) => return Err(BackendError::Transport(message)),
            Err(other) => return Err(BackendError::Authentication(other.to_string())),
        };

        let auth: AuthResponse = response.json().await.map_err(transport)?;
        let region = config.extra_str("region");

        let storage_url = auth.access.endpoint("cloudFiles", region).ok_or_else(|| {
            BackendError::Authentication("No cloudFiles endpoint in service catalog".to_string())
        })?;
        let cdn_url = auth.access.endpoint("cloudFilesCDN", region);

        Ok(Box::new(RackspaceSession {
            http: self.http.clone(),
            token: auth.access.token.id,
            useragent,
            storage_url,
            cdn_url,
        }))
    }
}

struct RackspaceSession {
    http: Client,
    token: String,
    useragent: String,
    storage_url: String,
    cdn_url: Option<String>,
}

impl RackspaceSession {
    fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.storage_url, urlencoding::encode(container))
    }

    fn object_url(&self, container: &str, key: &str) -> String {
        format!("{}/{}", self.container_url(container), encode_path(key))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTH_TOKEN, &self.token)
            .header(USER_AGENT, &self.useragent)
    }
}

#[async_trait]
impl CloudFilesApi for RackspaceSession {
    async fn create_container(&self, name: &str) -> BackendResult<()> {
        let response = self
            .request(reqwest::Method::PUT, &self.container_url(name))
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(transport)?;
        check(response, "Create container")?;
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> BackendResult<()> {
        let response = self
            .request(reqwest::Method::DELETE, &self.container_url(name))
            .send()
            .await
            .map_err(transport)?;
        check(response, "Delete container")?;
        Ok(())
    }

    async fn make_public(&self, name: &str, ttl: u32) -> BackendResult<String> {
        let cdn_url = self
            .cdn_url
            .as_deref()
            .ok_or_else(|| BackendError::Rejected("CDN is not available for this account".into()))?;

        // The container has to exist before it can be CDN-enabled
        let response = self
            .request(reqwest::Method::HEAD, &self.container_url(name))
            .send()
            .await
            .map_err(transport)?;
        check(response, "Container lookup")?;

        let cdn_container = format!("{}/{}", cdn_url, urlencoding::encode(name));
        let response = self
            .request(reqwest::Method::PUT, &cdn_container)
            .header(CDN_ENABLED, "True")
            .header(CDN_TTL, ttl)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(transport)?;
        let response = check(response, "CDN enable")?;

        let uri = match header(&response, CDN_URI) {
            Some(uri) => uri,
            None => {
                let response = self
                    .request(reqwest::Method::HEAD, &cdn_container)
                    .send()
                    .await
                    .map_err(transport)?;
                let response = check(response, "CDN lookup")?;
                header(&response, CDN_URI).ok_or_else(|| {
                    BackendError::Transport("CDN response carried no X-Cdn-Uri".to_string())
                })?
            }
        };

        Ok(uri)
    }

    async fn list_objects(
        &self,
        container: &str,
        limit: usize,
        prefix: Option<&str>,
    ) -> BackendResult<Vec<ObjectEntry>> {
        let mut query = vec![("format", "json".to_string()), ("limit", limit.to_string())];
        if let Some(prefix) = prefix {
            query.push(("prefix", prefix.to_string()));
        }

        let response = self
            .request(reqwest::Method::GET, &self.container_url(container))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;
        let response = check(response, "List objects")?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let listed: Vec<ListedObject> = response.json().await.map_err(transport)?;
        Ok(listed
            .into_iter()
            .map(|o| ObjectEntry::from_key(o.name, o.bytes))
            .collect())
    }

    async fn put_object(&self, container: &str, key: &str, body: Bytes) -> BackendResult<()> {
        let response = self
            .request(reqwest::Method::PUT, &self.object_url(container, key))
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        check(response, "Upload object")?;
        Ok(())
    }

    async fn delete_object(&self, container: &str, key: &str) -> BackendResult<()> {
        let response = self
            .request(reqwest::Method::DELETE, &self.object_url(container, key))
            .send()
            .await
            .map_err(transport)?;
        check(response, "Delete object")?;
        Ok(())
    }

    async fn copy_object(
        &self,
        from_container: &str,
        key: &str,
        to_container: &str,
        new_key: &str,
    ) -> BackendResult<()> {
        let source = format!("/{}/{}", urlencoding::encode(from_container), encode_path(key));
        let response = self
            .request(reqwest::Method::PUT, &self.object_url(to_container, new_key))
            .header(COPY_FROM, source)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(transport)?;
        check(response, "Copy object")?;
        Ok(())
    }
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

/// HEAD probe over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    http: Client,
}

impl HttpProbe {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(
            Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(DEFAULT_USERAGENT)
                .build()
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl ObjectProbe for HttpProbe {
    async fn status(&self, url: &str, useragent: &str) -> BackendResult<u16> {
        let response = self
            .http
            .head(url)
            .header(USER_AGENT, useragent)
            .send()
            .await
            .map_err(transport)?;
        Ok(response.status().as_u16())
    }
}
