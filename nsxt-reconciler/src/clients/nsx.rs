//! Client for the NSX-T manager REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;
use crate::remote::{ApiResponse, RemoteApi};
use crate::resources::{
    DhcpRelayProfileObject, NsGroupObject, SpoofGuardSwitchingProfileObject,
    spoofguard_switching_profile,
};

/// Connection settings for an NSX manager.
#[derive(Debug, Clone)]
pub struct NsxConfig {
    /// Manager host name or address, optionally with scheme and port.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Accept self-signed or otherwise unverifiable certificates.
    pub allow_unverified_ssl: bool,
    /// Per-request timeout enforced by the transport.
    pub timeout: Duration,
}

impl NsxConfig {
    /// Base URL of the v1 API. A bare host gets `https://`.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/api/v1", host)
        } else {
            format!("https://{}/api/v1", host)
        }
    }
}

/// REST location of one object type.
pub trait Endpoint: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection path below `/api/v1`, e.g. `/dhcp/relay-profiles`.
    const COLLECTION: &'static str;

    /// Extra query parameters when listing the collection.
    const LIST_QUERY: &'static [(&'static str, &'static str)] = &[];

    /// Extra query parameters when reading one object.
    const READ_QUERY: &'static [(&'static str, &'static str)] = &[];
}

impl Endpoint for DhcpRelayProfileObject {
    const COLLECTION: &'static str = "/dhcp/relay-profiles";
}

impl Endpoint for SpoofGuardSwitchingProfileObject {
    const COLLECTION: &'static str = "/switching-profiles";
    const LIST_QUERY: &'static [(&'static str, &'static str)] = &[(
        "switching_profile_type",
        spoofguard_switching_profile::RESOURCE_TYPE,
    )];
}

impl Endpoint for NsGroupObject {
    const COLLECTION: &'static str = "/ns-groups";
    const READ_QUERY: &'static [(&'static str, &'static str)] = &[("populate_references", "true")];
}

/// One page of a list response.
#[derive(serde::Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    cursor: Option<String>,
}

/// NSX manager client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct NsxClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl NsxClient {
    pub fn new(config: &NsxConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn collection_url<O: Endpoint>(&self) -> String {
        format!("{}{}", self.base_url, O::COLLECTION)
    }

    fn item_url<O: Endpoint>(&self, id: &str) -> String {
        format!("{}{}/{}", self.base_url, O::COLLECTION, id)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.username, Some(&self.password))
    }

    /// Decode a response: body on success, error message otherwise.
    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<ApiResponse<T>, TransportError> {
        let status = resp.status();
        if status.is_success() {
            let bytes = resp.bytes().await?;
            if bytes.is_empty() {
                return Ok(ApiResponse::status(status));
            }
            // An undecodable success body still means the call took effect.
            return Ok(match serde_json::from_slice(&bytes) {
                Ok(body) => ApiResponse::new(status, body),
                Err(e) => {
                    ApiResponse::status(status).with_message(format!("invalid response body: {e}"))
                }
            });
        }

        let text = resp.text().await.unwrap_or_default();
        let mut out = ApiResponse::status(status);
        if let Some(message) = error_message(&text) {
            out = out.with_message(message);
        }
        Ok(out)
    }
}

/// Extract `error_message` from an NSX error body, falling back to the raw text.
fn error_message(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(v) => v
            .get("error_message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(text.to_string())),
        Err(_) => Some(text.to_string()),
    }
}

#[async_trait]
impl<O: Endpoint> RemoteApi<O> for NsxClient {
    async fn create(&self, payload: &O) -> Result<ApiResponse<O>, TransportError> {
        let url = self.collection_url::<O>();
        debug!("POST {}", url);
        let resp = self.authed(self.http.post(&url)).json(payload).send().await?;
        Self::decode(resp).await
    }

    async fn read(&self, id: &str) -> Result<ApiResponse<O>, TransportError> {
        let url = self.item_url::<O>(id);
        debug!("GET {}", url);
        let resp = self
            .authed(self.http.get(&url))
            .query(O::READ_QUERY)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn list(&self) -> Result<ApiResponse<Vec<O>>, TransportError> {
        let url = self.collection_url::<O>();
        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            debug!("GET {} (cursor {:?})", url, cursor);
            let mut req = self.authed(self.http.get(&url)).query(O::LIST_QUERY);
            if let Some(c) = &cursor {
                req = req.query(&[("cursor", c.as_str())]);
            }
            let page: ApiResponse<ListPage<O>> = Self::decode(req.send().await?).await?;
            if page.status != StatusCode::OK {
                return Ok(ApiResponse {
                    status: page.status,
                    body: None,
                    message: page.message,
                });
            }
            let page = match page.body {
                Some(body) => body,
                // A garbled page must not pass for the end of the listing.
                None if page.message.is_some() => {
                    return Ok(ApiResponse {
                        status: page.status,
                        body: None,
                        message: page.message,
                    });
                }
                // An empty page ends the walk.
                None => break,
            };
            objects.extend(page.results);
            match page.cursor.filter(|c| !c.is_empty()) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(ApiResponse::ok(objects))
    }

    async fn update(&self, id: &str, payload: &O) -> Result<ApiResponse<O>, TransportError> {
        let url = self.item_url::<O>(id);
        debug!("PUT {}", url);
        let resp = self.authed(self.http.put(&url)).json(payload).send().await?;
        Self::decode(resp).await
    }

    async fn delete(&self, id: &str) -> Result<ApiResponse<()>, TransportError> {
        let url = self.item_url::<O>(id);
        debug!("DELETE {}", url);
        let resp = self.authed(self.http.delete(&url)).send().await?;
        let status = resp.status();
        let mut out = ApiResponse::status(status);
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if let Some(message) = error_message(&text) {
                out = out.with_message(message);
            }
        }
        Ok(out)
    }
}
