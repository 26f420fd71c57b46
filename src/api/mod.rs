//! Appliance management API client.
//!
//! Every remote call goes through the [`Api`] trait: one logical service,
//! one HTTP verb, one relative path, optional query pairs and JSON body. The
//! production implementation is [`ApiClient`] (reqwest); tests script the
//! replies with `testing::FakeApi`.

pub mod status;

#[cfg(test)]
pub mod testing;

use std::fmt;

use log::debug;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use crate::tls;

/// Longest server error body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

/// Logical API service a path is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Core,
    Appliance,
    Notification,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Core         => "core",
            Service::Appliance    => "appliance",
            Service::Notification => "notification",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call against the appliance API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub service:   Service,
    pub method:    Method,
    pub path:      String,
    pub query:     Vec<(String, String)>,
    pub body:      Option<Value>,
    pub anonymous: bool,
}

impl ApiRequest {
    pub fn new(service: Service, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            anonymous: false,
        }
    }

    pub fn get(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::GET, path)
    }

    pub fn post(service: Service, path: impl Into<String>, body: Value) -> Self {
        Self::new(service, Method::POST, path).body(body)
    }

    pub fn put(service: Service, path: impl Into<String>, body: Value) -> Self {
        Self::new(service, Method::PUT, path).body(body)
    }

    pub fn delete(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send without the bearer token.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// The HTTP collaborator every admin operation is written against.
#[allow(async_fn_in_trait)]
pub trait Api {
    /// Perform the call and return the parsed JSON body (`null` when empty).
    ///
    /// A non-success HTTP status is an [`AdminError::Api`].
    async fn invoke(&self, req: ApiRequest) -> Result<Value>;
}

/// Invoke `req` and deserialize the response body.
pub async fn fetch<T: DeserializeOwned>(api: &impl Api, req: ApiRequest) -> Result<T> {
    let value = api.invoke(req).await?;
    Ok(serde_json::from_value(value)?)
}

/// Invoke `req` and ignore any response body.
pub async fn execute(api: &impl Api, req: ApiRequest) -> Result<()> {
    api.invoke(req).await.map(drop)
}

// ── reqwest implementation ────────────────────────────────────────────────────

/// Authenticated HTTPS client for one appliance.
pub struct ApiClient {
    http:        Client,
    appliance:   String,
    api_version: u32,
    token:       Option<String>,
}

impl ApiClient {
    /// Build the client from the connection and TLS settings in `cfg`.
    pub fn new(cfg: &AdminConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(cfg.request_timeout())
            .user_agent(concat!("appliance-admin/", env!("CARGO_PKG_VERSION")));

        if cfg.insecure {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        } else if let Some(ca_file) = &cfg.ca_file {
            builder = builder.use_preconfigured_tls(tls::build_tls_config(ca_file)?);
        }

        Ok(Self {
            http:        builder.build().map_err(AdminError::Http)?,
            appliance:   cfg.appliance.clone(),
            api_version: cfg.api_version,
            token:       cfg.access_token()?,
        })
    }

    fn url(&self, req: &ApiRequest) -> Result<Url> {
        service_url(&self.appliance, self.api_version, req)
    }
}

/// `https://{appliance}/service/{service}/v{version}/{path}?{query}`
fn service_url(appliance: &str, api_version: u32, req: &ApiRequest) -> Result<Url> {
    let base = format!(
        "https://{appliance}/service/{}/v{api_version}/",
        req.service.as_str()
    );
    let mut url = Url::parse(&base)
        .and_then(|base| base.join(req.path.trim_start_matches('/')))
        .map_err(|e| AdminError::Config(format!("invalid API URL for {}: {e}", req.path)))?;
    if !req.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &req.query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Pull the server's `Message` out of an error body, or echo the body.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(message)) = map.get("Message") {
            return message.clone();
        }
    }
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

impl Api for ApiClient {
    async fn invoke(&self, req: ApiRequest) -> Result<Value> {
        let url = self.url(&req)?;
        debug!("{} {url}", req.method);

        let mut builder = self
            .http
            .request(req.method.clone(), url)
            .header(ACCEPT, "application/json");
        if !req.anonymous {
            let token = self.token.as_deref().ok_or_else(|| {
                AdminError::Config(format!(
                    "an access token is required for {} {}",
                    req.service, req.path
                ))
            })?;
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(AdminError::Api {
                service: req.service.to_string(),
                path:    req.path,
                status:  status.as_u16(),
                message: error_message(&text),
            });
        }
        if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }
}
