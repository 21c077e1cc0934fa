//! HTTP client for the Autoglue REST API.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{Auth, ClientConfig, Settings};
use crate::error::{ApiError, ConfigError};

/// Request timeout applied to every call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Response bodies longer than this are cut off.
const MAX_BODY: usize = 1 << 20;

/// Client for the Autoglue API.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct AutoglueClient {
    base_url: String,
    http: reqwest::Client,
}

impl AutoglueClient {
    /// Validate `config` and build a client from it.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::new(config.validate()?)
    }

    pub fn new(settings: Settings) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(auth_headers(&settings.auth)?)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: settings.base_url,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_json_query(path, &[]).await
    }

    /// GET `path` with query parameters and decode the JSON response.
    pub async fn get_json_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, query, None).await?;
        decode(path, &body)
    }

    /// POST a JSON body, ignoring whatever comes back.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let payload = serde_json::to_vec(body)?;
        self.send(Method::POST, path, &[], Some(payload)).await?;
        Ok(())
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let payload = serde_json::to_vec(body)?;
        let resp = self.send(Method::POST, path, &[], Some(payload)).await?;
        decode(path, &resp)
    }

    /// PATCH a JSON body and decode the JSON response.
    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let payload = serde_json::to_vec(body)?;
        let resp = self.send(Method::PATCH, path, &[], Some(payload)).await?;
        decode(path, &resp)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError> {
        debug!(%method, path, "autoglue request");

        let transport = |source| ApiError::Transport {
            method: method.to_string(),
            path: path.to_string(),
            source,
        };

        let mut req = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        let resp = req.send().await.map_err(transport)?;
        let status = resp.status();
        let bytes = read_capped(resp).await.map_err(transport)?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes)
    }
}

/// Read at most [`MAX_BODY`] bytes of the response; the rest is dropped unread.
async fn read_capped(mut resp: reqwest::Response) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let room = MAX_BODY - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Decode a response body. An empty body decodes like JSON `null`.
fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

fn auth_headers(auth: &Auth) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut put = |name: HeaderName, label: &'static str, value: String| {
        let mut value =
            HeaderValue::from_str(&value).map_err(|_| ConfigError::InvalidHeader(label))?;
        value.set_sensitive(name != HeaderName::from_static("x-org-id"));
        headers.insert(name, value);
        Ok::<_, ConfigError>(())
    };

    if let Some(org_id) = &auth.org_id {
        put(HeaderName::from_static("x-org-id"), "org_id", org_id.clone())?;
    }
    if let Some(key) = &auth.api_key {
        put(HeaderName::from_static("x-api-key"), "api_key", key.clone())?;
    }
    if let Some(key) = &auth.org_key {
        put(HeaderName::from_static("x-org-key"), "org_key", key.clone())?;
    }
    if let Some(secret) = &auth.org_secret {
        put(
            HeaderName::from_static("x-org-secret"),
            "org_secret",
            secret.clone(),
        )?;
    }
    if let Some(token) = &auth.bearer_token {
        put(AUTHORIZATION, "bearer_token", format!("Bearer {}", token))?;
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Auth {
        Auth {
            org_id: Some("org-1".into()),
            api_key: Some("key".into()),
            org_key: None,
            org_secret: None,
            bearer_token: Some("tok".into()),
        }
    }

    #[test]
    fn headers_carry_credentials() {
        let headers = auth_headers(&auth()).unwrap();
        assert_eq!(headers["x-org-id"], "org-1");
        assert_eq!(headers["x-api-key"], "key");
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert!(!headers.contains_key("x-org-key"));
    }

    #[test]
    fn header_values_are_checked() {
        let mut bad = auth();
        bad.api_key = Some("line\nbreak".into());
        assert_eq!(
            auth_headers(&bad).unwrap_err(),
            ConfigError::InvalidHeader("api_key")
        );
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let v: Option<String> = decode("/x", b"").unwrap();
        assert_eq!(v, None);
        let err = decode::<Vec<String>>("/x", b"{").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
