//! Client configuration and credential validation.

use std::fmt;

use crate::error::ConfigError;

/// Default API address when neither flag nor environment supplies one.
pub const DEFAULT_ADDR: &str = "http://localhost:8080/api/v1";

pub const ENV_ADDR: &str = "AUTOGLUE_ADDR";
pub const ENV_TOKEN: &str = "AUTOGLUE_TOKEN";
pub const ENV_API_KEY: &str = "AUTOGLUE_API_KEY";
pub const ENV_ORG_KEY: &str = "AUTOGLUE_ORG_KEY";
pub const ENV_ORG_SECRET: &str = "AUTOGLUE_ORG_SECRET";
pub const ENV_ORG_ID: &str = "AUTOGLUE_ORG_ID";

/// Raw connection settings, before validation.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub addr: Option<String>,
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
    pub org_key: Option<String>,
    pub org_secret: Option<String>,
    pub org_id: Option<String>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("addr", &self.addr)
            .field("bearer_token", &redact(&self.bearer_token))
            .field("api_key", &redact(&self.api_key))
            .field("org_key", &redact(&self.org_key))
            .field("org_secret", &redact(&self.org_secret))
            .field("org_id", &self.org_id)
            .finish()
    }
}

fn redact(v: &Option<String>) -> Option<&'static str> {
    v.as_ref().map(|_| "<redacted>")
}

impl ClientConfig {
    /// Read settings from the `AUTOGLUE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).and_then(non_empty);
        Self {
            addr: get(ENV_ADDR),
            bearer_token: get(ENV_TOKEN),
            api_key: get(ENV_API_KEY),
            org_key: get(ENV_ORG_KEY),
            org_secret: get(ENV_ORG_SECRET),
            org_id: get(ENV_ORG_ID),
        }
    }

    /// Overlay explicitly given values on top of `self`.
    pub fn merge(self, overrides: ClientConfig) -> Self {
        Self {
            addr: overrides.addr.or(self.addr),
            bearer_token: overrides.bearer_token.or(self.bearer_token),
            api_key: overrides.api_key.or(self.api_key),
            org_key: overrides.org_key.or(self.org_key),
            org_secret: overrides.org_secret.or(self.org_secret),
            org_id: overrides.org_id.or(self.org_id),
        }
    }

    /// Check the credential combination and normalize the address.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let trimmed = |v: &Option<String>| v.as_deref().map(str::to_string).and_then(non_empty);

        let api_key = trimmed(&self.api_key);
        let org_key = trimmed(&self.org_key);
        let org_secret = trimmed(&self.org_secret);
        let bearer_token = trimmed(&self.bearer_token);
        let org_id = trimmed(&self.org_id);

        if org_key.is_some() != org_secret.is_some() {
            return Err(ConfigError::PartialOrgCredentials);
        }
        if api_key.is_none() && org_key.is_none() && bearer_token.is_none() {
            return Err(ConfigError::MissingCredentials);
        }

        let needs_org_id = api_key.is_some() || bearer_token.is_some();
        if needs_org_id && org_id.is_none() {
            return Err(ConfigError::MissingOrgId);
        }

        Ok(Settings {
            base_url: normalize_base_url(self.addr.as_deref().unwrap_or(DEFAULT_ADDR)),
            auth: Auth {
                org_id: if needs_org_id { org_id } else { None },
                api_key,
                org_key,
                org_secret,
                bearer_token,
            },
        })
    }
}

/// Validated settings ready to build a client from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub auth: Auth,
}

/// Credentials attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Auth {
    /// Sent as `X-Org-ID`; only set for api key / bearer auth.
    pub org_id: Option<String>,
    pub api_key: Option<String>,
    pub org_key: Option<String>,
    pub org_secret: Option<String>,
    pub bearer_token: Option<String>,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("org_id", &self.org_id)
            .field("api_key", &redact(&self.api_key))
            .field("org_key", &redact(&self.org_key))
            .field("org_secret", &redact(&self.org_secret))
            .field("bearer_token", &redact(&self.bearer_token))
            .finish()
    }
}

fn non_empty(v: String) -> Option<String> {
    let v = v.trim();
    if v.is_empty() { None } else { Some(v.to_string()) }
}

/// Trim, default the scheme to https and drop trailing slashes.
pub fn normalize_base_url(addr: &str) -> String {
    let addr = addr.trim();
    let addr = if addr.is_empty() { DEFAULT_ADDR } else { addr };
    let with_scheme = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("https://{}", addr)
    };
    with_scheme.trim_end_matches('/').to_string()
}
