//! Error types for the Autoglue SDK.

use std::fmt;

use thiserror::Error;

/// Errors raised while validating client configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Only one half of the org key/secret pair was supplied.
    #[error("both org_key and org_secret must be configured together")]
    PartialOrgCredentials,

    /// No authentication method was supplied.
    #[error("one of api_key, (org_key + org_secret), or bearer_token must be configured")]
    MissingCredentials,

    /// User-scoped auth needs an organization to act in.
    #[error("org_id must be configured when using api_key or bearer_token")]
    MissingOrgId,

    /// A header value contained bytes HTTP does not allow.
    #[error("invalid value for {0}")]
    InvalidHeader(&'static str),

    /// The underlying HTTP client could not be built.
    #[error("build http client: {0}")]
    HttpClient(String),
}

/// Errors returned by calls against the Autoglue API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout or cancelled connection.
    #[error("perform request {method} {path}: {source}")]
    Transport {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The addressed entity does not exist (HTTP 404).
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Any other non-2xx response.
    #[error("autoglue API error {status} on {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },

    /// The response body was not the JSON we expected.
    #[error("decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request body could not be serialized.
    #[error("marshal request: {0}")]
    Encode(#[from] serde_json::Error),

    /// A per-member request inside a multi-request attach failed.
    #[error("member {id}: {source}")]
    Member {
        id: String,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// True when the API answered 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::NotFound { .. } => true,
            ApiError::Member { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Tag the error with the member ID whose request failed.
    pub fn for_member(self, id: impl Into<String>) -> Self {
        ApiError::Member {
            id: id.into(),
            source: Box::new(self),
        }
    }

    /// Member ID attached by [`ApiError::for_member`], if any.
    pub fn member(&self) -> Option<&str> {
        match self {
            ApiError::Member { id, .. } => Some(id),
            _ => None,
        }
    }

    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Member { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Step of a reconciliation pass that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    List,
    Attach,
    Detach,
    Refresh,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::List => "list",
            Phase::Attach => "attach",
            Phase::Detach => "detach",
            Phase::Refresh => "refresh",
        };
        f.write_str(s)
    }
}

/// Errors from a reconciliation pass.
///
/// Every variant names the relation, the parent and the member IDs of the
/// failing call. A failure after earlier calls succeeded leaves the remote
/// relation half-applied; running the pass again computes a fresh diff.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("list {relation} of {parent}: {source}")]
    List {
        relation: &'static str,
        parent: String,
        #[source]
        source: ApiError,
    },

    #[error("attach {relation} [{}] to {parent}: {source}", ids.join(", "))]
    Attach {
        relation: &'static str,
        parent: String,
        ids: Vec<String>,
        #[source]
        source: ApiError,
    },

    #[error("detach {relation} {id} from {parent}: {source}")]
    Detach {
        relation: &'static str,
        parent: String,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("re-read {relation} of {parent} after update: {source}")]
    Refresh {
        relation: &'static str,
        parent: String,
        #[source]
        source: ApiError,
    },
}

impl ReconcileError {
    pub fn phase(&self) -> Phase {
        match self {
            ReconcileError::List { .. } => Phase::List,
            ReconcileError::Attach { .. } => Phase::Attach,
            ReconcileError::Detach { .. } => Phase::Detach,
            ReconcileError::Refresh { .. } => Phase::Refresh,
        }
    }

    pub fn parent(&self) -> &str {
        match self {
            ReconcileError::List { parent, .. }
            | ReconcileError::Attach { parent, .. }
            | ReconcileError::Detach { parent, .. }
            | ReconcileError::Refresh { parent, .. } => parent,
        }
    }

    /// The client error that aborted the pass.
    pub fn api_error(&self) -> &ApiError {
        match self {
            ReconcileError::List { source, .. }
            | ReconcileError::Attach { source, .. }
            | ReconcileError::Detach { source, .. }
            | ReconcileError::Refresh { source, .. } => source,
        }
    }

    /// The parent entity no longer exists.
    ///
    /// Only list-type phases can report this; callers use it to drop the
    /// relation instead of reconciling it.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReconcileError::List { source, .. } | ReconcileError::Refresh { source, .. }
                if source.is_not_found()
        )
    }
}
