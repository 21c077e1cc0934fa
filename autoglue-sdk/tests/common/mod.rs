//! In-process mock of the Autoglue API for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use autoglue_sdk::{AutoglueClient, ClientConfig};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Collections served with generic CRUD semantics.
const COLLECTIONS: &[&str] = &[
    "servers",
    "ssh",
    "taints",
    "labels",
    "annotations",
    "node-pools",
    "clusters",
    "dns/domains",
    "dns/records",
    "credentials",
];

const SLOTS: &[(&str, &str, &str)] = &[
    ("captain-domain", "captain_domain", "domain_id"),
    ("control-plane-record-set", "control_plane_record_set", "record_set_id"),
    ("apps-load-balancer", "apps_load_balancer", "load_balancer_id"),
    ("glueops-load-balancer", "glueops_load_balancer", "load_balancer_id"),
    ("bastion", "bastion_server", "server_id"),
];

/// A request as seen by the mock.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Default)]
pub struct MockState {
    /// collection -> id -> object
    pub entities: HashMap<String, BTreeMap<String, Value>>,
    /// (node pool, member segment) -> member ids
    pub pool_members: HashMap<(String, String), BTreeSet<String>>,
    /// cluster -> attached node pools
    pub cluster_pools: HashMap<String, BTreeSet<String>>,
    /// (cluster, slot segment) -> id
    pub cluster_slots: HashMap<(String, String), String>,
    pub kubeconfigs: HashMap<String, String>,
    /// "METHOD /path" -> status to answer with instead of handling
    pub failures: HashMap<String, u16>,
    /// node pools the mock refuses to attach to any cluster
    pub rejected_pools: BTreeSet<String>,
    /// "METHOD /path" -> canned JSON body returned with 200
    pub canned: HashMap<String, Value>,
    pub requests: Vec<Recorded>,
}

pub type Shared = Arc<Mutex<MockState>>;

/// Test server wrapper around the mock API.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Shared,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let router = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// Client using user API key auth.
    pub fn client(&self) -> AutoglueClient {
        AutoglueClient::from_config(&ClientConfig {
            addr: Some(self.base_url()),
            api_key: Some("test-key".into()),
            org_id: Some("org-1".into()),
            ..Default::default()
        })
        .expect("valid config")
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_node_pool(&self, id: &str) {
        self.with_state(|s| {
            s.entities
                .entry("node-pools".into())
                .or_default()
                .insert(id.into(), json!({"id": id, "name": id}));
        });
    }

    pub fn add_cluster(&self, id: &str) {
        self.with_state(|s| {
            s.entities
                .entry("clusters".into())
                .or_default()
                .insert(id.into(), json!({"id": id, "name": id}));
        });
    }

    pub fn set_pool_members(&self, pool: &str, segment: &str, ids: &[&str]) {
        self.with_state(|s| {
            s.pool_members.insert(
                (pool.into(), segment.into()),
                ids.iter().map(|i| i.to_string()).collect(),
            );
        });
    }

    pub fn pool_members(&self, pool: &str, segment: &str) -> BTreeSet<String> {
        self.with_state(|s| {
            s.pool_members
                .get(&(pool.to_string(), segment.to_string()))
                .cloned()
                .unwrap_or_default()
        })
    }

    pub fn fail(&self, method: &str, path: &str, status: u16) {
        self.with_state(|s| {
            s.failures.insert(format!("{} {}", method, path), status);
        });
    }

    pub fn clear_failures(&self) {
        self.with_state(|s| {
            s.failures.clear();
            s.rejected_pools.clear();
        });
    }

    /// Answer cluster attach requests for `pool` with a 500.
    pub fn reject_pool(&self, pool: &str) {
        self.with_state(|s| {
            s.rejected_pools.insert(pool.to_string());
        });
    }

    /// Answer `method path` with `body` instead of the modelled state.
    pub fn respond(&self, method: &str, path: &str, body: Value) {
        self.with_state(|s| {
            s.canned.insert(format!("{} {}", method, path), body);
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.with_state(|s| s.requests.clone())
    }

    /// Number of recorded requests with `method` whose path starts with `prefix`.
    pub fn count(&self, method: &str, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method.as_str() == method && r.path.starts_with(prefix))
            .count()
    }

    pub fn reset_requests(&self) {
        self.with_state(|s| s.requests.clear());
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "error": msg.into() }))).into_response()
}

fn not_found(what: &str) -> Response {
    error(StatusCode::NOT_FOUND, format!("{} not found", what))
}

fn ok(value: Value) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix("/api/v1")
        .unwrap_or(uri.path())
        .to_string();
    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    };

    let mut s = state.lock().unwrap();
    s.requests.push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers,
        body: body.clone(),
    });

    if let Some(status) = s.failures.get(&format!("{} {}", method, path)) {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return error(status, "injected failure");
    }
    if let Some(body) = s.canned.get(&format!("{} {}", method, path)) {
        return ok(body.clone());
    }

    let segs: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method.clone(), segs.as_slice()) {
        (Method::GET, ["node-pools", pool, seg]) => {
            if !exists(&s, "node-pools", pool) {
                return not_found("node pool");
            }
            let ids = s
                .pool_members
                .get(&(pool.to_string(), seg.to_string()))
                .cloned()
                .unwrap_or_default();
            ok(Value::from(
                ids.into_iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
            ))
        }
        (Method::POST, ["node-pools", pool, seg]) => {
            if !exists(&s, "node-pools", pool) {
                return not_found("node pool");
            }
            let key = format!("{}_ids", seg.trim_end_matches('s'));
            let Some(ids) = body.get(&key).and_then(Value::as_array) else {
                return error(StatusCode::BAD_REQUEST, format!("missing {}", key));
            };
            let ids: Vec<String> = ids
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            s.pool_members
                .entry((pool.to_string(), seg.to_string()))
                .or_default()
                .extend(ids);
            no_content()
        }
        (Method::DELETE, ["node-pools", pool, seg, id]) => {
            let removed = s
                .pool_members
                .get_mut(&(pool.to_string(), seg.to_string()))
                .map(|m| m.remove(*id))
                .unwrap_or(false);
            if removed {
                no_content()
            } else {
                not_found("attachment")
            }
        }
        (Method::GET, ["clusters", id]) => match cluster_json(&s, id) {
            Some(v) => ok(v),
            None => not_found("cluster"),
        },
        (Method::POST, ["clusters", id, "node-pools"]) => {
            if !exists(&s, "clusters", id) {
                return not_found("cluster");
            }
            let Some(np) = body.get("node_pool_id").and_then(Value::as_str) else {
                return error(StatusCode::BAD_REQUEST, "missing node_pool_id");
            };
            let np = np.to_string();
            if s.rejected_pools.contains(&np) {
                return error(StatusCode::INTERNAL_SERVER_ERROR, format!("cannot attach {}", np));
            }
            s.cluster_pools.entry(id.to_string()).or_default().insert(np);
            no_content()
        }
        (Method::DELETE, ["clusters", id, "node-pools", np]) => {
            let removed = s
                .cluster_pools
                .get_mut(*id)
                .map(|m| m.remove(*np))
                .unwrap_or(false);
            if removed {
                no_content()
            } else {
                not_found("attachment")
            }
        }
        (Method::POST, ["clusters", id, "kubeconfig"]) => {
            let Some(k) = body.get("kubeconfig").and_then(Value::as_str) else {
                return error(StatusCode::BAD_REQUEST, "missing kubeconfig");
            };
            let k = k.to_string();
            s.kubeconfigs.insert(id.to_string(), k);
            no_content()
        }
        (Method::DELETE, ["clusters", id, "kubeconfig"]) => {
            match s.kubeconfigs.remove(*id) {
                Some(_) => no_content(),
                None => not_found("kubeconfig"),
            }
        }
        (Method::POST, ["clusters", id, slot]) => {
            let Some((_, _, key)) = SLOTS.iter().find(|(seg, _, _)| seg == slot) else {
                return not_found("route");
            };
            if !exists(&s, "clusters", id) {
                return not_found("cluster");
            }
            let Some(value) = body.get(*key).and_then(Value::as_str) else {
                return error(StatusCode::BAD_REQUEST, format!("missing {}", key));
            };
            let value = value.to_string();
            s.cluster_slots
                .insert((id.to_string(), slot.to_string()), value);
            match cluster_json(&s, id) {
                Some(v) => ok(v),
                None => not_found("cluster"),
            }
        }
        (Method::DELETE, ["clusters", id, slot]) if SLOTS.iter().any(|(seg, _, _)| seg == slot) => {
            match s.cluster_slots.remove(&(id.to_string(), slot.to_string())) {
                Some(_) => no_content(),
                None => not_found("attachment"),
            }
        }
        (Method::GET, ["ssh", id, "download"]) => {
            if !exists(&s, "ssh", id) {
                return not_found("ssh key");
            }
            let part = uri
                .query()
                .and_then(|q| q.strip_prefix("part="))
                .unwrap_or("public")
                .to_string();
            ok(Value::from(format!("{}-key-material-{}", part, id)))
        }
        (Method::GET, ["dns", "domains", domain, "records"]) => {
            let records: Vec<Value> = s
                .entities
                .get("dns/records")
                .map(|m| {
                    m.values()
                        .filter(|r| r["domain_id"] == *domain)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            ok(Value::from(records))
        }
        (Method::POST, ["dns", "domains", domain, "records"]) => {
            if !exists(&s, "dns/domains", domain) {
                return not_found("domain");
            }
            let mut record = body;
            record["domain_id"] = Value::from(domain.to_string());
            ok(insert(&mut s, "dns/records", record))
        }
        _ => crud(&mut s, &method, &segs, body),
    }
}

fn exists(s: &MockState, collection: &str, id: &str) -> bool {
    s.entities
        .get(collection)
        .is_some_and(|m| m.contains_key(id))
}

fn insert(s: &mut MockState, collection: &str, mut value: Value) -> Value {
    let id = uuid::Uuid::new_v4().to_string();
    value["id"] = Value::from(id.clone());
    s.entities
        .entry(collection.to_string())
        .or_default()
        .insert(id, value.clone());
    value
}

fn cluster_json(s: &MockState, id: &str) -> Option<Value> {
    let mut cluster = s.entities.get("clusters")?.get(id)?.clone();
    let pools: Vec<Value> = s
        .cluster_pools
        .get(id)
        .map(|p| p.iter().map(|np| json!({ "id": np, "name": np })).collect())
        .unwrap_or_default();
    cluster["node_pools"] = Value::from(pools);
    for (seg, field, _) in SLOTS {
        cluster[*field] = match s.cluster_slots.get(&(id.to_string(), seg.to_string())) {
            Some(v) => json!({ "id": v }),
            None => Value::Null,
        };
    }
    Some(cluster)
}

/// Generic collection handling: list/create on the collection, get/patch/delete on items.
fn crud(s: &mut MockState, method: &Method, segs: &[&str], body: Value) -> Response {
    let joined = segs.join("/");
    let Some(collection) = COLLECTIONS
        .iter()
        .find(|c| joined == **c || joined.starts_with(&format!("{}/", c)))
    else {
        return not_found("route");
    };
    let rest: Vec<&str> = joined[collection.len()..]
        .trim_start_matches('/')
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();

    match (method.clone(), rest.as_slice()) {
        (Method::GET, []) => ok(Value::from(
            s.entities
                .get(*collection)
                .map(|m| m.values().cloned().collect::<Vec<_>>())
                .unwrap_or_default(),
        )),
        (Method::POST, []) => ok(insert(s, collection, body)),
        (Method::GET, [id]) => match s.entities.get(*collection).and_then(|m| m.get(*id)) {
            Some(v) => ok(v.clone()),
            None => not_found(collection),
        },
        (Method::PATCH, [id]) => {
            match s.entities.get_mut(*collection).and_then(|m| m.get_mut(*id)) {
                Some(existing) => {
                    if let (Some(obj), Some(patch)) = (existing.as_object_mut(), body.as_object())
                    {
                        for (k, v) in patch {
                            obj.insert(k.clone(), v.clone());
                        }
                    }
                    ok(existing.clone())
                }
                None => not_found(collection),
            }
        }
        (Method::DELETE, [id]) => match s.entities.get_mut(*collection).and_then(|m| m.remove(*id)) {
            Some(_) => no_content(),
            None => not_found(collection),
        },
        _ => not_found("route"),
    }
}
