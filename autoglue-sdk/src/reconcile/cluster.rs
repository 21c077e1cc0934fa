//! Single-valued cluster attachments (captain domain, load balancers, ...).

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::client::AutoglueClient;
use crate::error::ApiError;
use crate::types::{Cluster, Ref};

/// A cluster attachment that holds at most one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterSlot {
    CaptainDomain,
    ControlPlaneRecordSet,
    AppsLoadBalancer,
    GlueopsLoadBalancer,
    Bastion,
}

impl ClusterSlot {
    pub const ALL: [ClusterSlot; 5] = [
        ClusterSlot::CaptainDomain,
        ClusterSlot::ControlPlaneRecordSet,
        ClusterSlot::AppsLoadBalancer,
        ClusterSlot::GlueopsLoadBalancer,
        ClusterSlot::Bastion,
    ];

    /// Path segment under `/clusters/{id}/`.
    pub fn segment(self) -> &'static str {
        match self {
            ClusterSlot::CaptainDomain => "captain-domain",
            ClusterSlot::ControlPlaneRecordSet => "control-plane-record-set",
            ClusterSlot::AppsLoadBalancer => "apps-load-balancer",
            ClusterSlot::GlueopsLoadBalancer => "glueops-load-balancer",
            ClusterSlot::Bastion => "bastion",
        }
    }

    fn payload_key(self) -> &'static str {
        match self {
            ClusterSlot::CaptainDomain => "domain_id",
            ClusterSlot::ControlPlaneRecordSet => "record_set_id",
            ClusterSlot::AppsLoadBalancer | ClusterSlot::GlueopsLoadBalancer => "load_balancer_id",
            ClusterSlot::Bastion => "server_id",
        }
    }

    /// The slot's value as embedded in a cluster response.
    pub fn current(self, cluster: &Cluster) -> Option<&Ref> {
        match self {
            ClusterSlot::CaptainDomain => cluster.captain_domain.as_ref(),
            ClusterSlot::ControlPlaneRecordSet => cluster.control_plane_record_set.as_ref(),
            ClusterSlot::AppsLoadBalancer => cluster.apps_load_balancer.as_ref(),
            ClusterSlot::GlueopsLoadBalancer => cluster.glueops_load_balancer.as_ref(),
            ClusterSlot::Bastion => cluster.bastion_server.as_ref(),
        }
    }
}

/// Reads and sets the single-valued attachments of clusters.
#[derive(Debug, Clone)]
pub struct ClusterAttachments {
    client: AutoglueClient,
}

impl ClusterAttachments {
    pub fn new(client: AutoglueClient) -> Self {
        Self { client }
    }

    async fn cluster(&self, cluster_id: &str) -> Result<Cluster, ApiError> {
        self.client
            .get_json(&format!("/clusters/{}", cluster_id))
            .await
    }

    /// ID currently held by `slot`, if any.
    pub async fn get(&self, cluster_id: &str, slot: ClusterSlot) -> Result<Option<String>, ApiError> {
        let cluster = self.cluster(cluster_id).await?;
        Ok(slot.current(&cluster).map(|r| r.id.clone()))
    }

    /// Point `slot` at `id`. Returns false when it already did.
    pub async fn set(&self, cluster_id: &str, slot: ClusterSlot, id: &str) -> Result<bool, ApiError> {
        if self.get(cluster_id, slot).await?.as_deref() == Some(id) {
            debug!(cluster_id, slot = slot.segment(), "attachment unchanged");
            return Ok(false);
        }

        info!("Attaching {} {} to cluster {}", slot.segment(), id, cluster_id);
        let mut body = Map::new();
        body.insert(slot.payload_key().to_string(), Value::from(id));
        self.client
            .post(
                &format!("/clusters/{}/{}", cluster_id, slot.segment()),
                &Value::Object(body),
            )
            .await?;
        Ok(true)
    }

    /// Empty `slot`. Clearing an empty slot succeeds.
    pub async fn clear(&self, cluster_id: &str, slot: ClusterSlot) -> Result<(), ApiError> {
        info!("Detaching {} from cluster {}", slot.segment(), cluster_id);
        ignore_not_found(
            self.client
                .delete(&format!("/clusters/{}/{}", cluster_id, slot.segment()))
                .await,
        )
    }

    /// Upload a kubeconfig. The API never returns it, so this always writes.
    pub async fn set_kubeconfig(&self, cluster_id: &str, kubeconfig: &str) -> Result<(), ApiError> {
        info!("Setting kubeconfig of cluster {}", cluster_id);
        self.client
            .post(
                &format!("/clusters/{}/kubeconfig", cluster_id),
                &serde_json::json!({ "kubeconfig": kubeconfig }),
            )
            .await
    }

    pub async fn clear_kubeconfig(&self, cluster_id: &str) -> Result<(), ApiError> {
        info!("Removing kubeconfig of cluster {}", cluster_id);
        ignore_not_found(
            self.client
                .delete(&format!("/clusters/{}/kubeconfig", cluster_id))
                .await,
        )
    }
}

fn ignore_not_found(res: Result<(), ApiError>) -> Result<(), ApiError> {
    match res {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

impl AutoglueClient {
    pub fn cluster_attachments(&self) -> ClusterAttachments {
        ClusterAttachments::new(self.clone())
    }
}
