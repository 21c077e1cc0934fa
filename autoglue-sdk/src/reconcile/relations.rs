//! Attachment clients for the many-to-many relations of node pools and clusters.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{AttachmentClient, Reconciler};
use crate::client::AutoglueClient;
use crate::error::ApiError;
use crate::types::{Cluster, IdOnly};

/// Member kinds that can be attached to a node pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePoolMember {
    Servers,
    Taints,
    Labels,
    Annotations,
}

impl NodePoolMember {
    pub const ALL: [NodePoolMember; 4] = [
        NodePoolMember::Servers,
        NodePoolMember::Taints,
        NodePoolMember::Labels,
        NodePoolMember::Annotations,
    ];

    /// Path segment under `/node-pools/{id}/`.
    pub fn segment(self) -> &'static str {
        match self {
            NodePoolMember::Servers => "servers",
            NodePoolMember::Taints => "taints",
            NodePoolMember::Labels => "labels",
            NodePoolMember::Annotations => "annotations",
        }
    }

    /// Key of the ID array in the attach payload.
    pub fn payload_key(self) -> &'static str {
        match self {
            NodePoolMember::Servers => "server_ids",
            NodePoolMember::Taints => "taint_ids",
            NodePoolMember::Labels => "label_ids",
            NodePoolMember::Annotations => "annotation_ids",
        }
    }

    fn relation(self) -> &'static str {
        match self {
            NodePoolMember::Servers => "node pool servers",
            NodePoolMember::Taints => "node pool taints",
            NodePoolMember::Labels => "node pool labels",
            NodePoolMember::Annotations => "node pool annotations",
        }
    }
}

/// One member kind of a node pool, e.g. its servers.
#[derive(Debug, Clone)]
pub struct NodePoolRelation {
    client: AutoglueClient,
    member: NodePoolMember,
}

impl NodePoolRelation {
    pub fn new(client: AutoglueClient, member: NodePoolMember) -> Self {
        Self { client, member }
    }

    pub fn member(&self) -> NodePoolMember {
        self.member
    }

    fn collection_path(&self, pool: &str) -> String {
        format!("/node-pools/{}/{}", pool, self.member.segment())
    }
}

#[async_trait]
impl AttachmentClient for NodePoolRelation {
    type Id = String;

    fn relation(&self) -> &'static str {
        self.member.relation()
    }

    async fn list(&self, pool: &str) -> Result<BTreeSet<String>, ApiError> {
        // An empty relation may come back as `null`.
        let members: Option<Vec<IdOnly>> =
            self.client.get_json(&self.collection_path(pool)).await?;
        Ok(members.unwrap_or_default().into_iter().map(|m| m.id).collect())
    }

    async fn attach(&self, pool: &str, ids: &BTreeSet<String>) -> Result<(), ApiError> {
        let mut body = Map::new();
        body.insert(
            self.member.payload_key().to_string(),
            Value::from(ids.iter().cloned().collect::<Vec<_>>()),
        );
        self.client
            .post(&self.collection_path(pool), &Value::Object(body))
            .await
    }

    async fn detach(&self, pool: &str, id: &String) -> Result<(), ApiError> {
        let path = format!("{}/{}", self.collection_path(pool), id);
        match self.client.delete(&path).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

/// Node pools attached to a cluster.
///
/// The API attaches one node pool per request and reports membership only
/// through the cluster object.
#[derive(Debug, Clone)]
pub struct ClusterNodePools {
    client: AutoglueClient,
}

impl ClusterNodePools {
    pub fn new(client: AutoglueClient) -> Self {
        Self { client }
    }
}

#[derive(serde::Serialize)]
struct AttachNodePool<'a> {
    node_pool_id: &'a str,
}

#[async_trait]
impl AttachmentClient for ClusterNodePools {
    type Id = String;

    fn relation(&self) -> &'static str {
        "cluster node pools"
    }

    async fn list(&self, cluster: &str) -> Result<BTreeSet<String>, ApiError> {
        let cluster: Cluster = self
            .client
            .get_json(&format!("/clusters/{}", cluster))
            .await?;
        Ok(cluster.node_pools.into_iter().map(|np| np.id).collect())
    }

    async fn attach(&self, cluster: &str, ids: &BTreeSet<String>) -> Result<(), ApiError> {
        let path = format!("/clusters/{}/node-pools", cluster);
        for id in ids {
            self.client
                .post(&path, &AttachNodePool { node_pool_id: id })
                .await
                .map_err(|e| e.for_member(id.as_str()))?;
        }
        Ok(())
    }

    async fn detach(&self, cluster: &str, id: &String) -> Result<(), ApiError> {
        let path = format!("/clusters/{}/node-pools/{}", cluster, id);
        match self.client.delete(&path).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

impl AutoglueClient {
    /// Reconciler for one member kind of node pools.
    pub fn node_pool_relation(&self, member: NodePoolMember) -> Reconciler<NodePoolRelation> {
        Reconciler::new(NodePoolRelation::new(self.clone(), member))
    }

    /// Reconciler for the node pools of clusters.
    pub fn cluster_node_pools(&self) -> Reconciler<ClusterNodePools> {
        Reconciler::new(ClusterNodePools::new(self.clone()))
    }
}
