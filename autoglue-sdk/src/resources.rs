//! Typed CRUD access to Autoglue entities.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::client::AutoglueClient;
use crate::error::ApiError;
use crate::types::{
    Annotation, Cluster, ClusterRequest, CreateSshKeyRequest, Credential, CredentialRequest,
    Domain, DomainRequest, KeyValueRequest, Label, NoUpdate, NodePool, NodePoolRequest,
    RecordSet, RecordSetRequest, Server, ServerRequest, SshKey, Taint, TaintRequest,
};

/// CRUD operations for one entity collection.
///
/// `T` is the response type, `C` the create payload and `U` the update payload.
pub struct ResourceApi<T, C, U = C> {
    client: AutoglueClient,
    base: &'static str,
    kind: &'static str,
    _types: PhantomData<fn() -> (T, C, U)>,
}

impl<T, C, U> Clone for ResourceApi<T, C, U> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base: self.base,
            kind: self.kind,
            _types: PhantomData,
        }
    }
}

impl<T, C, U> ResourceApi<T, C, U>
where
    T: DeserializeOwned,
    C: Serialize,
    U: Serialize,
{
    fn new(client: &AutoglueClient, base: &'static str, kind: &'static str) -> Self {
        Self {
            client: client.clone(),
            base,
            kind,
            _types: PhantomData,
        }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.base, id)
    }

    pub async fn list(&self) -> Result<Vec<T>, ApiError> {
        let items: Option<Vec<T>> = self.client.get_json(self.base).await?;
        Ok(items.unwrap_or_default())
    }

    /// List with server-side filters, e.g. `[("q", "example")]`.
    pub async fn list_query(&self, query: &[(&str, &str)]) -> Result<Vec<T>, ApiError> {
        let items: Option<Vec<T>> = self.client.get_json_query(self.base, query).await?;
        Ok(items.unwrap_or_default())
    }

    /// Fetch one entity; `None` when it does not exist.
    pub async fn get(&self, id: &str) -> Result<Option<T>, ApiError> {
        match self.client.get_json(&self.item_path(id)).await {
            Ok(item) => Ok(Some(item)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, req: &C) -> Result<T, ApiError> {
        info!("Creating {}", self.kind);
        self.client.post_json(self.base, req).await
    }

    pub async fn update(&self, id: &str, req: &U) -> Result<T, ApiError> {
        info!("Updating {} {}", self.kind, id);
        self.client.patch_json(&self.item_path(id), req).await
    }

    /// Delete an entity. Deleting one that is already gone succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        info!("Deleting {} {}", self.kind, id);
        match self.client.delete(&self.item_path(id)).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

impl ResourceApi<SshKey, CreateSshKeyRequest, NoUpdate> {
    /// Download key material. `part` selects e.g. `public` or `private`.
    pub async fn download(&self, id: &str, part: Option<&str>) -> Result<String, ApiError> {
        let path = format!("{}/download", self.item_path(id));
        match part {
            Some(part) => self.client.get_json_query(&path, &[("part", part)]).await,
            None => self.client.get_json(&path).await,
        }
    }
}

impl ResourceApi<RecordSet, RecordSetRequest> {
    pub async fn list_for_domain(&self, domain_id: &str) -> Result<Vec<RecordSet>, ApiError> {
        let records: Option<Vec<RecordSet>> = self
            .client
            .get_json(&format!("/dns/domains/{}/records", domain_id))
            .await?;
        Ok(records.unwrap_or_default())
    }

    /// Record sets are created under their domain and addressed on their own.
    pub async fn create_in_domain(
        &self,
        domain_id: &str,
        req: &RecordSetRequest,
    ) -> Result<RecordSet, ApiError> {
        info!("Creating record set in domain {}", domain_id);
        self.client
            .post_json(&format!("/dns/domains/{}/records", domain_id), req)
            .await
    }
}

impl AutoglueClient {
    pub fn servers(&self) -> ResourceApi<Server, ServerRequest> {
        ResourceApi::new(self, "/servers", "server")
    }

    pub fn ssh_keys(&self) -> ResourceApi<SshKey, CreateSshKeyRequest, NoUpdate> {
        ResourceApi::new(self, "/ssh", "ssh key")
    }

    pub fn taints(&self) -> ResourceApi<Taint, TaintRequest> {
        ResourceApi::new(self, "/taints", "taint")
    }

    pub fn labels(&self) -> ResourceApi<Label, KeyValueRequest> {
        ResourceApi::new(self, "/labels", "label")
    }

    pub fn annotations(&self) -> ResourceApi<Annotation, KeyValueRequest> {
        ResourceApi::new(self, "/annotations", "annotation")
    }

    pub fn node_pools(&self) -> ResourceApi<NodePool, NodePoolRequest> {
        ResourceApi::new(self, "/node-pools", "node pool")
    }

    pub fn clusters(&self) -> ResourceApi<Cluster, ClusterRequest> {
        ResourceApi::new(self, "/clusters", "cluster")
    }

    pub fn domains(&self) -> ResourceApi<Domain, DomainRequest> {
        ResourceApi::new(self, "/dns/domains", "domain")
    }

    pub fn record_sets(&self) -> ResourceApi<RecordSet, RecordSetRequest> {
        ResourceApi::new(self, "/dns/records", "record set")
    }

    pub fn credentials(&self) -> ResourceApi<Credential, CredentialRequest> {
        ResourceApi::new(self, "/credentials", "credential")
    }
}
