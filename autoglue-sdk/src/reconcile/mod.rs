//! Set reconciliation for attachment relations.
//!
//! A relation is the set of member IDs attached to one parent (servers in a
//! node pool, node pools in a cluster, ...). The [`Reconciler`] compares the
//! desired set with what the API currently reports and issues the minimal
//! attach/detach calls to converge, then re-reads the relation.
//!
//! A pass holds no state between calls and never retries. Any failure aborts
//! the pass; running it again is safe because the diff is recomputed from
//! the remote state. Concurrent passes on the same parent are not
//! coordinated. Dropping the future of a pass cancels whatever call is in
//! flight and skips the rest.

pub mod cluster;
pub mod relations;

use std::collections::BTreeSet;
use std::fmt::Display;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{ApiError, ReconcileError};

pub use cluster::{ClusterAttachments, ClusterSlot};
pub use relations::{ClusterNodePools, NodePoolMember, NodePoolRelation};

/// Remote operations on one kind of relation.
#[async_trait]
pub trait AttachmentClient: Send + Sync {
    /// Member identifier.
    type Id: Clone + Ord + Display + Send + Sync;

    /// Human-readable relation name for logs and errors.
    fn relation(&self) -> &'static str;

    /// Current members of `parent`. A missing parent is [`ApiError::NotFound`].
    async fn list(&self, parent: &str) -> Result<BTreeSet<Self::Id>, ApiError>;

    /// Attach all of `ids`. Attaching an attached member is not an error.
    async fn attach(&self, parent: &str, ids: &BTreeSet<Self::Id>) -> Result<(), ApiError>;

    /// Detach one member. Detaching an absent member is not an error.
    async fn detach(&self, parent: &str, id: &Self::Id) -> Result<(), ApiError>;
}

/// Changes needed to turn the current set into the desired one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<I: Ord> {
    /// In current, not in desired.
    pub to_detach: BTreeSet<I>,
    /// In desired, not in current.
    pub to_attach: BTreeSet<I>,
}

impl<I: Ord> Diff<I> {
    pub fn is_empty(&self) -> bool {
        self.to_detach.is_empty() && self.to_attach.is_empty()
    }
}

/// Compute the symmetric difference between `current` and `desired`.
pub fn diff<I: Ord + Clone>(current: &BTreeSet<I>, desired: &BTreeSet<I>) -> Diff<I> {
    Diff {
        to_detach: current.difference(desired).cloned().collect(),
        to_attach: desired.difference(current).cloned().collect(),
    }
}

/// Collapse list-shaped input (possibly with duplicates) into a set.
pub fn normalize<I: Ord>(ids: impl IntoIterator<Item = I>) -> BTreeSet<I> {
    ids.into_iter().collect()
}

fn id_strings<I: Display>(ids: &BTreeSet<I>) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

/// Drives one relation towards a desired membership.
pub struct Reconciler<C> {
    client: C,
}

impl<C: AttachmentClient> Reconciler<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Current members of `parent`.
    pub async fn read(&self, parent: &str) -> Result<BTreeSet<C::Id>, ReconcileError> {
        self.client
            .list(parent)
            .await
            .map_err(|source| ReconcileError::List {
                relation: self.client.relation(),
                parent: parent.to_string(),
                source,
            })
    }

    /// Diff against the remote state without changing anything.
    pub async fn plan(
        &self,
        parent: &str,
        desired: &BTreeSet<C::Id>,
    ) -> Result<Diff<C::Id>, ReconcileError> {
        let current = self.read(parent).await?;
        Ok(diff(&current, desired))
    }

    /// Converge `parent` to `desired` and return the members reported afterwards.
    ///
    /// Order: list, one batched attach, one detach per removed member (in
    /// order, stopping at the first failure), list again.
    pub async fn reconcile(
        &self,
        parent: &str,
        desired: &BTreeSet<C::Id>,
    ) -> Result<BTreeSet<C::Id>, ReconcileError> {
        let relation = self.client.relation();
        let current = self.read(parent).await?;
        let changes = diff(&current, desired);

        if changes.is_empty() {
            debug!(relation, parent, "relation already converged");
            return Ok(current);
        }

        debug!(
            relation,
            parent,
            attach = changes.to_attach.len(),
            detach = changes.to_detach.len(),
            "computed relation diff"
        );

        if !changes.to_attach.is_empty() {
            let ids = id_strings(&changes.to_attach);
            info!(relation, parent, ids = ?ids, "Attaching {} to {}", relation, parent);
            self.client
                .attach(parent, &changes.to_attach)
                .await
                .map_err(|source| ReconcileError::Attach {
                    relation,
                    parent: parent.to_string(),
                    // Narrow to the failing member when the client attaches one at a time.
                    ids: match source.member() {
                        Some(id) => vec![id.to_string()],
                        None => ids,
                    },
                    source,
                })?;
        }

        for id in &changes.to_detach {
            info!(relation, parent, id = %id, "Detaching {} from {}", relation, parent);
            self.client
                .detach(parent, id)
                .await
                .map_err(|source| ReconcileError::Detach {
                    relation,
                    parent: parent.to_string(),
                    id: id.to_string(),
                    source,
                })?;
        }

        self.client
            .list(parent)
            .await
            .map_err(|source| ReconcileError::Refresh {
                relation,
                parent: parent.to_string(),
                source,
            })
    }

    /// Detach every member of `parent`.
    pub async fn clear(&self, parent: &str) -> Result<BTreeSet<C::Id>, ReconcileError> {
        self.reconcile(parent, &BTreeSet::new()).await
    }
}
