//! Client SDK for the Autoglue control plane.
//!
//! Besides plain CRUD over servers, node pools, clusters and DNS, the SDK
//! manages attachment relations (servers/taints/labels/annotations on node
//! pools, node pools on clusters) through a set [`Reconciler`].

pub mod client;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod resources;
pub mod types;

pub use client::AutoglueClient;
pub use config::{ClientConfig, Settings};
pub use error::{ApiError, ConfigError, Phase, ReconcileError};
pub use reconcile::{
    AttachmentClient, ClusterAttachments, ClusterNodePools, ClusterSlot, Diff, NodePoolMember,
    NodePoolRelation, Reconciler, diff, normalize,
};
pub use resources::ResourceApi;
