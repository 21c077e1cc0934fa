use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use autoglue_sdk::{
    AttachmentClient, AutoglueClient, ClientConfig, ClusterSlot, NodePoolMember, Reconciler,
    ReconcileError, normalize,
};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncReadExt;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

#[derive(Parser)]
#[command(name = "autoglue")]
#[command(about = "Manage Autoglue node pools, clusters and their attachments", long_about = None)]
struct Cli {
    /// API base URL (env: AUTOGLUE_ADDR)
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Bearer token (env: AUTOGLUE_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// User API key (env: AUTOGLUE_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Organization key (env: AUTOGLUE_ORG_KEY)
    #[arg(long, global = true)]
    org_key: Option<String>,

    /// Organization secret (env: AUTOGLUE_ORG_SECRET)
    #[arg(long, global = true)]
    org_secret: Option<String>,

    /// Organization ID, required with --api-key or --token (env: AUTOGLUE_ORG_ID)
    #[arg(long, global = true)]
    org_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        ClientConfig::from_env().merge(ClientConfig {
            addr: self.addr.clone(),
            bearer_token: self.token.clone(),
            api_key: self.api_key.clone(),
            org_key: self.org_key.clone(),
            org_secret: self.org_secret.clone(),
            org_id: self.org_id.clone(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage what is attached to a node pool
    NodePool {
        /// Kind of member
        member: Member,

        #[command(subcommand)]
        action: SetAction,
    },

    /// Manage cluster attachments
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },

    /// List entities of one kind
    List {
        kind: Kind,
    },

    /// SSH key operations
    Ssh {
        #[command(subcommand)]
        command: SshCommands,
    },
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Node pools attached to a cluster
    NodePools {
        #[command(subcommand)]
        action: SetAction,
    },

    /// Single-valued attachments (captain domain, load balancers, bastion, ...)
    Attachment {
        slot: Slot,

        #[command(subcommand)]
        action: SlotAction,
    },

    /// Upload or remove the cluster kubeconfig
    Kubeconfig {
        #[command(subcommand)]
        action: KubeconfigAction,
    },
}

/// Operations on a set-valued relation.
#[derive(Subcommand)]
enum SetAction {
    /// Show the currently attached IDs
    Get {
        parent: String,
    },

    /// Make the attached set exactly the given IDs
    Set {
        parent: String,

        /// Desired member IDs (duplicates are ignored)
        ids: Vec<String>,

        /// Print the planned changes without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Detach everything
    Clear {
        parent: String,

        /// Print the planned changes without applying them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum SlotAction {
    Get { cluster: String },
    Set { cluster: String, value: String },
    Clear { cluster: String },
}

#[derive(Subcommand)]
enum KubeconfigAction {
    Set {
        cluster: String,

        /// Read the kubeconfig from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Clear {
        cluster: String,
    },
}

#[derive(Subcommand)]
enum SshCommands {
    /// Print key material
    Download {
        id: String,

        /// Which part to download, e.g. public or private
        #[arg(long)]
        part: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Member {
    Servers,
    Taints,
    Labels,
    Annotations,
}

impl From<Member> for NodePoolMember {
    fn from(m: Member) -> Self {
        match m {
            Member::Servers => NodePoolMember::Servers,
            Member::Taints => NodePoolMember::Taints,
            Member::Labels => NodePoolMember::Labels,
            Member::Annotations => NodePoolMember::Annotations,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Slot {
    CaptainDomain,
    ControlPlaneRecordSet,
    AppsLoadBalancer,
    GlueopsLoadBalancer,
    Bastion,
}

impl From<Slot> for ClusterSlot {
    fn from(s: Slot) -> Self {
        match s {
            Slot::CaptainDomain => ClusterSlot::CaptainDomain,
            Slot::ControlPlaneRecordSet => ClusterSlot::ControlPlaneRecordSet,
            Slot::AppsLoadBalancer => ClusterSlot::AppsLoadBalancer,
            Slot::GlueopsLoadBalancer => ClusterSlot::GlueopsLoadBalancer,
            Slot::Bastion => ClusterSlot::Bastion,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Servers,
    SshKeys,
    Taints,
    Labels,
    Annotations,
    NodePools,
    Clusters,
    Domains,
    Credentials,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoglue=info,autoglue_sdk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    debug!(?config, "client configuration");

    let client = AutoglueClient::from_config(&config).context("invalid Autoglue configuration")?;

    match cli.command {
        Commands::NodePool { member, action } => {
            run_set_action(client.node_pool_relation(member.into()), action).await
        }
        Commands::Cluster { command } => match command {
            ClusterCommands::NodePools { action } => {
                run_set_action(client.cluster_node_pools(), action).await
            }
            ClusterCommands::Attachment { slot, action } => {
                run_slot_action(&client, slot.into(), action).await
            }
            ClusterCommands::Kubeconfig { action } => run_kubeconfig(&client, action).await,
        },
        Commands::List { kind } => list(&client, kind).await,
        Commands::Ssh {
            command: SshCommands::Download { id, part },
        } => {
            let material = client
                .ssh_keys()
                .download(&id, part.as_deref())
                .await
                .with_context(|| format!("download ssh key {}", id))?;
            println!("{}", material);
            Ok(())
        }
    }
}

async fn run_set_action<C>(reconciler: Reconciler<C>, action: SetAction) -> Result<()>
where
    C: AttachmentClient<Id = String>,
{
    let relation = reconciler.client().relation();
    match action {
        SetAction::Get { parent } => {
            let current = reconciler.read(&parent).await.map_err(parent_gone)?;
            output::print_ids(&current);
        }
        SetAction::Set {
            parent,
            ids,
            dry_run,
        } => {
            let desired = normalize(ids);
            apply(&reconciler, relation, &parent, &desired, dry_run).await?;
        }
        SetAction::Clear { parent, dry_run } => {
            apply(&reconciler, relation, &parent, &BTreeSet::new(), dry_run).await?;
        }
    }
    Ok(())
}

async fn apply<C>(
    reconciler: &Reconciler<C>,
    relation: &str,
    parent: &str,
    desired: &BTreeSet<String>,
    dry_run: bool,
) -> Result<()>
where
    C: AttachmentClient<Id = String>,
{
    if dry_run {
        let plan = reconciler.plan(parent, desired).await.map_err(parent_gone)?;
        output::print_plan(relation, parent, &plan);
        return Ok(());
    }

    let result = reconciler
        .reconcile(parent, desired)
        .await
        .map_err(parent_gone)?;
    output::print_ids(&result);
    Ok(())
}

/// Turn a missing parent into a message that names it; keep other failures as-is.
fn parent_gone(err: ReconcileError) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!("{} does not exist (it may have been deleted)", err.parent())
    } else {
        err.into()
    }
}

async fn run_slot_action(client: &AutoglueClient, slot: ClusterSlot, action: SlotAction) -> Result<()> {
    let attachments = client.cluster_attachments();
    match action {
        SlotAction::Get { cluster } => {
            let current = attachments
                .get(&cluster, slot)
                .await
                .map_err(|e| missing_cluster(e, &cluster))?;
            println!("{}", current.as_deref().unwrap_or("-"));
        }
        SlotAction::Set { cluster, value } => {
            let changed = attachments
                .set(&cluster, slot, &value)
                .await
                .map_err(|e| missing_cluster(e, &cluster))?;
            if !changed {
                println!("{} already set to {}", slot.segment(), value);
            }
        }
        SlotAction::Clear { cluster } => {
            attachments
                .clear(&cluster, slot)
                .await
                .with_context(|| format!("clear {} of cluster {}", slot.segment(), cluster))?;
        }
    }
    Ok(())
}

fn missing_cluster(err: autoglue_sdk::ApiError, cluster: &str) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!("cluster {} does not exist", cluster)
    } else {
        anyhow::Error::new(err).context(format!("cluster {}", cluster))
    }
}

async fn run_kubeconfig(client: &AutoglueClient, action: KubeconfigAction) -> Result<()> {
    let attachments = client.cluster_attachments();
    match action {
        KubeconfigAction::Set { cluster, file } => {
            let kubeconfig = match file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buf)
                        .await
                        .context("read kubeconfig from stdin")?;
                    buf
                }
            };
            if kubeconfig.trim().is_empty() {
                bail!("kubeconfig is empty");
            }
            attachments
                .set_kubeconfig(&cluster, &kubeconfig)
                .await
                .map_err(|e| missing_cluster(e, &cluster))?;
        }
        KubeconfigAction::Clear { cluster } => {
            attachments
                .clear_kubeconfig(&cluster)
                .await
                .with_context(|| format!("clear kubeconfig of cluster {}", cluster))?;
        }
    }
    Ok(())
}

async fn list(client: &AutoglueClient, kind: Kind) -> Result<()> {
    match kind {
        Kind::Servers => output::print_servers(client.servers().list().await?),
        Kind::SshKeys => output::print_ssh_keys(client.ssh_keys().list().await?),
        Kind::Taints => output::print_taints(client.taints().list().await?),
        Kind::Labels => output::print_key_values(client.labels().list().await?),
        Kind::Annotations => output::print_key_values(client.annotations().list().await?),
        Kind::NodePools => output::print_node_pools(client.node_pools().list().await?),
        Kind::Clusters => output::print_clusters(client.clusters().list().await?),
        Kind::Domains => output::print_domains(client.domains().list().await?),
        Kind::Credentials => output::print_credentials(client.credentials().list().await?),
    }
    Ok(())
}
