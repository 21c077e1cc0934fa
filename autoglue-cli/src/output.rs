//! Table and plain-text rendering for command results.

use std::collections::BTreeSet;

use autoglue_sdk::Diff;
use autoglue_sdk::types::{Cluster, Credential, Domain, KeyValue, NodePool, Server, SshKey, Taint};
use tabled::{Table, Tabled};

fn or_dash(s: &str) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

/// One ID per line, sorted.
pub fn print_ids(ids: &BTreeSet<String>) {
    for id in ids {
        println!("{}", id);
    }
}

pub fn print_plan(relation: &str, parent: &str, plan: &Diff<String>) {
    if plan.is_empty() {
        println!("{} of {} are up to date", relation, parent);
        return;
    }
    for id in &plan.to_attach {
        println!("+ {}", id);
    }
    for id in &plan.to_detach {
        println!("- {}", id);
    }
}

fn print_table<R: Tabled>(rows: Vec<R>, empty: &str) {
    if rows.is_empty() {
        println!("{}", empty);
    } else {
        println!("{}", Table::new(rows));
    }
}

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "HOSTNAME")]
    hostname: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "PRIVATE IP")]
    private_ip: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

pub fn print_servers(servers: Vec<Server>) {
    let rows = servers
        .into_iter()
        .map(|s| ServerRow {
            hostname: or_dash(&s.hostname),
            role: or_dash(&s.role),
            private_ip: or_dash(&s.private_ip_address),
            status: or_dash(&s.status),
            id: s.id,
        })
        .collect();
    print_table::<ServerRow>(rows, "No servers found");
}

#[derive(Tabled)]
struct SshKeyRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "FINGERPRINT")]
    fingerprint: String,
}

pub fn print_ssh_keys(keys: Vec<SshKey>) {
    let rows = keys
        .into_iter()
        .map(|k| SshKeyRow {
            name: or_dash(&k.name),
            fingerprint: or_dash(&k.fingerprint),
            id: k.id,
        })
        .collect();
    print_table::<SshKeyRow>(rows, "No SSH keys found");
}

#[derive(Tabled)]
struct TaintRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "EFFECT")]
    effect: String,
}

pub fn print_taints(taints: Vec<Taint>) {
    let rows = taints
        .into_iter()
        .map(|t| TaintRow {
            key: t.key,
            value: t.value.unwrap_or_else(|| "-".to_string()),
            effect: or_dash(&t.effect),
            id: t.id,
        })
        .collect();
    print_table::<TaintRow>(rows, "No taints found");
}

#[derive(Tabled)]
struct KeyValueRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

/// Labels and annotations.
pub fn print_key_values(items: Vec<KeyValue>) {
    let rows = items
        .into_iter()
        .map(|kv| KeyValueRow {
            id: kv.id,
            key: kv.key,
            value: kv.value,
        })
        .collect();
    print_table::<KeyValueRow>(rows, "Nothing found");
}

#[derive(Tabled)]
struct NodePoolRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "KUBELET")]
    kubelet_version: String,
}

pub fn print_node_pools(pools: Vec<NodePool>) {
    let rows = pools
        .into_iter()
        .map(|p| NodePoolRow {
            name: or_dash(&p.name),
            role: or_dash(&p.role),
            kubelet_version: or_dash(&p.kubelet_version),
            id: p.id,
        })
        .collect();
    print_table::<NodePoolRow>(rows, "No node pools found");
}

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PROVIDER")]
    provider: String,
    #[tabled(rename = "REGION")]
    region: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "NODE POOLS")]
    node_pools: usize,
}

pub fn print_clusters(clusters: Vec<Cluster>) {
    let rows = clusters
        .into_iter()
        .map(|c| ClusterRow {
            name: or_dash(&c.name),
            provider: or_dash(&c.cluster_provider),
            region: or_dash(&c.region),
            status: or_dash(&c.status),
            node_pools: c.node_pools.len(),
            id: c.id,
        })
        .collect();
    print_table::<ClusterRow>(rows, "No clusters found");
}

#[derive(Tabled)]
struct DomainRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "DOMAIN")]
    domain_name: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

pub fn print_domains(domains: Vec<Domain>) {
    let rows = domains
        .into_iter()
        .map(|d| DomainRow {
            domain_name: d.domain_name,
            status: or_dash(&d.status),
            id: d.id,
        })
        .collect();
    print_table::<DomainRow>(rows, "No domains found");
}

#[derive(Tabled)]
struct CredentialRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PROVIDER")]
    provider: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "REGION")]
    region: String,
}

pub fn print_credentials(credentials: Vec<Credential>) {
    let rows = credentials
        .into_iter()
        .map(|c| CredentialRow {
            name: or_dash(&c.name),
            provider: or_dash(&c.credential_provider),
            kind: or_dash(&c.kind),
            region: or_dash(&c.region),
            id: c.id,
        })
        .collect();
    print_table::<CredentialRow>(rows, "No credentials found");
}
