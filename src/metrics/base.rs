use std::collections::HashMap;

use k8s_openapi::api::core::v1::Node;

use crate::parsing::{parse_cpu_to_millicores, parse_memory_to_bytes};
use crate::provider::{NodeMetricsItem, PodMetricsItem};
use crate::types::UsageTotals;

fn add_usage(totals: &mut UsageTotals, usage: &HashMap<String, String>) {
    if let Some(mc) = usage.get("cpu").and_then(|q| parse_cpu_to_millicores(q)) {
        totals.cpu_millicores += mc;
    }
    if let Some(bytes) = usage.get("memory").and_then(|q| parse_memory_to_bytes(q)) {
        totals.memory_bytes += bytes;
    }
}

/// Pod usage summed over containers, keyed by `(namespace, name)`.
pub fn build_pod_usage(items: &[PodMetricsItem]) -> Vec<((String, String), UsageTotals)> {
    let mut out = Vec::new();
    for item in items {
        let name = item.metadata.name.clone().unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let namespace = item.metadata.namespace.clone().unwrap_or_default();
        let mut totals = UsageTotals::default();
        for c in &item.containers {
            add_usage(&mut totals, &c.usage);
        }
        out.push(((namespace, name), totals));
    }
    out
}

pub fn build_node_usage(items: &[NodeMetricsItem]) -> Vec<(String, UsageTotals)> {
    let mut out = Vec::new();
    for item in items {
        let name = item.metadata.name.clone().unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let mut totals = UsageTotals::default();
        add_usage(&mut totals, &item.usage);
        out.push((name, totals));
    }
    out
}

/// Allocatable CPU/memory of a node, falling back to raw capacity.
pub fn node_allocatable(node: &Node) -> (Option<i64>, Option<i64>) {
    let status = node.status.as_ref();
    let lookup = |key: &str| {
        status
            .and_then(|s| s.allocatable.as_ref())
            .and_then(|a| a.get(key))
            .or_else(|| status.and_then(|s| s.capacity.as_ref()).and_then(|c| c.get(key)))
            .map(|q| q.0.clone())
    };
    (
        lookup("cpu").and_then(|q| parse_cpu_to_millicores(&q)),
        lookup("memory").and_then(|q| parse_memory_to_bytes(&q)),
    )
}
