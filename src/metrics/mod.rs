// Resource usage from the metrics.k8s.io API
pub mod base;

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::parsing::percent_of;
use crate::provider::ClusterProvider;
use crate::types::{MetricsAvailability, NodeUsage, PodUsage, ResourceMetrics};

use self::base::{build_node_usage, build_pod_usage, node_allocatable};

pub struct MetricsReader<'a, P: ClusterProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: ClusterProvider + ?Sized> MetricsReader<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Node and pod usage. A cluster without metrics-server yields
    /// `MetricsAvailability::Unavailable`; any other failure is an error.
    pub async fn resource_metrics(&self) -> Result<MetricsAvailability> {
        let fetched = tokio::try_join!(
            self.provider.list_node_metrics(),
            self.provider.list_pod_metrics(),
            self.provider.list_nodes(),
        );
        let (node_items, pod_items, nodes) = match fetched {
            Ok(parts) => parts,
            Err(Error::MetricsUnavailable(reason)) => {
                warn!("metrics server not available: {}", reason);
                return Ok(MetricsAvailability::Unavailable { reason });
            }
            Err(e) => return Err(e),
        };

        let capacity: HashMap<String, (Option<i64>, Option<i64>)> = nodes
            .iter()
            .filter_map(|n| n.metadata.name.clone().map(|name| (name, node_allocatable(n))))
            .collect();

        let nodes = build_node_usage(&node_items)
            .into_iter()
            .map(|(name, usage)| {
                let (cpu_cap, mem_cap) = capacity.get(&name).copied().unwrap_or((None, None));
                NodeUsage {
                    cpu_percent: percent_of(usage.cpu_millicores, cpu_cap),
                    memory_percent: percent_of(usage.memory_bytes, mem_cap),
                    name,
                    cpu_millicores: usage.cpu_millicores,
                    memory_bytes: usage.memory_bytes,
                }
            })
            .collect::<Vec<_>>();

        let pods = build_pod_usage(&pod_items)
            .into_iter()
            .map(|((namespace, name), usage)| PodUsage {
                namespace,
                name,
                cpu_millicores: usage.cpu_millicores,
                memory_bytes: usage.memory_bytes,
            })
            .collect::<Vec<_>>();

        info!("metrics for {} nodes and {} pods", nodes.len(), pods.len());
        Ok(MetricsAvailability::Available(ResourceMetrics { nodes, pods }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MetricsMetadata, MockClusterProvider, NodeMetricsItem};
    use k8s_openapi::api::core::v1::{Node, NodeStatus};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_unavailable_is_a_value() {
        let provider = MockClusterProvider::new();
        let result = MetricsReader::new(&provider).resource_metrics().await.unwrap();
        assert!(matches!(result, MetricsAvailability::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_an_error() {
        let provider = MockClusterProvider::new()
            .with_metrics(vec![], vec![])
            .fail_list("nodes", "unauthorized");
        assert!(MetricsReader::new(&provider).resource_metrics().await.is_err());
    }

    #[tokio::test]
    async fn test_node_percentages() {
        let node = Node {
            metadata: ObjectMeta {
                name: Some("node-a".to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                allocatable: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity("4".to_string())),
                    ("memory".to_string(), Quantity("8Gi".to_string())),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let item = NodeMetricsItem {
            metadata: MetricsMetadata {
                name: Some("node-a".to_string()),
                namespace: None,
            },
            usage: HashMap::from([
                ("cpu".to_string(), "2000m".to_string()),
                ("memory".to_string(), "2Gi".to_string()),
            ]),
        };
        let provider = MockClusterProvider::new()
            .with_nodes(vec![node])
            .with_metrics(vec![item], vec![]);

        let MetricsAvailability::Available(metrics) =
            MetricsReader::new(&provider).resource_metrics().await.unwrap()
        else {
            panic!("metrics should be available");
        };
        assert_eq!(metrics.nodes.len(), 1);
        assert_eq!(metrics.nodes[0].cpu_percent, Some(50.0));
        assert_eq!(metrics.nodes[0].memory_percent, Some(25.0));
    }
}
