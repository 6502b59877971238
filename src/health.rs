use k8s_openapi::api::core::v1::{Endpoints, Event, Node, Pod, Service};
use tracing::info;

use crate::error::Result;
use crate::provider::{ClusterProvider, PodQuery};
use crate::resources::{event_time, is_node_ready, pod_phase, services_without_endpoints};
use crate::types::{
    ClusterHealth, Config, HealthStatus, NodeHealth, PodHealth, PodPhaseInfo, ServiceHealth,
    WarningEvent,
};

/// Builds the cluster health summary from independent reads. Read errors propagate.
pub struct HealthAggregator<'a, P: ClusterProvider + ?Sized> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: ClusterProvider + ?Sized> HealthAggregator<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    pub async fn cluster_health(&self) -> Result<ClusterHealth> {
        let all_pods = PodQuery::all();
        let (nodes, pods, services, endpoints, events) = tokio::try_join!(
            self.provider.list_nodes(),
            self.provider.list_pods(&all_pods),
            self.provider.list_services(None),
            self.provider.list_endpoints(),
            self.provider.list_events(None),
        )?;

        let health = ClusterHealth {
            nodes: summarize_nodes(&nodes),
            pods: summarize_pods(&pods),
            services: summarize_services(&services, &endpoints),
            events: recent_warnings(&events, self.config.max_warning_events),
        };
        info!(
            "cluster health: {}/{} nodes ready, {}/{} pods running",
            health.nodes.ready, health.nodes.total, health.pods.running, health.pods.total
        );
        Ok(health)
    }
}

pub fn summarize_nodes(nodes: &[Node]) -> NodeHealth {
    let total = nodes.len();
    let ready = nodes.iter().filter(|n| is_node_ready(n)).count();
    NodeHealth {
        total,
        ready,
        status: if ready == total {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
    }
}

pub fn summarize_pods(pods: &[Pod]) -> PodHealth {
    let running = pods.iter().filter(|p| pod_phase(p) == "Running").count();
    let failed = pods
        .iter()
        .filter(|p| !matches!(pod_phase(p), "Running" | "Succeeded"))
        .map(|p| PodPhaseInfo {
            name: p.metadata.name.clone().unwrap_or_default(),
            namespace: p.metadata.namespace.clone().unwrap_or_default(),
            phase: pod_phase(p).to_string(),
        })
        .collect();
    PodHealth {
        total: pods.len(),
        running,
        failed,
    }
}

pub fn summarize_services(services: &[Service], endpoints: &[Endpoints]) -> ServiceHealth {
    ServiceHealth {
        total: services.len(),
        without_endpoints: services_without_endpoints(services, endpoints),
    }
}

/// The last `limit` Warning events in the order the provider returned them.
pub fn recent_warnings(events: &[Event], limit: usize) -> Vec<WarningEvent> {
    let warnings: Vec<&Event> = events
        .iter()
        .filter(|e| e.type_.as_deref() == Some("Warning"))
        .collect();
    let skip = warnings.len().saturating_sub(limit);
    warnings
        .into_iter()
        .skip(skip)
        .map(|e| WarningEvent {
            namespace: e.metadata.namespace.clone().unwrap_or_default(),
            object: e.involved_object.name.clone().unwrap_or_default(),
            reason: e.reason.clone(),
            message: e.message.clone(),
            time: event_time(e),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockClusterProvider;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus, ObjectReference, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn create_test_node(name: &str, ready: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: ready.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn create_test_pod(name: &str, phase: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: phase.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn create_test_event(object: &str, type_: &str, reason: &str) -> Event {
        Event {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            involved_object: ObjectReference {
                name: Some(object.to_string()),
                ..Default::default()
            },
            type_: Some(type_.to_string()),
            reason: Some(reason.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize_nodes_degraded() {
        let nodes = vec![
            create_test_node("a", "True"),
            create_test_node("b", "True"),
            create_test_node("c", "True"),
            create_test_node("d", "False"),
            create_test_node("e", "Unknown"),
        ];
        let health = summarize_nodes(&nodes);
        assert_eq!(health.total, 5);
        assert_eq!(health.ready, 3);
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_summarize_nodes_empty_cluster_is_healthy() {
        assert_eq!(summarize_nodes(&[]).status, HealthStatus::Healthy);
    }

    #[test]
    fn test_summarize_pods() {
        let pods = vec![
            create_test_pod("running", Some("Running")),
            create_test_pod("done", Some("Succeeded")),
            create_test_pod("pending", Some("Pending")),
            create_test_pod("failed", Some("Failed")),
            create_test_pod("unknown", None),
        ];
        let health = summarize_pods(&pods);
        assert_eq!(health.total, 5);
        assert_eq!(health.running, 1);
        let failed: Vec<_> = health.failed.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(failed, vec!["pending", "failed", "unknown"]);
        assert_eq!(health.failed[2].phase, "");
    }

    #[test]
    fn test_recent_warnings_keeps_tail_in_order() {
        let mut events: Vec<Event> = (0..15)
            .map(|i| create_test_event(&format!("pod-{}", i), "Warning", "BackOff"))
            .collect();
        events.insert(3, create_test_event("pod-x", "Normal", "Pulled"));

        let warnings = recent_warnings(&events, 10);
        assert_eq!(warnings.len(), 10);
        assert_eq!(warnings[0].object, "pod-5");
        assert_eq!(warnings[9].object, "pod-14");
        assert!(warnings.iter().all(|w| w.reason.as_deref() == Some("BackOff")));
    }

    #[tokio::test]
    async fn test_cluster_health_propagates_errors() {
        let provider = MockClusterProvider::new().fail_list("endpoints", "connection refused");
        let config = Config::default();
        let result = HealthAggregator::new(&provider, &config).cluster_health().await;
        assert!(result.is_err());
    }
}
