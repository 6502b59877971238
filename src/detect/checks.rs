//! Individual anomaly finders. Each returns every matching identifier;
//! truncation to a sample happens when the finding becomes an `Issue`.

use std::collections::HashSet;

use k8s_openapi::api::core::v1::{Node, PersistentVolumeClaim, Pod, Service};

use crate::resources::{
    container_statuses, has_load_balancer_ingress, is_node_ready, object_id, pod_id, pod_phase,
    service_type, waiting_reason,
};

const IMAGE_PULL_REASONS: &[&str] = &["ImagePullBackOff", "ErrImagePull"];

pub fn not_ready_nodes(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .filter(|n| !is_node_ready(n))
        .map(|n| n.metadata.name.clone().unwrap_or_default())
        .collect()
}

pub fn failed_or_pending_pods(pods: &[Pod]) -> Vec<String> {
    pods.iter()
        .filter(|p| matches!(pod_phase(p), "Failed" | "Pending"))
        .map(pod_id)
        .collect()
}

/// One entry per affected container, tagged with the waiting reason.
pub fn image_pull_errors(pods: &[Pod]) -> Vec<String> {
    let mut errors = Vec::new();
    for pod in pods {
        for cs in container_statuses(pod) {
            if let Some(reason) = waiting_reason(cs).filter(|r| IMAGE_PULL_REASONS.contains(r)) {
                errors.push(format!("{} ({})", pod_id(pod), reason));
            }
        }
    }
    errors
}

/// Claims without a phase count as unbound.
pub fn unbound_pvcs(pvcs: &[PersistentVolumeClaim]) -> Vec<String> {
    pvcs.iter()
        .filter(|pvc| {
            pvc.status.as_ref().and_then(|s| s.phase.as_deref()) != Some("Bound")
        })
        .map(|pvc| object_id(&pvc.metadata))
        .collect()
}

pub fn load_balancer_services<'a>(services: &'a [Service]) -> impl Iterator<Item = &'a Service> {
    services.iter().filter(|svc| service_type(svc) == "LoadBalancer")
}

pub fn pending_load_balancers(services: &[Service]) -> Vec<String> {
    load_balancer_services(services)
        .filter(|svc| !has_load_balancer_ingress(svc))
        .map(|svc| object_id(&svc.metadata))
        .collect()
}

/// Pods with any container restarted more than `threshold` times, each pod once.
pub fn high_restart_pods(pods: &[Pod], threshold: i32) -> Vec<String> {
    let mut seen = HashSet::new();
    pods.iter()
        .filter(|p| container_statuses(p).iter().any(|cs| cs.restart_count > threshold))
        .map(pod_id)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

pub fn running_count<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> (usize, usize) {
    let mut total = 0;
    let mut running = 0;
    for pod in pods {
        total += 1;
        if pod_phase(pod) == "Running" {
            running += 1;
        }
    }
    (total, running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateWaiting, ContainerStatus, LoadBalancerIngress,
        LoadBalancerStatus, PersistentVolumeClaimStatus, PodStatus, ServiceSpec, ServiceStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn create_test_pod(name: &str, phase: &str, statuses: Vec<ContainerStatus>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                container_statuses: Some(statuses),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn container(name: &str, restarts: i32, waiting: Option<&str>) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            restart_count: restarts,
            state: waiting.map(|reason| ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some(reason.to_string()),
                    message: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_pull_errors_per_container() {
        let pods = vec![
            create_test_pod(
                "web",
                "Pending",
                vec![
                    container("app", 0, Some("ImagePullBackOff")),
                    container("sidecar", 0, Some("ErrImagePull")),
                ],
            ),
            create_test_pod("db", "Pending", vec![container("db", 0, Some("ContainerCreating"))]),
        ];
        assert_eq!(
            image_pull_errors(&pods),
            vec!["default/web (ImagePullBackOff)", "default/web (ErrImagePull)"]
        );
    }

    #[test]
    fn test_high_restart_pods_deduplicated() {
        let pods = vec![
            create_test_pod(
                "web",
                "Running",
                vec![container("a", 11, None), container("b", 40, None)],
            ),
            create_test_pod("api", "Running", vec![container("a", 10, None)]),
        ];
        assert_eq!(high_restart_pods(&pods, 10), vec!["default/web"]);
        assert_eq!(high_restart_pods(&pods, 9), vec!["default/web", "default/api"]);
    }

    #[test]
    fn test_unbound_pvcs() {
        let pvc = |name: &str, phase: Option<&str>| PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("data".to_string()),
                ..Default::default()
            },
            status: phase.map(|p| PersistentVolumeClaimStatus {
                phase: Some(p.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let pvcs = vec![
            pvc("bound", Some("Bound")),
            pvc("pending", Some("Pending")),
            pvc("fresh", None),
        ];
        assert_eq!(unbound_pvcs(&pvcs), vec!["data/pending", "data/fresh"]);
    }

    fn create_test_service(
        name: &str,
        type_: &str,
        ingress: Option<Vec<LoadBalancerIngress>>,
    ) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("shop".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(type_.to_string()),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus { ingress }),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_pending_load_balancers() {
        let assigned = LoadBalancerIngress {
            ip: Some("203.0.113.10".to_string()),
            ..Default::default()
        };
        let services = vec![
            create_test_service("no-ingress", "LoadBalancer", None),
            create_test_service("empty-ingress", "LoadBalancer", Some(vec![])),
            create_test_service("assigned", "LoadBalancer", Some(vec![assigned])),
            create_test_service("internal", "ClusterIP", None),
        ];
        assert_eq!(
            pending_load_balancers(&services),
            vec!["shop/no-ingress", "shop/empty-ingress"]
        );
        assert_eq!(load_balancer_services(&services).count(), 3);
    }

    #[test]
    fn test_failed_or_pending_pods() {
        let pods = vec![
            create_test_pod("a", "Running", vec![]),
            create_test_pod("b", "Pending", vec![]),
            create_test_pod("c", "Failed", vec![]),
            create_test_pod("d", "Succeeded", vec![]),
        ];
        assert_eq!(failed_or_pending_pods(&pods), vec!["default/b", "default/c"]);
        assert_eq!(running_count(&pods), (4, 1));
    }
}
