//! Accessors over `k8s-openapi` records. Every field on those types is
//! optional; these helpers collapse absence into empty/false.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Endpoints, Event, Node, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// `namespace/name` identifier used in every report.
pub fn object_id(meta: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    )
}

pub fn pod_id(pod: &Pod) -> String {
    object_id(&pod.metadata)
}

pub fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

pub fn pod_namespace(pod: &Pod) -> &str {
    pod.metadata.namespace.as_deref().unwrap_or_default()
}

pub fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("")
}

pub fn pod_reason(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.reason.as_deref())
}

pub fn container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default()
}

pub fn waiting_reason(cs: &ContainerStatus) -> Option<&str> {
    cs.state
        .as_ref()
        .and_then(|s| s.waiting.as_ref())
        .and_then(|w| w.reason.as_deref())
}

/// True when the pod reports a `Ready` condition with status `True`.
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status == "True")
        .unwrap_or(false)
}

pub fn is_crash_looping(pod: &Pod) -> bool {
    container_statuses(pod)
        .iter()
        .any(|cs| waiting_reason(cs) == Some("CrashLoopBackOff"))
}

/// True when the node reports a `Ready` condition with status `True`.
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

pub fn service_type(svc: &Service) -> &str {
    svc.spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .unwrap_or("ClusterIP")
}

pub fn has_load_balancer_ingress(svc: &Service) -> bool {
    svc.status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| !ingress.is_empty())
        .unwrap_or(false)
}

/// Identifiers of services whose Endpoints object exists but has no subsets.
///
/// A service with no Endpoints object at all is not reported.
pub fn services_without_endpoints(services: &[Service], endpoints: &[Endpoints]) -> Vec<String> {
    services
        .iter()
        .filter(|svc| {
            endpoints
                .iter()
                .find(|ep| {
                    ep.metadata.name == svc.metadata.name
                        && ep.metadata.namespace == svc.metadata.namespace
                })
                .map(|ep| ep.subsets.as_ref().map_or(true, |s| s.is_empty()))
                .unwrap_or(false)
        })
        .map(|svc| object_id(&svc.metadata))
        .collect()
}

/// Best timestamp an event carries, newest field first.
pub fn event_time(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.first_timestamp.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateWaiting, EndpointSubset, LoadBalancerIngress,
        LoadBalancerStatus, NodeCondition, NodeStatus, PodCondition, PodStatus, ServiceSpec,
        ServiceStatus,
    };

    fn meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let pod = Pod::default();
        assert_eq!(pod_id(&pod), "/");
        assert_eq!(pod_phase(&pod), "");
        assert!(container_statuses(&pod).is_empty());
        assert!(!is_pod_ready(&pod));
        assert!(!is_crash_looping(&pod));
        assert!(!is_node_ready(&Node::default()));
    }

    #[test]
    fn test_readiness() {
        let mut pod = Pod {
            metadata: meta("default", "web"),
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(is_pod_ready(&pod));
        pod.status.as_mut().unwrap().conditions.as_mut().unwrap()[0].status = "False".to_string();
        assert!(!is_pod_ready(&pod));

        let node = Node {
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: "Unknown".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!is_node_ready(&node));
    }

    #[test]
    fn test_crash_loop_detection() {
        let pod = Pod {
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                container_statuses: Some(vec![ContainerStatus {
                    name: "app".to_string(),
                    state: Some(ContainerState {
                        waiting: Some(ContainerStateWaiting {
                            reason: Some("CrashLoopBackOff".to_string()),
                            message: None,
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(is_crash_looping(&pod));
    }

    #[test]
    fn test_services_without_endpoints() {
        let services = vec![
            Service { metadata: meta("default", "empty"), ..Default::default() },
            Service { metadata: meta("default", "backed"), ..Default::default() },
            Service { metadata: meta("default", "orphan"), ..Default::default() },
        ];
        let endpoints = vec![
            Endpoints { metadata: meta("default", "empty"), subsets: None },
            Endpoints {
                metadata: meta("default", "backed"),
                subsets: Some(vec![EndpointSubset::default()]),
            },
        ];
        assert_eq!(services_without_endpoints(&services, &endpoints), vec!["default/empty"]);
    }

    #[test]
    fn test_load_balancer_ingress() {
        let mut svc = Service {
            metadata: meta("default", "lb"),
            spec: Some(ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus { ingress: Some(vec![]) }),
                ..Default::default()
            }),
        };
        assert_eq!(service_type(&svc), "LoadBalancer");
        assert!(!has_load_balancer_ingress(&svc));

        svc.status.as_mut().unwrap().load_balancer = Some(LoadBalancerStatus {
            ingress: Some(vec![LoadBalancerIngress {
                ip: Some("203.0.113.10".to_string()),
                ..Default::default()
            }]),
        });
        assert!(has_load_balancer_ingress(&svc));
        assert_eq!(service_type(&Service::default()), "ClusterIP");
    }
}
