use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ContainerState, Event, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::info;

use crate::error::Result;
use crate::provider::ClusterProvider;
use crate::resources::{container_statuses, event_time, pod_phase};
use crate::types::{
    Config, ContainerDiagnosis, PodDiagnosis, PodEvent, PodInfo, ResourceSpec,
};

/// Deep single-pod analysis.
pub struct PodDiagnoser<'a, P: ClusterProvider + ?Sized> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: ClusterProvider + ?Sized> PodDiagnoser<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Fails with `Error::NotFound` if the pod does not exist.
    pub async fn diagnose_pod(&self, namespace: &str, name: &str) -> Result<PodDiagnosis> {
        let pod = self.provider.get_pod(namespace, name).await?;
        let events = self.provider.list_events(Some(namespace)).await?;

        let diagnosis = PodDiagnosis {
            pod_info: pod_info(&pod),
            containers: analyze_containers(&pod),
            resources: resource_spec(&pod),
            events: pod_events(&events, name, self.config.max_pod_events),
            issues: detect_pod_issues(&pod, self.config.pod_restart_threshold),
        };
        info!(
            "diagnosed {}/{}: {} issue(s)",
            namespace,
            name,
            diagnosis.issues.len()
        );
        Ok(diagnosis)
    }
}

fn pod_info(pod: &Pod) -> PodInfo {
    PodInfo {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        phase: pod.status.as_ref().and_then(|s| s.phase.clone()),
        node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        created: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
    }
}

fn describe_state(state: Option<&ContainerState>) -> String {
    let Some(state) = state else {
        return "unknown".to_string();
    };
    if let Some(waiting) = state.waiting.as_ref() {
        return match waiting.reason.as_deref() {
            Some(reason) => format!("waiting: {}", reason),
            None => "waiting".to_string(),
        };
    }
    if let Some(terminated) = state.terminated.as_ref() {
        return match terminated.reason.as_deref() {
            Some(reason) => format!("terminated: {} (exit {})", reason, terminated.exit_code),
            None => format!("terminated (exit {})", terminated.exit_code),
        };
    }
    if state.running.is_some() {
        return "running".to_string();
    }
    "unknown".to_string()
}

fn analyze_containers(pod: &Pod) -> Vec<ContainerDiagnosis> {
    container_statuses(pod)
        .iter()
        .map(|cs| ContainerDiagnosis {
            name: cs.name.clone(),
            ready: cs.ready,
            restart_count: cs.restart_count,
            state: describe_state(cs.state.as_ref()),
            image: cs.image.clone(),
        })
        .collect()
}

fn quantities(map: Option<&BTreeMap<String, Quantity>>) -> Option<BTreeMap<String, String>> {
    map.filter(|m| !m.is_empty())
        .map(|m| m.iter().map(|(k, q)| (k.clone(), q.0.clone())).collect())
}

fn resource_spec(pod: &Pod) -> ResourceSpec {
    let mut spec = ResourceSpec::default();
    let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();
    for container in containers {
        let Some(resources) = container.resources.as_ref() else {
            continue;
        };
        if let Some(requests) = quantities(resources.requests.as_ref()) {
            spec.requests.insert(container.name.clone(), requests);
        }
        if let Some(limits) = quantities(resources.limits.as_ref()) {
            spec.limits.insert(container.name.clone(), limits);
        }
    }
    spec
}

/// Events about `pod_name`, newest first, at most `limit`.
fn pod_events(events: &[Event], pod_name: &str, limit: usize) -> Vec<PodEvent> {
    let mut matching: Vec<PodEvent> = events
        .iter()
        .filter(|e| e.involved_object.name.as_deref() == Some(pod_name))
        .map(|e| PodEvent {
            type_: e.type_.clone(),
            reason: e.reason.clone(),
            message: e.message.clone(),
            time: event_time(e),
        })
        .collect();
    // None sorts before Some, so undated events fall to the end when reversed.
    matching.sort_by(|a, b| b.time.cmp(&a.time));
    matching.truncate(limit);
    matching
}

/// Heuristics tuned for a single pod; the restart threshold is lower than the
/// cluster-wide one used by issue detection.
fn detect_pod_issues(pod: &Pod, restart_threshold: i32) -> Vec<String> {
    let mut issues = Vec::new();
    if pod_phase(pod) == "Pending" {
        issues.push("Pod stuck in Pending state".to_string());
    }
    for cs in container_statuses(pod) {
        if cs.restart_count > restart_threshold {
            issues.push(format!(
                "Container {} has high restart count: {}",
                cs.name, cs.restart_count
            ));
        }
        if !cs.ready {
            issues.push(format!("Container {} is not ready", cs.name));
        }
    }
    issues
}
