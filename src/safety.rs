//! Predicates gating which pods automated actions may touch.

use k8s_openapi::api::core::v1::Pod;

use crate::resources::pod_namespace;

/// Control-plane namespaces no automated destructive action may target.
pub const SYSTEM_NAMESPACES: &[&str] = &["kube-system", "kube-public", "kube-node-lease"];

/// Labels the Job controller stamps on the pods it owns.
pub const JOB_LABELS: &[&str] = &["job-name", "batch.kubernetes.io/job-name"];

pub fn is_system_namespace(namespace: &str) -> bool {
    SYSTEM_NAMESPACES.contains(&namespace)
}

/// Why a pod must not be restarted, or `None` if it may be.
pub fn restart_refusal(pod: &Pod) -> Option<&'static str> {
    if is_system_namespace(pod_namespace(pod)) {
        return Some("system namespace");
    }
    let job_owned = pod
        .metadata
        .labels
        .as_ref()
        .map(|labels| JOB_LABELS.iter().any(|l| labels.contains_key(*l)))
        .unwrap_or(false);
    if job_owned {
        return Some("managed by job");
    }
    None
}

pub fn is_safe_to_restart(pod: &Pod) -> bool {
    restart_refusal(pod).is_none()
}

/// Deleting a pod without an owner destroys it for good, nothing recreates it.
pub fn has_controller(pod: &Pod) -> bool {
    pod.metadata
        .owner_references
        .as_ref()
        .map(|refs| !refs.is_empty())
        .unwrap_or(false)
}
