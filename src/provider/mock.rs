use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, Node, PersistentVolumeClaim, Pod, ResourceRequirements, Service,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::{ClusterProvider, NodeMetricsItem, PodMetricsItem, PodQuery};
use crate::error::{Error, Result};
use crate::selector::LabelSelector;

const METRICS_NOT_SERVED: &str = "the server could not find the requested resource";

#[derive(Debug, Default)]
struct MockState {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    services: Vec<Service>,
    endpoints: Vec<Endpoints>,
    events: Vec<Event>,
    pvcs: Vec<PersistentVolumeClaim>,
    deployments: Vec<Deployment>,
    node_metrics: Option<Vec<NodeMetricsItem>>,
    pod_metrics: Option<Vec<PodMetricsItem>>,
    delete_failures: HashMap<String, String>,
    list_failures: HashMap<String, String>,
}

/// In-memory [`ClusterProvider`] for tests and local experiments.
///
/// Deletes remove the pod from the in-memory state, so follow-up reads see the
/// write. Call counters let tests assert which primitives were touched.
#[derive(Debug, Default)]
pub struct MockClusterProvider {
    state: Mutex<MockState>,
    delete_calls: AtomicUsize,
    list_pod_calls: AtomicUsize,
    patch_calls: AtomicUsize,
}

impl MockClusterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(self, nodes: Vec<Node>) -> Self {
        self.state().nodes = nodes;
        self
    }

    pub fn with_pods(self, pods: Vec<Pod>) -> Self {
        self.state().pods = pods;
        self
    }

    pub fn with_services(self, services: Vec<Service>) -> Self {
        self.state().services = services;
        self
    }

    pub fn with_endpoints(self, endpoints: Vec<Endpoints>) -> Self {
        self.state().endpoints = endpoints;
        self
    }

    pub fn with_events(self, events: Vec<Event>) -> Self {
        self.state().events = events;
        self
    }

    pub fn with_pvcs(self, pvcs: Vec<PersistentVolumeClaim>) -> Self {
        self.state().pvcs = pvcs;
        self
    }

    pub fn with_deployments(self, deployments: Vec<Deployment>) -> Self {
        self.state().deployments = deployments;
        self
    }

    /// Without this the metrics API behaves as if metrics-server were not installed.
    pub fn with_metrics(self, nodes: Vec<NodeMetricsItem>, pods: Vec<PodMetricsItem>) -> Self {
        {
            let mut state = self.state();
            state.node_metrics = Some(nodes);
            state.pod_metrics = Some(pods);
        }
        self
    }

    /// Make deletes of `namespace/name` fail with `message`.
    pub fn fail_delete(self, namespace: &str, name: &str, message: &str) -> Self {
        self.state()
            .delete_failures
            .insert(format!("{}/{}", namespace, name), message.to_string());
        self
    }

    /// Make every listing of `kind` (`nodes`, `pods`, `services`, `endpoints`,
    /// `events`, `pvcs`, `metrics`) fail with `message`.
    pub fn fail_list(self, kind: &str, message: &str) -> Self {
        self.state()
            .list_failures
            .insert(kind.to_string(), message.to_string());
        self
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn list_pod_calls(&self) -> usize {
        self.list_pod_calls.load(Ordering::SeqCst)
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    /// Current `namespace/name` identifiers of all pods.
    pub fn pod_ids(&self) -> Vec<String> {
        self.state()
            .pods
            .iter()
            .map(|p| {
                format!(
                    "{}/{}",
                    p.metadata.namespace.as_deref().unwrap_or_default(),
                    p.metadata.name.as_deref().unwrap_or_default()
                )
            })
            .collect()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.state()
            .deployments
            .iter()
            .find(|d| is_named(&d.metadata, namespace, name))
            .cloned()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_list(&self, kind: &str) -> Result<()> {
        match self.state().list_failures.get(kind) {
            Some(message) => Err(Error::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn is_named(
    meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
    namespace: &str,
    name: &str,
) -> bool {
    meta.namespace.as_deref() == Some(namespace) && meta.name.as_deref() == Some(name)
}

fn pod_field<'a>(pod: &'a Pod, field: &str) -> Result<Option<&'a str>> {
    Ok(match field {
        "metadata.name" => pod.metadata.name.as_deref(),
        "metadata.namespace" => pod.metadata.namespace.as_deref(),
        "status.phase" => pod.status.as_ref().and_then(|s| s.phase.as_deref()),
        "spec.nodeName" => pod.spec.as_ref().and_then(|s| s.node_name.as_deref()),
        other => {
            return Err(Error::Api {
                status: 400,
                message: format!("field label not supported: {}", other),
            })
        }
    })
}

fn matches_fields(pod: &Pod, selector: &str) -> Result<bool> {
    for part in selector.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, expected, negate) = if let Some((f, v)) = part.split_once("!=") {
            (f, v, true)
        } else if let Some((f, v)) = part.split_once("==") {
            (f, v, false)
        } else if let Some((f, v)) = part.split_once('=') {
            (f, v, false)
        } else {
            return Err(Error::Api {
                status: 400,
                message: format!("invalid field selector: {}", part),
            });
        };
        let actual = pod_field(pod, field.trim())?.unwrap_or_default();
        if (actual == expected.trim()) == negate {
            return Ok(false);
        }
    }
    Ok(true)
}

#[async_trait]
impl ClusterProvider for MockClusterProvider {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.check_list("nodes")?;
        Ok(self.state().nodes.clone())
    }

    async fn list_pods(&self, query: &PodQuery) -> Result<Vec<Pod>> {
        self.list_pod_calls.fetch_add(1, Ordering::SeqCst);
        self.check_list("pods")?;
        let labels = query
            .label_selector
            .as_deref()
            .map(LabelSelector::parse)
            .transpose()?;

        let state = self.state();
        let mut out = Vec::new();
        for pod in &state.pods {
            if let Some(ns) = query.namespace.as_deref() {
                if pod.metadata.namespace.as_deref() != Some(ns) {
                    continue;
                }
            }
            if let Some(sel) = labels.as_ref() {
                if !sel.matches(pod.metadata.labels.as_ref()) {
                    continue;
                }
            }
            if let Some(fields) = query.field_selector.as_deref() {
                if !matches_fields(pod, fields)? {
                    continue;
                }
            }
            out.push(pod.clone());
        }
        Ok(out)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.state()
            .pods
            .iter()
            .find(|p| is_named(&p.metadata, namespace, name))
            .cloned()
            .ok_or_else(|| Error::not_found("pod", namespace, name))
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>> {
        self.check_list("events")?;
        Ok(self
            .state()
            .events
            .iter()
            .filter(|e| namespace.is_none() || e.metadata.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn list_services(&self, service_type: Option<&str>) -> Result<Vec<Service>> {
        self.check_list("services")?;
        Ok(self
            .state()
            .services
            .iter()
            .filter(|svc| {
                service_type.map_or(true, |wanted| {
                    let actual = svc
                        .spec
                        .as_ref()
                        .and_then(|s| s.type_.as_deref())
                        .unwrap_or("ClusterIP");
                    actual == wanted
                })
            })
            .cloned()
            .collect())
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoints>> {
        self.check_list("endpoints")?;
        Ok(self.state().endpoints.clone())
    }

    async fn list_persistent_volume_claims(&self) -> Result<Vec<PersistentVolumeClaim>> {
        self.check_list("pvcs")?;
        Ok(self.state().pvcs.clone())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        self.deployment(namespace, name)
            .ok_or_else(|| Error::not_found("deployment", namespace, name))
    }

    async fn patch_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<()> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        if replicas < 0 {
            return Err(Error::Api {
                status: 422,
                message: format!(
                    "Deployment.apps \"{}\" is invalid: spec.replicas: Invalid value: {}: \
                     must be greater than or equal to 0",
                    name, replicas
                ),
            });
        }
        let mut state = self.state();
        let deployment = state
            .deployments
            .iter_mut()
            .find(|d| is_named(&d.metadata, namespace, name))
            .ok_or_else(|| Error::not_found("deployment", namespace, name))?;
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
        Ok(())
    }

    async fn patch_deployment_limits(
        &self,
        namespace: &str,
        name: &str,
        cpu: &str,
        memory: &str,
    ) -> Result<()> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        let deployment = state
            .deployments
            .iter_mut()
            .find(|d| is_named(&d.metadata, namespace, name))
            .ok_or_else(|| Error::not_found("deployment", namespace, name))?;
        let containers = deployment
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .map(|p| p.containers.iter_mut());
        for container in containers.into_iter().flatten() {
            let resources = container
                .resources
                .get_or_insert_with(ResourceRequirements::default);
            let limits = resources.limits.get_or_insert_with(BTreeMap::new);
            limits.insert("cpu".to_string(), Quantity(cpu.to_string()));
            limits.insert("memory".to_string(), Quantity(memory.to_string()));
        }
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(message) = state.delete_failures.get(&format!("{}/{}", namespace, name)) {
            return Err(Error::Api {
                status: 500,
                message: message.clone(),
            });
        }
        state.pods.retain(|p| !is_named(&p.metadata, namespace, name));
        Ok(())
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricsItem>> {
        self.check_list("metrics")?;
        self.state()
            .node_metrics
            .clone()
            .ok_or_else(|| Error::MetricsUnavailable(METRICS_NOT_SERVED.to_string()))
    }

    async fn list_pod_metrics(&self) -> Result<Vec<PodMetricsItem>> {
        self.check_list("metrics")?;
        self.state()
            .pod_metrics
            .clone()
            .ok_or_else(|| Error::MetricsUnavailable(METRICS_NOT_SERVED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn create_test_pod(namespace: &str, name: &str, phase: &str, node: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(node.to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    fn provider() -> MockClusterProvider {
        MockClusterProvider::new().with_pods(vec![
            create_test_pod("default", "web", "Running", "node-a"),
            create_test_pod("default", "batch", "Failed", "node-b"),
            create_test_pod("other", "web", "Pending", "node-a"),
        ])
    }

    #[tokio::test]
    async fn test_list_pods_filters() {
        let p = provider();
        assert_eq!(p.list_pods(&PodQuery::all()).await.unwrap().len(), 3);
        assert_eq!(p.list_pods(&PodQuery::namespaced("default")).await.unwrap().len(), 2);
        assert_eq!(
            p.list_pods(&PodQuery::all().labels("app=web")).await.unwrap().len(),
            2
        );
        assert_eq!(
            p.list_pods(&PodQuery::all().fields("status.phase=Failed")).await.unwrap().len(),
            1
        );
        assert_eq!(
            p.list_pods(&PodQuery::all().fields("spec.nodeName!=node-a")).await.unwrap().len(),
            1
        );
        assert_eq!(p.list_pod_calls(), 5);
    }

    #[tokio::test]
    async fn test_unsupported_field_selector_is_rejected() {
        let err = provider()
            .list_pods(&PodQuery::all().fields("status.reason=Evicted"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("field label not supported"));
    }

    #[tokio::test]
    async fn test_delete_removes_pod_and_tolerates_missing() {
        let p = provider();
        p.delete_pod("default", "web").await.unwrap();
        p.delete_pod("default", "web").await.unwrap();
        assert_eq!(p.delete_calls(), 2);
        assert_eq!(p.pod_ids(), vec!["default/batch", "other/web"]);
    }

    #[tokio::test]
    async fn test_injected_delete_failure() {
        let p = provider().fail_delete("default", "web", "etcdserver: request timed out");
        let err = p.delete_pod("default", "web").await.unwrap_err();
        assert_eq!(err.to_string(), "API error: 500 - etcdserver: request timed out");
        assert_eq!(p.pod_ids().len(), 3);
    }

    #[tokio::test]
    async fn test_metrics_unavailable_by_default() {
        let err = MockClusterProvider::new().list_node_metrics().await.unwrap_err();
        assert!(matches!(err, Error::MetricsUnavailable(_)));
    }
}
