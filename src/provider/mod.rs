//! Read/write capability over cluster resources.
//!
//! The diagnostics core never talks to the API server directly; every
//! component receives a [`ClusterProvider`] by reference. Each method is one
//! round trip, and no two calls are guaranteed to observe the same
//! resourceVersion.

use std::collections::HashMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, Node, PersistentVolumeClaim, Pod, Service,
};
use serde::Deserialize;

use crate::error::Result;

pub mod client;
pub mod mock;

pub use self::client::KubeProvider;
pub use self::mock::MockClusterProvider;

/// Filters for a pod listing. `namespace: None` lists across all namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodQuery {
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl PodQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    pub fn labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn fields(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsMetadata {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    #[serde(default)]
    pub usage: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodMetricsItem {
    #[serde(default)]
    pub metadata: MetricsMetadata,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeMetricsItem {
    #[serde(default)]
    pub metadata: MetricsMetadata,
    #[serde(default)]
    pub usage: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetricsList<T> {
    pub items: Vec<T>,
}

#[async_trait]
pub trait ClusterProvider: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn list_pods(&self, query: &PodQuery) -> Result<Vec<Pod>>;

    /// Fails with `Error::NotFound` when the pod does not exist.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// `None` lists events cluster-wide.
    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>>;

    /// Cluster-wide; `service_type` narrows to e.g. `LoadBalancer`.
    async fn list_services(&self, service_type: Option<&str>) -> Result<Vec<Service>>;

    async fn list_endpoints(&self) -> Result<Vec<Endpoints>>;

    async fn list_persistent_volume_claims(&self) -> Result<Vec<PersistentVolumeClaim>>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment>;

    async fn patch_deployment_replicas(&self, namespace: &str, name: &str, replicas: i32)
        -> Result<()>;

    /// Sets `limits.cpu` and `limits.memory` on every container of the pod template.
    async fn patch_deployment_limits(
        &self,
        namespace: &str,
        name: &str,
        cpu: &str,
        memory: &str,
    ) -> Result<()>;

    /// Deleting a pod that is already gone succeeds.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    /// Fails with `Error::MetricsUnavailable` when metrics.k8s.io is not served.
    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricsItem>>;

    /// Fails with `Error::MetricsUnavailable` when metrics.k8s.io is not served.
    async fn list_pod_metrics(&self) -> Result<Vec<PodMetricsItem>>;
}
