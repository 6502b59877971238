use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    Endpoints, Event, Node, PersistentVolumeClaim, Pod, Service,
};
use tracing::debug;

use crate::error::Result;
use crate::provider::{ClusterProvider, PodQuery};
use crate::selector::LabelSelector;

/// Point-in-time view of the cluster assembled from independent reads.
///
/// Each collection comes from its own list call, so they may disagree with
/// one another (a pod may reference a node missing from `nodes`).
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub services: Vec<Service>,
    pub endpoints: Vec<Endpoints>,
    pub events: Vec<Event>,
    pub pvcs: Vec<PersistentVolumeClaim>,
    pub taken_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    /// Pods in `namespace` whose labels match `selector`.
    pub fn pods_matching<'a>(
        &'a self,
        namespace: Option<&'a str>,
        selector: &'a LabelSelector,
    ) -> impl Iterator<Item = &'a Pod> + 'a {
        self.pods.iter().filter(move |pod| {
            namespace.map_or(true, |ns| pod.metadata.namespace.as_deref() == Some(ns))
                && selector.matches(pod.metadata.labels.as_ref())
        })
    }
}

/// Collector structure that groups the reads feeding one detection cycle
pub struct SnapshotCollector<'a, P: ClusterProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: ClusterProvider + ?Sized> SnapshotCollector<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Issue every read concurrently; the first failure aborts the snapshot.
    pub async fn collect(&self) -> Result<ClusterSnapshot> {
        let all_pods = PodQuery::all();
        let (nodes, pods, services, endpoints, events, pvcs) = tokio::try_join!(
            self.provider.list_nodes(),
            self.provider.list_pods(&all_pods),
            self.provider.list_services(None),
            self.provider.list_endpoints(),
            self.provider.list_events(None),
            self.provider.list_persistent_volume_claims(),
        )?;

        debug!(
            nodes = nodes.len(),
            pods = pods.len(),
            services = services.len(),
            pvcs = pvcs.len(),
            "collected cluster snapshot"
        );

        Ok(ClusterSnapshot {
            nodes,
            pods,
            services,
            endpoints,
            events,
            pvcs,
            taken_at: Utc::now(),
        })
    }
}
