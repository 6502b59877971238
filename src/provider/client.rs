use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Endpoints, Event, Node, PersistentVolumeClaim, Pod, Service,
};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ClusterProvider, MetricsList, NodeMetricsItem, PodMetricsItem, PodQuery};
use crate::error::{Error, Result};

const NODE_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/nodes";
const POD_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/pods";

/// [`ClusterProvider`] backed by a live API server connection.
#[derive(Clone)]
pub struct KubeProvider {
    client: Client,
}

impl KubeProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// In-cluster config first, then the local kubeconfig.
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    async fn list_metrics<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        use http::Request as HttpRequest;
        let req = HttpRequest::builder()
            .method("GET")
            .uri(path)
            .body(Vec::new())
            .map_err(|e| Error::InvalidArgument(format!("build request: {}", e)))?;
        match self.client.request::<MetricsList<T>>(req).await {
            Ok(list) => Ok(list.items),
            Err(kube::Error::Api(resp)) if resp.code == 404 || resp.code == 503 => {
                debug!("metrics API answered {}: {}", resp.code, resp.message);
                Err(Error::MetricsUnavailable(resp.message))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn list_params(label_selector: Option<&str>, field_selector: Option<&str>) -> ListParams {
    let mut lp = ListParams::default();
    if let Some(labels) = label_selector {
        lp = lp.labels(labels);
    }
    if let Some(fields) = field_selector {
        lp = lp.fields(fields);
    }
    lp
}

fn map_lookup_error(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => Error::not_found(kind, namespace, name),
        other => Error::Kube(other),
    }
}

#[async_trait]
impl ClusterProvider for KubeProvider {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_pods(&self, query: &PodQuery) -> Result<Vec<Pod>> {
        let api: Api<Pod> = match query.namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let lp = list_params(query.label_selector.as_deref(), query.field_selector.as_deref());
        Ok(api.list(&lp).await?.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| map_lookup_error(e, "pod", namespace, name))
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>> {
        let api: Api<Event> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_services(&self, service_type: Option<&str>) -> Result<Vec<Service>> {
        let api: Api<Service> = Api::all(self.client.clone());
        let fields = service_type.map(|t| format!("spec.type={}", t));
        let lp = list_params(None, fields.as_deref());
        Ok(api.list(&lp).await?.items)
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoints>> {
        let api: Api<Endpoints> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_persistent_volume_claims(&self) -> Result<Vec<PersistentVolumeClaim>> {
        let api: Api<PersistentVolumeClaim> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| map_lookup_error(e, "deployment", namespace, name))
    }

    async fn patch_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_lookup_error(e, "deployment", namespace, name))?;
        Ok(())
    }

    async fn patch_deployment_limits(
        &self,
        namespace: &str,
        name: &str,
        cpu: &str,
        memory: &str,
    ) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployment = api
            .get(name)
            .await
            .map_err(|e| map_lookup_error(e, "deployment", namespace, name))?;

        // Strategic merge keys containers by name, so only limits are touched.
        let containers: Vec<serde_json::Value> = deployment
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .map(|pod_spec| {
                pod_spec
                    .containers
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "name": c.name,
                            "resources": { "limits": { "cpu": cpu, "memory": memory } }
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let patch = serde_json::json!({
            "spec": { "template": { "spec": { "containers": containers } } }
        });
        api.patch(name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await
            .map_err(|e| map_lookup_error(e, "deployment", namespace, name))?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!("pod {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricsItem>> {
        self.list_metrics(NODE_METRICS_PATH).await
    }

    async fn list_pod_metrics(&self) -> Result<Vec<PodMetricsItem>> {
        self.list_metrics(POD_METRICS_PATH).await
    }
}
