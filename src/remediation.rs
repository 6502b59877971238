use k8s_openapi::api::core::v1::Pod;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::parsing::{parse_cpu_to_millicores, parse_memory_to_bytes};
use crate::provider::{ClusterProvider, PodQuery};
use crate::resources::{
    is_crash_looping, is_pod_ready, pod_id, pod_name, pod_namespace, pod_phase, pod_reason,
};
use crate::safety::{has_controller, restart_refusal};
use crate::types::{
    Config, LimitsResult, RemediationAction, RemediationResult, ResourceLimits, ScaleResult,
};

/// Replica count the API server assumes when `spec.replicas` is unset.
const DEFAULT_REPLICAS: i32 = 1;

/// Gated corrective actions. A failing target never aborts the rest of its batch.
pub struct RemediationExecutor<'a, P: ClusterProvider + ?Sized> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: ClusterProvider + ?Sized> RemediationExecutor<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Delete failed or crash-looping pods so their controller recreates them.
    pub async fn restart_failed_pods(&self) -> Result<RemediationResult> {
        let pods = self.provider.list_pods(&PodQuery::all()).await?;
        let mut result = RemediationResult::new(RemediationAction::RestartPods);

        let candidates = pods
            .iter()
            .filter(|p| pod_phase(p) == "Failed" || is_crash_looping(p));
        for pod in candidates {
            let target = pod_id(pod);
            if let Some(reason) = restart_refusal(pod) {
                info!("skipping {}: {}", target, reason);
                result.skipped(target, reason);
                continue;
            }
            if !has_controller(pod) {
                info!("skipping {}: no controller", target);
                result.skipped(target, "no controller");
                continue;
            }
            self.delete(pod, target, &mut result).await;
        }

        self.log_outcome(&result);
        Ok(result)
    }

    /// Delete pods the kubelet evicted; they never come back on their own.
    pub async fn cleanup_evicted_pods(&self) -> Result<RemediationResult> {
        let query = PodQuery::all().fields("status.phase=Failed");
        let pods = self.provider.list_pods(&query).await?;
        let mut result = RemediationResult::new(RemediationAction::CleanupEvicted);

        let evicted = pods
            .iter()
            .filter(|p| pod_phase(p) == "Failed" && pod_reason(p) == Some("Evicted"));
        for pod in evicted {
            let target = pod_id(pod);
            self.delete(pod, target, &mut result).await;
        }

        self.log_outcome(&result);
        Ok(result)
    }

    /// Delete DNS pods that are not Running and Ready; their deployment replaces them.
    pub async fn fix_dns_issues(&self) -> Result<RemediationResult> {
        let query = PodQuery::namespaced(self.config.dns_namespace.as_str())
            .labels(self.config.dns_label_selector.as_str());
        let pods = self.provider.list_pods(&query).await?;

        let unhealthy: Vec<&Pod> = pods
            .iter()
            .filter(|p| pod_phase(p) != "Running" || !is_pod_ready(p))
            .collect();
        if unhealthy.is_empty() {
            info!("all {} DNS pods healthy", pods.len());
            return Ok(RemediationResult::new(RemediationAction::None));
        }

        let mut result = RemediationResult::new(RemediationAction::RestartCoredns);
        for pod in unhealthy {
            let target = pod_id(pod);
            self.delete(pod, target, &mut result).await;
        }

        self.log_outcome(&result);
        Ok(result)
    }

    /// Set a deployment's replica count. Zero is allowed; the API server
    /// decides whether anything else is.
    pub async fn scale_resources(
        &self,
        namespace: &str,
        deployment: &str,
        replicas: i32,
    ) -> Result<ScaleResult> {
        let current = self.provider.get_deployment(namespace, deployment).await?;
        let previous_replicas = current
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(DEFAULT_REPLICAS);

        self.provider
            .patch_deployment_replicas(namespace, deployment, replicas)
            .await?;
        info!(
            "scaled {}/{} from {} to {} replicas",
            namespace, deployment, previous_replicas, replicas
        );

        Ok(ScaleResult {
            deployment: format!("{}/{}", namespace, deployment),
            previous_replicas,
            new_replicas: replicas,
            status: "scaled".to_string(),
        })
    }

    /// Apply the same CPU and memory limit to every container of a deployment.
    pub async fn apply_resource_limits(
        &self,
        namespace: &str,
        deployment: &str,
        cpu_limit: &str,
        memory_limit: &str,
    ) -> Result<LimitsResult> {
        if parse_cpu_to_millicores(cpu_limit).filter(|mc| *mc > 0).is_none() {
            return Err(Error::InvalidArgument(format!("invalid CPU limit '{}'", cpu_limit)));
        }
        if parse_memory_to_bytes(memory_limit).filter(|b| *b > 0).is_none() {
            return Err(Error::InvalidArgument(format!(
                "invalid memory limit '{}'",
                memory_limit
            )));
        }

        self.provider.get_deployment(namespace, deployment).await?;
        self.provider
            .patch_deployment_limits(namespace, deployment, cpu_limit.trim(), memory_limit.trim())
            .await?;
        info!(
            "applied limits cpu={} memory={} to {}/{}",
            cpu_limit, memory_limit, namespace, deployment
        );

        Ok(LimitsResult {
            deployment: format!("{}/{}", namespace, deployment),
            limits: ResourceLimits {
                cpu: cpu_limit.trim().to_string(),
                memory: memory_limit.trim().to_string(),
            },
            status: "applied".to_string(),
        })
    }

    async fn delete(&self, pod: &Pod, target: String, result: &mut RemediationResult) {
        match self.provider.delete_pod(pod_namespace(pod), pod_name(pod)).await {
            Ok(()) => {
                info!("deleted pod {}", target);
                result.succeeded(target);
            }
            Err(e) => {
                warn!("failed to delete pod {}: {}", target, e);
                result.failed(target, e.provider_message());
            }
        }
    }

    fn log_outcome(&self, result: &RemediationResult) {
        info!(
            action = ?result.action,
            succeeded = result.targets_succeeded.len(),
            failed = result.targets_failed.len(),
            skipped = result.targets_skipped.len(),
            "remediation finished"
        );
    }
}
