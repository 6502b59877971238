use tracing::{info, warn};

use crate::error::Result;
use crate::provider::{ClusterProvider, PodQuery};
use crate::resources::{pod_id, pod_name};
use crate::safety::is_system_namespace;
use crate::types::{ChaosAction, ChaosExperimentResult};

/// Single guarded chaos primitive: kill the first pod matching a selector.
pub struct FaultInjector<'a, P: ClusterProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: ClusterProvider + ?Sized> FaultInjector<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Nothing is deleted unless `dry_run` is false.
    ///
    /// Delete failures land in the result; only the listing call can fail
    /// the whole experiment.
    pub async fn inject_pod_failure(
        &self,
        namespace: &str,
        selector: &str,
        dry_run: bool,
    ) -> Result<ChaosExperimentResult> {
        let outcome =
            |action, target: Option<String>, error: Option<String>| ChaosExperimentResult {
                action,
                target,
                namespace: namespace.to_string(),
                selector: selector.to_string(),
                error,
            };

        if is_system_namespace(namespace) {
            warn!("refusing chaos experiment in system namespace {}", namespace);
            return Ok(outcome(
                ChaosAction::Refused,
                None,
                Some("refusing system namespace".to_string()),
            ));
        }

        let query = PodQuery::namespaced(namespace).labels(selector);
        let pods = self.provider.list_pods(&query).await?;
        let Some(pod) = pods.first() else {
            info!("no pods matched '{}' in {}", selector, namespace);
            return Ok(outcome(ChaosAction::NoPodsMatched, None, None));
        };
        let target = pod_id(pod);

        if dry_run {
            info!("dry run: would delete {}", target);
            return Ok(outcome(ChaosAction::DryRun, Some(target), None));
        }

        match self.provider.delete_pod(namespace, pod_name(pod)).await {
            Ok(()) => {
                info!("chaos: deleted pod {}", target);
                Ok(outcome(ChaosAction::DeletedPod, Some(target), None))
            }
            Err(e) => {
                warn!("chaos: failed to delete {}: {}", target, e);
                Ok(outcome(ChaosAction::Error, Some(target), Some(e.provider_message())))
            }
        }
    }
}
