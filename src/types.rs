use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub dns_namespace: String,
    pub dns_label_selector: String,
    pub ingress_label_selector: String,
    /// Cluster-wide restart threshold used by issue detection.
    pub restart_threshold: i32,
    /// Per-pod restart threshold used by diagnosis; lower than the cluster-wide one.
    pub pod_restart_threshold: i32,
    pub max_issue_details: usize,
    pub max_pod_events: usize,
    pub max_warning_events: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dns_namespace: "kube-system".to_string(),
            dns_label_selector: "k8s-app=kube-dns".to_string(),
            ingress_label_selector: "app.kubernetes.io/name=ingress-nginx".to_string(),
            restart_threshold: 10,
            pod_restart_threshold: 5,
            max_issue_details: 5,
            max_pod_events: 10,
            max_warning_events: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

// ----- health -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub nodes: NodeHealth,
    pub pods: PodHealth,
    pub services: ServiceHealth,
    pub events: Vec<WarningEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHealth {
    pub total: usize,
    pub ready: usize,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodHealth {
    pub total: usize,
    pub running: usize,
    pub failed: Vec<PodPhaseInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodPhaseInfo {
    pub name: String,
    pub namespace: String,
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub total: usize,
    pub without_endpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEvent {
    pub namespace: String,
    pub object: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

// ----- issue detection -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    NodesNotReady,
    FailedPods,
    ImagePullErrors,
    PvcNotBound,
    DnsUnhealthy,
    LoadBalancerPending,
    HighRestartCount,
}

/// One classified finding. `count` is the true cardinality; `details` is a
/// sample of at most `Config::max_issue_details` identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub count: usize,
    #[serde(alias = "sample_targets")]
    pub details: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub issues: Vec<Issue>,
    pub timestamp: DateTime<Utc>,
}

impl DetectionReport {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn find(&self, issue_type: IssueType) -> Option<&Issue> {
        self.issues.iter().find(|i| i.issue_type == issue_type)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

// ----- network -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub dns: DnsStatus,
    pub services: ServiceEndpointReport,
    pub ingress: IngressStatus,
    pub load_balancers: LoadBalancerReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsStatus {
    pub coredns_pods: usize,
    pub running_pods: usize,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpointReport {
    pub total_services: usize,
    pub services_without_endpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressStatus {
    pub nginx_ingress_pods: usize,
    pub running: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerReport {
    pub pending: Vec<String>,
    pub total: usize,
}

// ----- pod diagnosis -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodDiagnosis {
    pub pod_info: PodInfo,
    pub containers: Vec<ContainerDiagnosis>,
    pub resources: ResourceSpec,
    pub events: Vec<PodEvent>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: Option<String>,
    pub node: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDiagnosis {
    pub name: String,
    pub ready: bool,
    pub restart_count: i32,
    pub state: String,
    pub image: String,
}

/// Requests and limits keyed by container name, then resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub requests: BTreeMap<String, BTreeMap<String, String>>,
    pub limits: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodEvent {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

// ----- remediation -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    None,
    RestartPods,
    CleanupEvicted,
    RestartCoredns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStatus {
    Ok,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTarget {
    pub target: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTarget {
    pub target: String,
    pub reason: String,
}

/// Outcome of a batch remediation. Always produced, even when every target failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationResult {
    pub action: RemediationAction,
    pub status: RemediationStatus,
    pub targets_succeeded: Vec<String>,
    pub targets_failed: Vec<FailedTarget>,
    pub targets_skipped: Vec<SkippedTarget>,
}

impl RemediationResult {
    pub fn new(action: RemediationAction) -> Self {
        Self {
            action,
            status: RemediationStatus::Ok,
            targets_succeeded: Vec::new(),
            targets_failed: Vec::new(),
            targets_skipped: Vec::new(),
        }
    }

    pub fn succeeded(&mut self, target: impl Into<String>) {
        self.targets_succeeded.push(target.into());
        self.refresh_status();
    }

    pub fn failed(&mut self, target: impl Into<String>, error: impl Into<String>) {
        self.targets_failed.push(FailedTarget {
            target: target.into(),
            error: error.into(),
        });
        self.refresh_status();
    }

    pub fn skipped(&mut self, target: impl Into<String>, reason: impl Into<String>) {
        self.targets_skipped.push(SkippedTarget {
            target: target.into(),
            reason: reason.into(),
        });
    }

    fn refresh_status(&mut self) {
        self.status = match (self.targets_succeeded.is_empty(), self.targets_failed.is_empty()) {
            (_, true) => RemediationStatus::Ok,
            (false, false) => RemediationStatus::Partial,
            (true, false) => RemediationStatus::Failed,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleResult {
    pub deployment: String,
    pub previous_replicas: i32,
    pub new_replicas: i32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsResult {
    pub deployment: String,
    pub limits: ResourceLimits,
    pub status: String,
}

// ----- chaos -----

/// Serialized as one of five values: `dry_run`, `deleted_pod`, `no_pods_matched`,
/// `refused` (protected namespace, nothing was read) or `error` (the delete failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosAction {
    DryRun,
    DeletedPod,
    NoPodsMatched,
    Refused,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosExperimentResult {
    pub action: ChaosAction,
    pub target: Option<String>,
    pub namespace: String,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ----- resource metrics -----

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UsageTotals {
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub name: String,
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub nodes: Vec<NodeUsage>,
    pub pods: Vec<PodUsage>,
}

/// Metrics are optional cluster functionality; their absence is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricsAvailability {
    Available(ResourceMetrics),
    Unavailable { reason: String },
}
