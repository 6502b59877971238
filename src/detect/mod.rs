pub mod checks;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::collector::{ClusterSnapshot, SnapshotCollector};
use crate::error::Result;
use crate::provider::ClusterProvider;
use crate::resources::services_without_endpoints;
use crate::selector::LabelSelector;
use crate::types::{
    Config, DetectionReport, DnsStatus, HealthStatus, IngressStatus, Issue, IssueType,
    LoadBalancerReport, NetworkReport, ServiceEndpointReport, Severity,
};

/// Scans a cluster snapshot for common operational anomalies.
pub struct IssueDetector<'a, P: ClusterProvider + ?Sized> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: ClusterProvider + ?Sized> IssueDetector<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Fetch a fresh snapshot and classify it.
    pub async fn detect_common_issues(&self) -> Result<DetectionReport> {
        let snapshot = SnapshotCollector::new(self.provider).collect().await?;
        let report = detect(&snapshot, self.config)?;
        if report.has_issues() {
            warn!("detected {} issue categories", report.issues.len());
        } else {
            info!("no common issues detected");
        }
        Ok(report)
    }

    /// Unclassified network sub-report for display.
    pub async fn check_network(&self) -> Result<NetworkReport> {
        let snapshot = SnapshotCollector::new(self.provider).collect().await?;
        network_report(&snapshot, self.config)
    }
}

/// Classify a snapshot. Checks run in a fixed order and only non-empty
/// findings produce an entry.
pub fn detect(snapshot: &ClusterSnapshot, config: &Config) -> Result<DetectionReport> {
    let now = snapshot.taken_at;
    let limit = config.max_issue_details;
    let mut issues = Vec::new();

    let mut push = |issue_type, severity, found: Vec<String>| {
        if let Some(issue) = classify(issue_type, severity, found, limit, now) {
            issues.push(issue);
        }
    };

    push(
        IssueType::NodesNotReady,
        Severity::High,
        checks::not_ready_nodes(&snapshot.nodes),
    );
    push(
        IssueType::FailedPods,
        Severity::High,
        checks::failed_or_pending_pods(&snapshot.pods),
    );
    push(
        IssueType::ImagePullErrors,
        Severity::High,
        checks::image_pull_errors(&snapshot.pods),
    );
    push(
        IssueType::PvcNotBound,
        Severity::Medium,
        checks::unbound_pvcs(&snapshot.pvcs),
    );

    let dns = dns_status(snapshot, config)?;
    if dns.running_pods == 0 {
        push(
            IssueType::DnsUnhealthy,
            Severity::High,
            vec![format!(
                "CoreDNS pods not running (0/{} running in {})",
                dns.coredns_pods, config.dns_namespace
            )],
        );
    }

    push(
        IssueType::LoadBalancerPending,
        Severity::Medium,
        checks::pending_load_balancers(&snapshot.services),
    );
    push(
        IssueType::HighRestartCount,
        Severity::Medium,
        checks::high_restart_pods(&snapshot.pods, config.restart_threshold),
    );

    Ok(DetectionReport {
        issues,
        timestamp: now,
    })
}

fn classify(
    issue_type: IssueType,
    severity: Severity,
    found: Vec<String>,
    limit: usize,
    timestamp: DateTime<Utc>,
) -> Option<Issue> {
    if found.is_empty() {
        return None;
    }
    let count = found.len();
    let mut details = found;
    details.truncate(limit);
    Some(Issue {
        issue_type,
        severity,
        count,
        details,
        timestamp,
    })
}

pub fn dns_status(snapshot: &ClusterSnapshot, config: &Config) -> Result<DnsStatus> {
    let selector = LabelSelector::parse(&config.dns_label_selector)?;
    let dns_pods = snapshot.pods_matching(Some(config.dns_namespace.as_str()), &selector);
    let (total, running) = checks::running_count(dns_pods);
    Ok(DnsStatus {
        coredns_pods: total,
        running_pods: running,
        status: if running > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
    })
}

pub fn network_report(snapshot: &ClusterSnapshot, config: &Config) -> Result<NetworkReport> {
    let ingress_selector = LabelSelector::parse(&config.ingress_label_selector)?;
    let (ingress_pods, ingress_running) =
        checks::running_count(snapshot.pods_matching(None, &ingress_selector));

    Ok(NetworkReport {
        dns: dns_status(snapshot, config)?,
        services: ServiceEndpointReport {
            total_services: snapshot.services.len(),
            services_without_endpoints: services_without_endpoints(
                &snapshot.services,
                &snapshot.endpoints,
            ),
        },
        ingress: IngressStatus {
            nginx_ingress_pods: ingress_pods,
            running: ingress_running,
        },
        load_balancers: LoadBalancerReport {
            pending: checks::pending_load_balancers(&snapshot.services),
            total: checks::load_balancer_services(&snapshot.services).count(),
        },
    })
}
