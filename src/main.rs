use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use k8s_diagnostics::{
    load_config, Config, FaultInjector, HealthAggregator, IssueDetector, KubeProvider,
    MetricsReader, PodDiagnoser, RemediationExecutor,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Kubernetes cluster diagnostics and guarded remediation")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize node, pod, service and event health
    Health,
    /// Detect common cluster issues
    Detect,
    /// Run network diagnostics (DNS, endpoints, ingress, load balancers)
    Network,
    /// Diagnose a single pod
    Diagnose { namespace: String, pod: String },
    /// Show node and pod resource usage from metrics-server
    Metrics,
    /// Restart failed and crash-looping pods that have a controller
    Fix,
    /// Delete evicted pods
    Cleanup,
    /// Restart unhealthy CoreDNS pods
    Dnsfix,
    /// Scale a deployment
    Scale {
        namespace: String,
        deployment: String,
        #[arg(allow_negative_numbers = true)]
        replicas: i32,
    },
    /// Apply CPU and memory limits to every container of a deployment
    Limits {
        namespace: String,
        deployment: String,
        #[arg(long)]
        cpu: String,
        #[arg(long)]
        memory: String,
    },
    /// Delete the first pod matching a label selector (dry run unless --execute)
    Chaos {
        namespace: String,
        selector: String,
        #[arg(long)]
        execute: bool,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(e) = run(args.command).await {
        error!("{:#}", e);
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    let cfg: Config = load_config()?;
    let provider = KubeProvider::try_default()
        .await
        .context("connecting to the Kubernetes API")?;
    info!("running {:?}", command);

    match command {
        Commands::Health => {
            print_json(&HealthAggregator::new(&provider, &cfg).cluster_health().await?)
        }
        Commands::Detect => {
            print_json(&IssueDetector::new(&provider, &cfg).detect_common_issues().await?)
        }
        Commands::Network => {
            print_json(&IssueDetector::new(&provider, &cfg).check_network().await?)
        }
        Commands::Diagnose { namespace, pod } => print_json(
            &PodDiagnoser::new(&provider, &cfg)
                .diagnose_pod(&namespace, &pod)
                .await?,
        ),
        Commands::Metrics => print_json(&MetricsReader::new(&provider).resource_metrics().await?),
        Commands::Fix => print_json(
            &RemediationExecutor::new(&provider, &cfg)
                .restart_failed_pods()
                .await?,
        ),
        Commands::Cleanup => print_json(
            &RemediationExecutor::new(&provider, &cfg)
                .cleanup_evicted_pods()
                .await?,
        ),
        Commands::Dnsfix => {
            print_json(&RemediationExecutor::new(&provider, &cfg).fix_dns_issues().await?)
        }
        Commands::Scale {
            namespace,
            deployment,
            replicas,
        } => print_json(
            &RemediationExecutor::new(&provider, &cfg)
                .scale_resources(&namespace, &deployment, replicas)
                .await?,
        ),
        Commands::Limits {
            namespace,
            deployment,
            cpu,
            memory,
        } => print_json(
            &RemediationExecutor::new(&provider, &cfg)
                .apply_resource_limits(&namespace, &deployment, &cpu, &memory)
                .await?,
        ),
        Commands::Chaos {
            namespace,
            selector,
            execute,
        } => print_json(
            &FaultInjector::new(&provider)
                .inject_pod_failure(&namespace, &selector, !execute)
                .await?,
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
