
// Public modules
pub mod types;
pub mod config;
pub mod error;
pub mod parsing;
pub mod selector;
pub mod resources;
pub mod provider;
pub mod collector;
pub mod health;
pub mod detect;
pub mod diagnose;
pub mod safety;
pub mod remediation;
pub mod chaos;
pub mod metrics;

// Re-export commonly used items
pub use types::*;
pub use config::{
    load_config, load_config_with_env, EnvironmentProvider, MockEnvironment, SystemEnvironment,
};
pub use error::{Error, Result};
pub use parsing::{parse_cpu_to_millicores, parse_memory_to_bytes, percent_of};
pub use selector::LabelSelector;
pub use provider::{ClusterProvider, KubeProvider, MockClusterProvider, PodQuery};
pub use collector::{ClusterSnapshot, SnapshotCollector};
pub use health::HealthAggregator;
pub use detect::IssueDetector;
pub use diagnose::PodDiagnoser;
pub use safety::{has_controller, is_safe_to_restart, is_system_namespace};
pub use remediation::RemediationExecutor;
pub use chaos::FaultInjector;
pub use metrics::MetricsReader;
