use anyhow::{Context, Result};
use std::collections::HashMap;
use std::str::FromStr;

use crate::selector::LabelSelector;
use crate::types::Config;

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let defaults = Config::default();

    let dns_namespace = non_empty(env, "DNS_NAMESPACE").unwrap_or(defaults.dns_namespace);

    let dns_label_selector = selector_var(env, "DNS_LABEL_SELECTOR")?
        .unwrap_or(defaults.dns_label_selector);
    let ingress_label_selector = selector_var(env, "INGRESS_LABEL_SELECTOR")?
        .unwrap_or(defaults.ingress_label_selector);

    let restart_threshold = parsed_var(env, "RESTART_THRESHOLD")?
        .unwrap_or(defaults.restart_threshold);
    let pod_restart_threshold = parsed_var(env, "POD_RESTART_THRESHOLD")?
        .unwrap_or(defaults.pod_restart_threshold);
    let max_issue_details = parsed_var(env, "MAX_ISSUE_DETAILS")?
        .unwrap_or(defaults.max_issue_details);
    let max_pod_events = parsed_var(env, "MAX_POD_EVENTS")?
        .unwrap_or(defaults.max_pod_events);
    let max_warning_events = parsed_var(env, "MAX_WARNING_EVENTS")?
        .unwrap_or(defaults.max_warning_events);

    Ok(Config {
        dns_namespace,
        dns_label_selector,
        ingress_label_selector,
        restart_threshold,
        pod_restart_threshold,
        max_issue_details,
        max_pod_events,
        max_warning_events,
    })
}

fn non_empty<E: EnvironmentProvider>(env: &E, key: &str) -> Option<String> {
    env.get_var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvironmentProvider,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty(env, key)
        .map(|v| v.parse::<T>().with_context(|| format!("Invalid {}: '{}'", key, v)))
        .transpose()
}

fn selector_var<E: EnvironmentProvider>(env: &E, key: &str) -> Result<Option<String>> {
    match non_empty(env, key) {
        Some(raw) => {
            LabelSelector::parse(&raw).with_context(|| format!("Invalid {}", key))?;
            Ok(Some(raw))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_loading_with_env() {
        let env = MockEnvironment::new()
            .with_var("DNS_NAMESPACE", "dns-system")
            .with_var("DNS_LABEL_SELECTOR", "app=coredns")
            .with_var("INGRESS_LABEL_SELECTOR", "app=traefik")
            .with_var("RESTART_THRESHOLD", "20")
            .with_var("POD_RESTART_THRESHOLD", "3")
            .with_var("MAX_ISSUE_DETAILS", "8")
            .with_var("MAX_POD_EVENTS", "25")
            .with_var("MAX_WARNING_EVENTS", "50");

        let config = load_config_with_env(&env).unwrap();

        assert_eq!(config.dns_namespace, "dns-system");
        assert_eq!(config.dns_label_selector, "app=coredns");
        assert_eq!(config.ingress_label_selector, "app=traefik");
        assert_eq!(config.restart_threshold, 20);
        assert_eq!(config.pod_restart_threshold, 3);
        assert_eq!(config.max_issue_details, 8);
        assert_eq!(config.max_pod_events, 25);
        assert_eq!(config.max_warning_events, 50);
    }

    #[test]
    fn test_config_loading_defaults() {
        let config = load_config_with_env(&MockEnvironment::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.dns_namespace, "kube-system");
        assert_eq!(config.dns_label_selector, "k8s-app=kube-dns");
        assert_eq!(config.restart_threshold, 10);
        assert_eq!(config.pod_restart_threshold, 5);
        assert_eq!(config.max_issue_details, 5);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let env = MockEnvironment::new()
            .with_var("DNS_NAMESPACE", "   ")
            .with_var("RESTART_THRESHOLD", "");

        let config = load_config_with_env(&env).unwrap();
        assert_eq!(config.dns_namespace, "kube-system");
        assert_eq!(config.restart_threshold, 10);
    }

    #[test]
    fn test_invalid_numbers_name_the_variable() {
        let env = MockEnvironment::new().with_var("RESTART_THRESHOLD", "lots");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("RESTART_THRESHOLD"));

        // usize rejects negatives
        let env = MockEnvironment::new().with_var("MAX_ISSUE_DETAILS", "-1");
        let result = load_config_with_env(&env);
        assert!(result.unwrap_err().to_string().contains("MAX_ISSUE_DETAILS"));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let env = MockEnvironment::new().with_var("DNS_LABEL_SELECTOR", "=kube-dns");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DNS_LABEL_SELECTOR"));
    }
}
