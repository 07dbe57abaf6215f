//! Cross-service consistency rules.
//!
//! Every rule runs against the full service list and reports all of its
//! violations; the checker concatenates them so callers see every problem
//! at once.

use super::secrets::{estimate_entropy_bits, MIN_ENTROPY_BITS};
use super::service::ServiceDefinition;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "violation", rename_all = "kebab-case")]
pub enum TopologyViolation {
    PortCollision { port: u16, services: Vec<String> },
    ReplicatedHostPort { service: String, port: u16, replicas: u32 },
    DuplicateService { name: String },
    UnknownDependency { service: String, dependency: String },
    UnpollableDependency { service: String, dependency: String },
    MissingCredential { service: String, variable: String },
    WeakSecret { service: String, variable: String, bits: u32 },
    SecretConflict { name: String, services: Vec<String> },
}

impl fmt::Display for TopologyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyViolation::PortCollision { port, services } => {
                let count = match services.len() {
                    2 => "two".to_string(),
                    3 => "three".to_string(),
                    n => n.to_string(),
                };
                write!(f, "port {} claimed by {} services ({})", port, count, services.join(", "))
            }
            TopologyViolation::ReplicatedHostPort { service, port, replicas } => write!(
                f,
                "service '{}' runs {} replicas but publishes fixed host port {}",
                service, replicas, port
            ),
            TopologyViolation::DuplicateService { name } => {
                write!(f, "service name '{}' is used more than once", name)
            }
            TopologyViolation::UnknownDependency { service, dependency } => {
                write!(f, "service '{}' depends on unknown service '{}'", service, dependency)
            }
            TopologyViolation::UnpollableDependency { service, dependency } => write!(
                f,
                "service '{}' depends on '{}', which has no health check",
                service, dependency
            ),
            TopologyViolation::MissingCredential { service, variable } => {
                write!(f, "service '{}' is missing credential {}", service, variable)
            }
            TopologyViolation::WeakSecret { service, variable, bits } => write!(
                f,
                "secret {} of service '{}' has ~{} bits of entropy, below {}",
                variable, service, bits, MIN_ENTROPY_BITS as u32
            ),
            TopologyViolation::SecretConflict { name, services } => write!(
                f,
                "secret {} has different values in services {}",
                name,
                services.join(", ")
            ),
        }
    }
}

/// Every consistency violation found in a candidate topology.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("inconsistent topology: {}", .violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct TopologyError {
    pub violations: Vec<TopologyViolation>,
}

pub trait ConsistencyRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, services: &[ServiceDefinition]) -> Vec<TopologyViolation>;
}

pub struct PortCollisionRule;

impl ConsistencyRule for PortCollisionRule {
    fn name(&self) -> &'static str {
        "PortCollision"
    }

    fn check(&self, services: &[ServiceDefinition]) -> Vec<TopologyViolation> {
        let mut claims: BTreeMap<u16, Vec<String>> = BTreeMap::new();
        for service in services {
            // a service binding one host port twice also collides
            for port in service.host_ports() {
                claims.entry(port).or_default().push(service.name.clone());
            }
        }

        let mut violations: Vec<TopologyViolation> = claims
            .into_iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(port, services)| TopologyViolation::PortCollision { port, services })
            .collect();

        // every replica would bind the same host port
        for service in services.iter().filter(|s| s.replicas() > 1) {
            for port in service.host_ports() {
                violations.push(TopologyViolation::ReplicatedHostPort {
                    service: service.name.clone(),
                    port,
                    replicas: service.replicas(),
                });
            }
        }
        violations
    }
}

pub struct UniqueServiceNameRule;

impl ConsistencyRule for UniqueServiceNameRule {
    fn name(&self) -> &'static str {
        "UniqueServiceName"
    }

    fn check(&self, services: &[ServiceDefinition]) -> Vec<TopologyViolation> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for service in services {
            *counts.entry(service.name.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| TopologyViolation::DuplicateService {
                name: name.to_string(),
            })
            .collect()
    }
}

/// Each dependency edge must point at a service with a pollable health check.
pub struct DependencyHealthRule;

impl ConsistencyRule for DependencyHealthRule {
    fn name(&self) -> &'static str {
        "DependencyHealth"
    }

    fn check(&self, services: &[ServiceDefinition]) -> Vec<TopologyViolation> {
        let by_name: HashMap<&str, &ServiceDefinition> =
            services.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut violations = Vec::new();
        for service in services {
            for dependency in &service.depends_on {
                match by_name.get(dependency.as_str()) {
                    None => violations.push(TopologyViolation::UnknownDependency {
                        service: service.name.clone(),
                        dependency: dependency.clone(),
                    }),
                    Some(target)
                        if !target
                            .health_check
                            .as_ref()
                            .is_some_and(|check| check.is_pollable()) =>
                    {
                        violations.push(TopologyViolation::UnpollableDependency {
                            service: service.name.clone(),
                            dependency: dependency.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        violations
    }
}

pub struct CredentialsRule;

impl ConsistencyRule for CredentialsRule {
    fn name(&self) -> &'static str {
        "Credentials"
    }

    fn check(&self, services: &[ServiceDefinition]) -> Vec<TopologyViolation> {
        services
            .iter()
            .flat_map(|service| {
                service
                    .secrets()
                    .filter(|(_, _, value)| value.expose().trim().is_empty())
                    .map(|(variable, _, _)| TopologyViolation::MissingCredential {
                        service: service.name.clone(),
                        variable: variable.to_string(),
                    })
            })
            .collect()
    }
}

/// Non-empty secrets must meet the minimum-entropy policy.
pub struct SecretEntropyRule;

impl ConsistencyRule for SecretEntropyRule {
    fn name(&self) -> &'static str {
        "SecretEntropy"
    }

    fn check(&self, services: &[ServiceDefinition]) -> Vec<TopologyViolation> {
        let mut violations = Vec::new();
        for service in services {
            for (variable, _, value) in service.secrets() {
                if value.expose().trim().is_empty() {
                    continue;
                }
                let bits = estimate_entropy_bits(value.expose());
                if bits < MIN_ENTROPY_BITS {
                    violations.push(TopologyViolation::WeakSecret {
                        service: service.name.clone(),
                        variable: variable.to_string(),
                        bits: bits as u32,
                    });
                }
            }
        }
        violations
    }
}

/// A secret name maps to one value across the whole topology, since the
/// env file holds a single entry per name.
pub struct SecretConflictRule;

impl ConsistencyRule for SecretConflictRule {
    fn name(&self) -> &'static str {
        "SecretConflict"
    }

    fn check(&self, services: &[ServiceDefinition]) -> Vec<TopologyViolation> {
        let mut values: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
        for service in services {
            for (_, name, value) in service.secrets() {
                values
                    .entry(name)
                    .or_default()
                    .push((service.name.as_str(), value.expose()));
            }
        }

        values
            .into_iter()
            .filter(|(_, uses)| uses.iter().any(|(_, v)| *v != uses[0].1))
            .map(|(name, uses)| {
                let mut services: Vec<String> = uses.iter().map(|(s, _)| s.to_string()).collect();
                services.dedup();
                TopologyViolation::SecretConflict {
                    name: name.to_string(),
                    services,
                }
            })
            .collect()
    }
}

pub struct ConsistencyChecker {
    rules: Vec<Box<dyn ConsistencyRule>>,
}

impl ConsistencyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn ConsistencyRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn check(&self, services: &[ServiceDefinition]) -> Result<(), TopologyError> {
        let violations: Vec<TopologyViolation> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(services))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(TopologyError { violations })
        }
    }
}

impl Default for ConsistencyChecker {
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(UniqueServiceNameRule),
                Box::new(PortCollisionRule),
                Box::new(DependencyHealthRule),
                Box::new(CredentialsRule),
                Box::new(SecretEntropyRule),
                Box::new(SecretConflictRule),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::service::{HealthCheck, PortBinding, ServiceRole};

    const STRONG: &str = "Zq8mK2vR9xL4pT7wN1cB6hJ3fD5gS0aY";

    fn service(name: &str, port: u16) -> ServiceDefinition {
        ServiceDefinition::new(name, ServiceRole::DataStore, "image:latest")
            .port(PortBinding::same(port))
            .health_check(HealthCheck::cmd(["true"]))
    }

    #[test]
    fn test_port_collision_names_both_services() {
        let services = vec![service("primary-postgresql", 5432), service("replica", 5432)];
        let err = ConsistencyChecker::new().check(&services).unwrap_err();

        assert_eq!(err.violations.len(), 1);
        assert_eq!(
            err.violations[0].to_string(),
            "port 5432 claimed by two services (primary-postgresql, replica)"
        );
    }

    #[test]
    fn test_shared_container_port_on_distinct_host_ports() {
        let services = vec![
            ServiceDefinition::new("gitea", ServiceRole::Ci, "gitea").port(PortBinding::mapped(3002, 3000)),
            ServiceDefinition::new("grafana", ServiceRole::Monitoring, "grafana")
                .port(PortBinding::mapped(3001, 3000)),
        ];
        assert!(PortCollisionRule.check(&services).is_empty());

        let clash = vec![
            ServiceDefinition::new("gitea", ServiceRole::Ci, "gitea").port(PortBinding::same(3000)),
            ServiceDefinition::new("app", ServiceRole::Application, "node").port(PortBinding::same(3000)),
        ];
        assert!(matches!(
            PortCollisionRule.check(&clash)[..],
            [TopologyViolation::PortCollision { port: 3000, .. }]
        ));
    }

    #[test]
    fn test_replicated_service_with_fixed_host_port() {
        let mut app = ServiceDefinition::new("app", ServiceRole::Application, "node").port(PortBinding::same(8080));
        app.resources = Some(crate::stack::Scale::Medium.resource_hints(3));

        let violations = PortCollisionRule.check(std::slice::from_ref(&app));
        assert_eq!(
            violations,
            vec![TopologyViolation::ReplicatedHostPort {
                service: "app".into(),
                port: 8080,
                replicas: 3
            }]
        );
        assert_eq!(
            violations[0].to_string(),
            "service 'app' runs 3 replicas but publishes fixed host port 8080"
        );

        app.ports = vec![PortBinding::internal(8080)];
        assert!(PortCollisionRule.check(&[app]).is_empty());
    }

    #[test]
    fn test_dependency_rules() {
        let services = vec![
            service("app", 8000).depends_on("db").depends_on("ghost"),
            ServiceDefinition::new("db", ServiceRole::DataStore, "postgres"),
        ];
        let violations = DependencyHealthRule.check(&services);
        assert_eq!(
            violations,
            vec![
                TopologyViolation::UnpollableDependency {
                    service: "app".into(),
                    dependency: "db".into()
                },
                TopologyViolation::UnknownDependency {
                    service: "app".into(),
                    dependency: "ghost".into()
                },
            ]
        );
    }

    #[test]
    fn test_credentials_and_entropy() {
        let services = vec![
            service("a", 1).secret("EMPTY_PASSWORD", ""),
            service("b", 2).secret("WEAK_PASSWORD", "password1"),
            service("c", 3).secret("GOOD_PASSWORD", STRONG),
        ];
        let err = ConsistencyChecker::new().check(&services).unwrap_err();

        assert_eq!(err.violations.len(), 2);
        assert!(matches!(&err.violations[0], TopologyViolation::MissingCredential { variable, .. } if variable == "EMPTY_PASSWORD"));
        assert!(matches!(&err.violations[1], TopologyViolation::WeakSecret { variable, .. } if variable == "WEAK_PASSWORD"));
    }

    #[test]
    fn test_secret_conflict() {
        let services = vec![
            service("a", 1).secret("SHARED", STRONG),
            service("b", 2).secret("SHARED", "Yq8mK2vR9xL4pT7wN1cB6hJ3fD5gS0aZ"),
        ];
        let violations = SecretConflictRule.check(&services);
        assert_eq!(
            violations,
            vec![TopologyViolation::SecretConflict {
                name: "SHARED".into(),
                services: vec!["a".into(), "b".into()]
            }]
        );
    }

    #[test]
    fn test_all_violations_are_collected() {
        let services = vec![
            service("x", 80).depends_on("missing"),
            service("x", 80).secret("TOKEN", ""),
        ];
        let err = ConsistencyChecker::new().check(&services).unwrap_err();
        // duplicate name, port collision, unknown dependency, missing credential
        assert_eq!(err.violations.len(), 4);
        assert!(err.to_string().starts_with("inconsistent topology: "));
    }

    #[test]
    fn test_default_rule_order() {
        assert_eq!(
            ConsistencyChecker::new().rule_names(),
            vec![
                "UniqueServiceName",
                "PortCollision",
                "DependencyHealth",
                "Credentials",
                "SecretEntropy",
                "SecretConflict"
            ]
        );
    }
}
