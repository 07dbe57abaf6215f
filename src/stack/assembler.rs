//! Stack assembly: profile or override in, consistency-checked topology out.

use super::adapter::{ConnectionDescriptor, DataStoreAdapter, ValidationError, VectorCapability};
use super::consistency::{ConsistencyChecker, TopologyError};
use super::options::{AssemblyOptions, Feature, FeatureSet, Scale, Tier};
use super::registry::{AdapterRegistry, RegistryError};
use super::secrets::SecretGenerator;
use super::service::{EnvValue, SecretString, ServiceDefinition, VolumeSource};
use super::services::{self, AppRuntime, AppWiring};
use super::DataStoreKind;
use crate::classify::{Category, DataStoreSelection, TechnologyProfile};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const NETWORK_NAME: &str = "app-network";

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("data-store candidates are tied ({}); pass an explicit kind", .candidates.join(", "))]
    AmbiguousDataStore { candidates: Vec<String> },
}

impl AssemblyError {
    pub fn is_kind_not_found(&self) -> bool {
        matches!(self, AssemblyError::Registry(RegistryError::KindNotFound { .. }))
    }
}

/// How the primary data-store kind was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KindSource {
    Override,
    Profile,
    Default,
}

/// A consistency-checked set of services.
#[derive(Debug, Clone)]
pub struct Topology {
    pub project_name: String,
    pub kind: DataStoreKind,
    pub kind_source: KindSource,
    pub vector: VectorCapability,
    /// In-network connection to the primary data store.
    pub connection: ConnectionDescriptor,
    pub features: FeatureSet,
    pub tier: Tier,
    pub scale: Scale,
    pub network: String,
    pub services: Vec<ServiceDefinition>,
}

impl Topology {
    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn primary(&self) -> Option<&ServiceDefinition> {
        self.service(&super::adapter::primary_service_name(&self.kind))
    }

    /// `(dependent, dependency)` pairs in service order.
    pub fn dependency_edges(&self) -> Vec<(&str, &str)> {
        self.services
            .iter()
            .flat_map(|s| s.depends_on.iter().map(move |d| (s.name.as_str(), d.as_str())))
            .collect()
    }

    /// Each secret name with its value. Names are unique after consistency checks.
    pub fn secrets(&self) -> BTreeMap<&str, &SecretString> {
        self.services
            .iter()
            .flat_map(|s| s.secrets().map(|(_, name, value)| (name, value)))
            .collect()
    }

    pub fn named_volumes(&self) -> BTreeSet<&str> {
        self.services
            .iter()
            .flat_map(|s| s.volumes.iter())
            .filter_map(|v| match &v.source {
                VolumeSource::Named(name) => Some(name.as_str()),
                VolumeSource::Bind(_) => None,
            })
            .collect()
    }
}

pub struct StackAssembler {
    registry: Arc<AdapterRegistry>,
    checker: ConsistencyChecker,
    secrets: SecretGenerator,
    default_kind: DataStoreKind,
    threshold: f64,
}

impl StackAssembler {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            checker: ConsistencyChecker::default(),
            secrets: SecretGenerator::default(),
            default_kind: DataStoreKind::PostgreSql,
            threshold: 0.5,
        }
    }

    pub fn with_default_kind(mut self, kind: DataStoreKind) -> Self {
        self.default_kind = kind;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_checker(mut self, checker: ConsistencyChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Picks the primary data-store adapter.
    ///
    /// An explicit override must be registered. A profile selection that
    /// names an unsupported store falls back to the default kind.
    pub fn resolve(
        &self,
        profile: Option<&TechnologyProfile>,
        options: &AssemblyOptions,
    ) -> Result<(Arc<dyn DataStoreAdapter>, KindSource), AssemblyError> {
        if let Some(kind) = &options.kind_override {
            return Ok((self.registry.get(kind)?, KindSource::Override));
        }

        let selection = profile
            .map(|p| p.data_store_selection(self.threshold))
            .unwrap_or(DataStoreSelection::None);

        match selection {
            DataStoreSelection::Ambiguous(candidates) => Err(AssemblyError::AmbiguousDataStore { candidates }),
            DataStoreSelection::Unique(name) => match self.registry.lookup(&name) {
                Ok(adapter) => Ok((adapter, KindSource::Profile)),
                Err(e) => {
                    warn!(detected = %name, error = %e, default = %self.default_kind, "Detected data store has no adapter, using default");
                    Ok((self.registry.get(&self.default_kind)?, KindSource::Default))
                }
            },
            DataStoreSelection::None => Ok((self.registry.get(&self.default_kind)?, KindSource::Default)),
        }
    }

    pub fn assemble(
        &self,
        profile: Option<&TechnologyProfile>,
        options: &AssemblyOptions,
    ) -> Result<Topology, AssemblyError> {
        let (adapter, kind_source) = self.resolve(profile, options)?;
        let kind = adapter.kind();
        debug!(kind = %kind, source = ?kind_source, "Resolved data-store adapter");

        let mut config = options.data_store.clone();
        if config.password.is_none() {
            config.password = Some(self.secrets.generate());
        }
        adapter.validate(&config)?;

        let primary = adapter.service_definition(&config)?;
        let mut in_network = config.clone().with_host(primary.name.clone());
        in_network.port = 0;
        let connection = adapter.connection_descriptor(&in_network)?;
        let password = config.password_or_empty();

        let mut members = vec![primary];
        let mut app_dependencies = vec![members[0].name.clone()];

        let redis_url = if kind == DataStoreKind::Redis {
            Some(EnvValue::secret("REDIS_URL", connection.url.clone()))
        } else if options.features.contains(Feature::Cache) {
            members.push(services::cache_service());
            app_dependencies.push(services::CACHE_SERVICE.to_string());
            Some(EnvValue::literal("redis://cache:6379/0"))
        } else {
            None
        };

        let search_url = if options.features.contains(Feature::Search) {
            members.push(services::search_service(self.secrets.generate(), options.tier));
            app_dependencies.push(services::SEARCH_SERVICE.to_string());
            Some("http://search:7700".to_string())
        } else {
            None
        };

        if options.features.contains(Feature::Monitoring) {
            members.extend(services::monitoring_services(self.secrets.generate()));
        }
        if options.features.contains(Feature::Ci) {
            let ci = services::ci_service(&members[0], &kind, password.clone());
            members.push(ci);
        }

        let language = profile
            .and_then(|p| p.top(Category::Language))
            .map(|e| e.name.as_str());
        let app = services::application_service(
            AppRuntime::for_language(language, &options.project_name),
            options.tier,
            AppWiring {
                database_url: connection.url.clone(),
                redis_url,
                search_url,
            },
            &app_dependencies,
        );
        members.push(app);

        for service in &mut members {
            service.restart = options.tier.restart_policy().to_string();
            let replicas = if service.name == services::APP_SERVICE {
                options.tier.replicas()
            } else {
                1
            };
            service.resources = Some(options.scale.resource_hints(replicas));
            if replicas > 1 {
                // replicas cannot share a fixed host port
                for port in &mut service.ports {
                    port.host = None;
                }
            }
        }

        self.checker.check(&members)?;

        info!(
            kind = %kind,
            source = ?kind_source,
            services = members.len(),
            features = %options.features,
            tier = %options.tier,
            scale = %options.scale,
            "Assembled topology"
        );

        Ok(Topology {
            project_name: options.project_name.clone(),
            vector: adapter.vector_capability(),
            kind,
            kind_source,
            connection,
            features: options.features.clone(),
            tier: options.tier,
            scale: options.scale,
            network: NETWORK_NAME.to_string(),
            services: members,
        })
    }
}
