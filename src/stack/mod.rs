//! Polymorphic stack assembly.
//!
//! One [`DataStoreAdapter`] per supported data-store kind, held in an
//! [`AdapterRegistry`]. The [`StackAssembler`] resolves an adapter from a
//! technology profile or an explicit kind, merges in the cross-cutting
//! services the options enable, and returns a consistency-checked
//! [`Topology`].
//!
//! # Example
//!
//! ```no_run
//! use stacksmith::stack::{AdapterRegistry, AssemblyOptions, DataStoreKind, StackAssembler};
//! use std::sync::Arc;
//!
//! let assembler = StackAssembler::new(Arc::new(AdapterRegistry::with_defaults()));
//! let options = AssemblyOptions::default().with_kind(DataStoreKind::MongoDb);
//! let topology = assembler.assemble(None, &options).unwrap();
//! assert_eq!(topology.services[0].name, "primary-mongodb");
//! ```

#[macro_use]
pub mod ids;

pub mod adapter;
pub mod adapters;
pub mod assembler;
pub mod consistency;
pub mod options;
pub mod registry;
pub mod secrets;
pub mod service;
pub mod services;

pub use adapter::{
    AuthScheme, ConfigViolation, ConnectionDescriptor, DataStoreAdapter, DataStoreConfig,
    ValidationError, VectorCapability, VectorIndexSpec,
};
pub use assembler::{AssemblyError, KindSource, StackAssembler, Topology, NETWORK_NAME};
pub use consistency::{ConsistencyChecker, ConsistencyRule, TopologyError, TopologyViolation};
pub use ids::DataStoreKind;
pub use options::{AssemblyOptions, Feature, FeatureSet, Scale, Tier};
pub use registry::{AdapterRegistry, RegistryError};
pub use secrets::SecretGenerator;
pub use service::{
    EnvValue, HealthCheck, PortBinding, ResourceHints, SecretString, ServiceDefinition,
    ServiceRole, VolumeMount, VolumeSource,
};
