#![doc = include_str!("../README.md")]

pub mod error;
pub mod provisioner;
pub mod registry;
pub mod runtime;
pub mod spec;

pub use error::ProvisionError;
pub use provisioner::Provisioner;
pub use registry::{ServiceHandle, ServiceRegistry, ServiceState};
pub use runtime::{BollardRuntime, ContainerRuntime, MANAGED_LABEL, RunningContainer};
pub use spec::{JobSpec, ServiceSpec};
