//! Container runtime abstraction for testability.
//!
//! The [`ContainerRuntime`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardRuntime`] while tests use `MockRuntime`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  Provisioner │
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ ContainerRuntime │ (trait)
//! └──────────────────┘
//!      │        │
//!      ▼        ▼
//!  ┌───────┐ ┌──────┐
//!  │Bollard│ │ Mock │
//!  └───┬───┘ └──────┘
//!      │
//!      ▼
//!  Docker Daemon
//! ```
//!
//! # Examples
//!
//! ```ignore
//! use opgate_provision::BollardRuntime;
//!
//! // Returns None (with a warning) when no daemon answers.
//! let runtime = BollardRuntime::detect().await;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::error::ProvisionError;
use crate::spec::{JobSpec, ServiceSpec, split_image};

/// Label attached to every container this crate creates.
pub const MANAGED_LABEL: &str = "opgate.managed";

/// A running container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    /// Container ID
    pub id: String,
    /// Container name without the leading `/`
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
}

impl RunningContainer {
    /// Whether this container serves the given spec (same image or same name).
    pub fn serves(&self, spec: &ServiceSpec) -> bool {
        self.image == spec.image || self.name == spec.name
    }
}

/// Trait abstracting container runtime operations.
///
/// All runtime calls go through this trait, enabling testability via mocking.
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async contexts.
///
/// # Implementations
///
/// - [`BollardRuntime`]: Production implementation using the `bollard` library
/// - `MockRuntime`: Test implementation with call counters (available in tests only)
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Checks daemon connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Lists running containers only.
    fn list_running(
        &self,
    ) -> impl Future<Output = Result<Vec<RunningContainer>, ProvisionError>> + Send;

    /// Pulls an image, driving the progress stream to completion.
    fn pull_image(&self, image: &str) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Starts a long-running service container and returns its ID.
    ///
    /// A stale (stopped) container with the same name is removed first.
    fn start_service(
        &self,
        spec: &ServiceSpec,
    ) -> impl Future<Output = Result<String, ProvisionError>> + Send;

    /// Runs a one-shot container to completion and returns its exit code.
    fn run_job(&self, job: &JobSpec) -> impl Future<Output = Result<i64, ProvisionError>> + Send;

    /// Force-removes a service container by name.
    fn remove_service(&self, name: &str) -> impl Future<Output = Result<(), ProvisionError>> + Send;
}

/// Production runtime implementation using `bollard`.
///
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async tasks.
pub struct BollardRuntime {
    docker: Arc<bollard::Docker>,
}

impl BollardRuntime {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::MissingCapability` if the connection cannot be set up.
    pub fn connect_local() -> Result<Self, ProvisionError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            ProvisionError::MissingCapability(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, ProvisionError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    ProvisionError::MissingCapability(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects and pings the local daemon.
    ///
    /// Returns `None` when the runtime is unreachable; whether that is fatal is
    /// decided later by the provisioner, only when a service is actually needed.
    pub async fn detect() -> Option<Arc<Self>> {
        let runtime = match Self::connect_local() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "container runtime not available");
                return None;
            }
        };
        match runtime.ping().await {
            Ok(()) => Some(Arc::new(runtime)),
            Err(e) => {
                warn!(error = %e, "container runtime did not answer ping");
                None
            }
        }
    }

    async fn remove_stale(&self, name: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(name, Some(options)).await {
            // 404 is the common case: nothing to remove
            debug!(container = name, error = %e, "no stale container removed");
        }
    }
}

fn env_pairs(env: &[(String, String)]) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

fn managed_labels() -> HashMap<String, String> {
    HashMap::from([(MANAGED_LABEL.to_owned(), "true".to_owned())])
}

impl ContainerRuntime for BollardRuntime {
    async fn ping(&self) -> Result<(), ProvisionError> {
        self.docker
            .ping()
            .await
            .map_err(|e| ProvisionError::MissingCapability(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn list_running(&self) -> Result<Vec<RunningContainer>, ProvisionError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ProvisionError::Runtime(format!("list containers failed: {e}")))?;

        Ok(containers
            .into_iter()
            .map(|container| RunningContainer {
                id: container.id.unwrap_or_default(),
                name: container
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_owned())
                    .unwrap_or_default(),
                image: container.image.unwrap_or_default(),
            })
            .collect())
    }

    async fn pull_image(&self, image: &str) -> Result<(), ProvisionError> {
        let (repo, tag) = split_image(image);
        let options = CreateImageOptions {
            from_image: repo.to_owned(),
            tag: tag.to_owned(),
            ..Default::default()
        };

        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| ProvisionError::Runtime(format!("pull {image} failed: {e}")))?;
        debug!(image, "image pulled");
        Ok(())
    }

    async fn start_service(&self, spec: &ServiceSpec) -> Result<String, ProvisionError> {
        self.remove_stale(&spec.name).await;

        let container_port = format!("{}/tcp", spec.container_port);
        let host_config = HostConfig {
            port_bindings: Some(HashMap::from([(
                container_port.clone(),
                Some(vec![PortBinding {
                    host_ip: Some("127.0.0.1".to_owned()),
                    host_port: Some(spec.host_port.to_string()),
                }]),
            )])),
            ..Default::default()
        };
        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(env_pairs(&spec.env)),
            cmd: Some(spec.command.clone()),
            exposed_ports: Some(HashMap::from([(container_port, HashMap::new())])),
            labels: Some(managed_labels()),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| ProvisionError::Runtime(format!("create {} failed: {e}", spec.name)))?;
        self.docker
            .start_container(&spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| ProvisionError::Runtime(format!("start {} failed: {e}", spec.name)))?;

        Ok(created.id)
    }

    async fn run_job(&self, job: &JobSpec) -> Result<i64, ProvisionError> {
        self.remove_stale(&job.name).await;

        let host_config = HostConfig {
            network_mode: job.host_network.then(|| "host".to_owned()),
            ..Default::default()
        };
        let config = Config {
            image: Some(job.image.clone()),
            env: Some(env_pairs(&job.env)),
            cmd: Some(job.command.clone()),
            labels: Some(managed_labels()),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: job.name.clone(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| ProvisionError::Runtime(format!("create {} failed: {e}", job.name)))?;
        self.docker
            .start_container(&job.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| ProvisionError::Runtime(format!("start {} failed: {e}", job.name)))?;

        let waited = self
            .docker
            .wait_container(&job.name, None::<WaitContainerOptions<String>>)
            .try_collect::<Vec<_>>()
            .await;
        let code = match waited {
            Ok(responses) => responses.last().map_or(0, |r| r.status_code),
            // bollard reports a non-zero exit as an error carrying the code
            Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => code,
            Err(e) => {
                self.remove_stale(&job.name).await;
                return Err(ProvisionError::Runtime(format!(
                    "wait for {} failed: {e}",
                    job.name
                )));
            }
        };

        self.remove_stale(&job.name).await;
        Ok(code)
    }

    async fn remove_service(&self, name: &str) -> Result<(), ProvisionError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(|e| ProvisionError::Runtime(format!("remove {name} failed: {e}")))
    }
}

/// 테스트용 Mock 런타임
///
/// 호출 횟수를 기록하여 멱등성과 최초 준비 단계의 실행 횟수를 검증합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockRuntime {
    /// list_running 호출 시 반환할 컨테이너 목록
    pub running: std::sync::Mutex<Vec<RunningContainer>>,
    /// pull 실패를 시뮬레이션할지 여부
    pub fail_pull: bool,
    /// run_job이 반환할 종료 코드
    pub job_exit_code: i64,
    /// 호출 카운터
    pub calls: MockCalls,
}

#[cfg(test)]
#[derive(Default)]
pub struct MockCalls {
    pub list: std::sync::atomic::AtomicUsize,
    pub pull: std::sync::atomic::AtomicUsize,
    pub start: std::sync::atomic::AtomicUsize,
    pub job: std::sync::atomic::AtomicUsize,
    pub remove: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCalls {
    pub fn get(counter: &std::sync::atomic::AtomicUsize) -> usize {
        counter.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        Self::get(&self.list)
            + Self::get(&self.pull)
            + Self::get(&self.start)
            + Self::get(&self.job)
            + Self::get(&self.remove)
    }
}

#[cfg(test)]
impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이미 실행 중인 컨테이너를 추가합니다.
    pub fn with_running(self, container: RunningContainer) -> Self {
        if let Ok(mut running) = self.running.lock() {
            running.push(container);
        }
        self
    }

    pub fn with_failing_pull(mut self) -> Self {
        self.fail_pull = true;
        self
    }

    pub fn with_job_exit_code(mut self, code: i64) -> Self {
        self.job_exit_code = code;
        self
    }
}

#[cfg(test)]
impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<(), ProvisionError> {
        Ok(())
    }

    async fn list_running(&self) -> Result<Vec<RunningContainer>, ProvisionError> {
        self.calls
            .list
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.running.lock().map(|r| r.clone()).unwrap_or_default())
    }

    async fn pull_image(&self, image: &str) -> Result<(), ProvisionError> {
        self.calls
            .pull
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_pull {
            return Err(ProvisionError::Runtime(format!("pull {image} failed: mock")));
        }
        Ok(())
    }

    async fn start_service(&self, spec: &ServiceSpec) -> Result<String, ProvisionError> {
        let n = self
            .calls
            .start
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let id = format!("mock{n:04}");
        if let Ok(mut running) = self.running.lock() {
            running.push(RunningContainer {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
            });
        }
        Ok(id)
    }

    async fn run_job(&self, _job: &JobSpec) -> Result<i64, ProvisionError> {
        self.calls
            .job
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.job_exit_code)
    }

    async fn remove_service(&self, name: &str) -> Result<(), ProvisionError> {
        self.calls
            .remove
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Ok(mut running) = self.running.lock() {
            running.retain(|c| c.name != name);
        }
        Ok(())
    }
}
