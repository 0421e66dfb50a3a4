//! 멱등 서비스 프로비저닝
//!
//! [`Provisioner::ensure`]는 다음 순서로 서비스를 준비합니다.
//!
//! 1. 필수 설정 확인: 런타임을 건드리기 전에 실패
//! 2. 레지스트리에 실행 중으로 기록되어 있으면 그대로 반환
//! 3. 런타임이 없으면 `MissingCapability`
//! 4. 같은 이미지 또는 이름의 컨테이너가 실행 중이면 채택
//! 5. 그 외에는 이미지 pull → 기동 → 안정화 대기 → 최초 준비 작업
//!
//! 최초 준비 작업(버킷 생성)은 이 실행에서 새로 기동한 경우에만 한 번 수행합니다.
//! 준비 작업이 실패하면 방금 기동한 컨테이너를 제거합니다. 버킷 없는
//! 컨테이너가 남으면 다음 `ensure`가 4단계에서 그것을 채택하게 됩니다.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ProvisionError;
use crate::registry::{ServiceHandle, ServiceRegistry, ServiceState};
use crate::runtime::ContainerRuntime;
use crate::spec::{JobSpec, ServiceSpec};

/// 기본 안정화 대기 시간
const DEFAULT_SETTLE: Duration = Duration::from_secs(5);

/// 서비스 프로비저너
pub struct Provisioner<R: ContainerRuntime> {
    runtime: Option<Arc<R>>,
    settle: Duration,
}

impl<R: ContainerRuntime> Provisioner<R> {
    /// 새 프로비저너를 생성합니다.
    ///
    /// `runtime`이 `None`이면 실제로 서비스가 필요해지는 시점에 실패합니다.
    pub fn new(runtime: Option<Arc<R>>) -> Self {
        Self {
            runtime,
            settle: DEFAULT_SETTLE,
        }
    }

    /// 기동 직후 안정화 대기 시간을 설정합니다.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// 런타임 사용 가능 여부
    pub fn has_runtime(&self) -> bool {
        self.runtime.is_some()
    }

    /// 서비스가 실행 중임을 보장하고 핸들을 반환합니다.
    ///
    /// # Errors
    ///
    /// - `MissingConfig`: 필수 설정이 비어 있음 (런타임 호출 없음)
    /// - `MissingCapability`: 런타임이 없음
    /// - `Runtime`: 조회/pull/기동 실패
    /// - `Setup`: 최초 준비 작업이 0이 아닌 코드로 종료
    pub async fn ensure(
        &self,
        spec: &ServiceSpec,
        registry: &mut ServiceRegistry,
    ) -> Result<ServiceHandle, ProvisionError> {
        spec.validate()?;

        if let Some(handle) = registry.running(spec.label()) {
            debug!(service = %spec.name, "service already provisioned in this run");
            return Ok(handle.clone());
        }

        let runtime = self.runtime.as_ref().ok_or_else(|| {
            ProvisionError::MissingCapability(format!(
                "service '{}' requires a container runtime",
                spec.name
            ))
        })?;

        let running = runtime.list_running().await?;
        if let Some(existing) = running.iter().find(|c| c.serves(spec)) {
            info!(
                service = %spec.name,
                container = %existing.name,
                "reusing running service"
            );
            let handle = ServiceHandle {
                label: spec.label().to_owned(),
                name: existing.name.clone(),
                endpoint: spec.endpoint(),
                container_id: existing.id.clone(),
                state: ServiceState::Running,
                started_here: false,
            };
            registry.record(handle.clone());
            return Ok(handle);
        }

        info!(service = %spec.name, image = %spec.image, "starting service");
        runtime.pull_image(&spec.image).await?;
        let container_id = runtime.start_service(spec).await?;

        if !self.settle.is_zero() {
            debug!(service = %spec.name, settle_ms = self.settle.as_millis() as u64, "waiting for service to settle");
            tokio::time::sleep(self.settle).await;
        }

        if let Some(job) = &spec.bootstrap {
            if let Err(e) = bootstrap(runtime.as_ref(), spec, job).await {
                warn!(service = %spec.name, job = %job.name, error = %e, "first-use setup failed, removing service");
                if let Err(remove_err) = runtime.remove_service(&spec.name).await {
                    warn!(service = %spec.name, error = %remove_err, "failed to remove service after setup failure");
                }
                return Err(e);
            }
            debug!(service = %spec.name, job = %job.name, "first-use setup complete");
        }

        let handle = ServiceHandle {
            label: spec.label().to_owned(),
            name: spec.name.clone(),
            endpoint: spec.endpoint(),
            container_id,
            state: ServiceState::Running,
            started_here: true,
        };
        registry.record(handle.clone());
        info!(service = %spec.name, endpoint = %handle.endpoint, "service ready");
        Ok(handle)
    }
}

async fn bootstrap<R: ContainerRuntime>(
    runtime: &R,
    spec: &ServiceSpec,
    job: &JobSpec,
) -> Result<(), ProvisionError> {
    runtime.pull_image(&job.image).await?;
    let code = runtime.run_job(job).await?;
    if code != 0 {
        return Err(ProvisionError::Setup {
            service: spec.name.clone(),
            reason: format!("{} exited with {code}", job.name),
        });
    }
    Ok(())
}
