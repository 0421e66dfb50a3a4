//! 권한 범위 실행
//!
//! [`AuthorizationScope::run`]은 권한을 획득하고, 본문을 인터럽트와 경쟁시켜
//! 실행한 뒤, 어떤 경로로 끝나든 권한을 해제합니다.
//!
//! ```text
//! probe ──absent──▶ body (interrupt race) ──▶ outcome
//!   │
//! present
//!   ▼
//! create role ──▶ [guard armed] ──▶ create binding ──fail──▶ release ──▶ Setup
//!                                        │
//!                                        ▼
//!                     body (interrupt race, catch_unwind)
//!                                        │
//!                                        ▼
//!                                     release ──▶ outcome / Teardown / resume panic
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{error, info, warn};

use opgate_core::signal::Interrupt;

use crate::api::{Applied, AuthorizationApi};
use crate::error::AuthzError;
use crate::grant::{GrantGuard, GrantSpec};

/// 범위 실행 결과
#[derive(Debug, PartialEq, Eq)]
pub enum ScopeOutcome<T> {
    /// 본문이 끝까지 실행됨
    Completed(T),
    /// 인터럽트로 본문이 중단됨 (시그널 이름)
    Interrupted(&'static str),
}

impl<T> ScopeOutcome<T> {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

/// 임시 권한 범위
pub struct AuthorizationScope<'a, A: AuthorizationApi> {
    api: &'a A,
    grant: GrantSpec,
}

impl<'a, A: AuthorizationApi> AuthorizationScope<'a, A> {
    pub fn new(api: &'a A, grant: GrantSpec) -> Self {
        Self { api, grant }
    }

    /// 권한 범위 안에서 본문을 실행합니다.
    ///
    /// # Errors
    ///
    /// - `Probe`: RBAC 조회 실패 (본문 미실행)
    /// - `Setup`: 역할/바인딩 생성 실패 (본문 미실행, 생성된 역할은 롤백)
    /// - `Teardown`: 본문은 완료됐지만 해제 실패
    ///
    /// # Panics
    ///
    /// 본문의 패닉은 권한 해제 후 그대로 다시 발생합니다.
    pub async fn run<F, T>(self, interrupt: &Interrupt, body: F) -> Result<ScopeOutcome<T>, AuthzError>
    where
        F: Future<Output = T> + Send,
    {
        if !self.api.authorization_enabled().await? {
            info!("cluster has no RBAC api group, running without grant");
            return Ok(race(interrupt, body).await);
        }

        let guard = self.acquire().await?;

        let result = AssertUnwindSafe(race(interrupt, body)).catch_unwind().await;
        let teardown = guard.release().await;

        match result {
            Err(panic) => {
                error!("scope body panicked, grant released");
                std::panic::resume_unwind(panic)
            }
            Ok(ScopeOutcome::Interrupted(signal)) => {
                if teardown.is_err() {
                    warn!(signal, "grant release failed after interrupt");
                }
                Ok(ScopeOutcome::Interrupted(signal))
            }
            Ok(ScopeOutcome::Completed(value)) => {
                teardown?;
                Ok(ScopeOutcome::Completed(value))
            }
        }
    }

    async fn acquire(&self) -> Result<GrantGuard<'a, A>, AuthzError> {
        let grant = &self.grant;

        let role = self.api.create_role(grant).await.map_err(|e| {
            AuthzError::Setup(format!("cluster role {}: {e}", grant.role_name))
        })?;
        let mut guard = GrantGuard::armed(self.api, grant.role_name.clone());
        log_applied("ClusterRole", &grant.role_name, role);

        match self.api.create_binding(grant).await {
            Ok(applied) => {
                guard.track_binding(grant.binding_name.clone());
                log_applied("ClusterRoleBinding", &grant.binding_name, applied);
                Ok(guard)
            }
            Err(e) => {
                error!(binding = %grant.binding_name, error = %e, "binding creation failed, rolling back role");
                // rollback failures are already logged by the guard
                let _ = guard.release().await;
                Err(AuthzError::Setup(format!(
                    "cluster role binding {}: {e}",
                    grant.binding_name
                )))
            }
        }
    }
}

fn log_applied(kind: &str, name: &str, applied: Applied) {
    match applied {
        Applied::Created => info!(kind, name, "created"),
        Applied::Adopted => warn!(kind, name, "adopted leftover object from an earlier run"),
    }
}

async fn race<F: Future>(interrupt: &Interrupt, body: F) -> ScopeOutcome<F::Output> {
    tokio::select! {
        biased;
        signal = interrupt.triggered() => {
            warn!(signal, "interrupted, stopping scope body");
            ScopeOutcome::Interrupted(signal)
        }
        value = body => ScopeOutcome::Completed(value),
    }
}

/// [`AuthorizationScope`]의 축약형
pub async fn with_authorization<A, F, T>(
    api: &A,
    grant: GrantSpec,
    interrupt: &Interrupt,
    body: F,
) -> Result<ScopeOutcome<T>, AuthzError>
where
    A: AuthorizationApi,
    F: Future<Output = T> + Send,
{
    AuthorizationScope::new(api, grant).run(interrupt, body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn race_prefers_already_triggered_interrupt() {
        let interrupt = Interrupt::new();
        interrupt.trigger("SIGTERM");
        let outcome = race(&interrupt, async { 1 }).await;
        assert_eq!(outcome, ScopeOutcome::Interrupted("SIGTERM"));
    }

    #[tokio::test]
    async fn race_completes_without_interrupt() {
        let interrupt = Interrupt::new();
        let outcome = race(&interrupt, async { 7 }).await;
        assert_eq!(outcome, ScopeOutcome::Completed(7));
        assert!(!outcome.is_interrupted());
    }
}
