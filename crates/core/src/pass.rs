//! 패스 시스템: 패스 등록, 선택 해석, 순차 실행
//!
//! [`Pass`] trait은 이름이 붙은 하나의 검증 단계를 표현합니다.
//! [`PassRegistry`]는 패스를 등록 순서대로 보관하고, [`PassSelection`]을
//! 해석하여 선택된 순서대로 실행합니다.
//!
//! # 실행 규칙
//! ```text
//! resolve(selection) ── 알 수 없는 이름 → 실행 전 실패
//!        │
//!        ▼
//! preflight(모든 패스) ── 필수 설정 누락 → 실행 전 실패
//!        │
//!        ▼
//! pass[0] → pass[1] → ... → pass[n]
//!        │ 첫 실패 시 즉시 중단 (이후 패스는 실행하지 않음)
//! ```
//!
//! 패스 사이에는 격리가 없습니다. 앞선 패스가 남긴 상태(기동된 서비스,
//! 빌드된 바이너리)를 뒤 패스가 사용하므로 선택 순서 자체가 계약입니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::DEFAULT_PASSES;
use crate::error::{ConfigError, OpgateError};
use crate::signal::Interrupt;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── Pass Trait ──────────────────────────────────────────────────────

/// 모든 패스가 구현하는 trait
///
/// `C`는 실행 전체에서 공유되는 컨텍스트입니다. 패스는 컨텍스트를
/// 가변으로 빌려 서비스 레지스트리 등의 상태를 갱신할 수 있습니다.
///
/// # 구현 예시
/// ```ignore
/// struct BuildPass;
///
/// impl Pass<RunContext> for BuildPass {
///     fn name(&self) -> &str { "build" }
///
///     async fn run(&self, ctx: &mut RunContext) -> Result<(), OpgateError> {
///         ctx.config.require_operator_image()?;
///         Ok(())
///     }
/// }
/// ```
pub trait Pass<C>: Send + Sync {
    /// 고유한 패스 이름 (예: `"e2e-fast"`)
    fn name(&self) -> &str;

    /// 한 줄 설명
    fn description(&self) -> &str {
        ""
    }

    /// 실행 전 점검: 필수 설정 등 작업 없이 확인할 수 있는 조건
    ///
    /// 선택된 모든 패스의 preflight가 첫 패스 실행 전에 호출됩니다.
    fn preflight(&self, _ctx: &C) -> Result<(), OpgateError> {
        Ok(())
    }

    /// 패스를 실행합니다.
    fn run(&self, ctx: &mut C) -> impl Future<Output = Result<(), OpgateError>> + Send;
}

// ─── DynPass Trait ───────────────────────────────────────────────────

/// dyn-compatible 패스 trait
///
/// `Pass` trait은 RPITIT를 사용하므로 `dyn Pass`가 불가합니다.
/// `DynPass`는 `BoxFuture`를 반환하여 `Vec<Box<dyn DynPass<C>>>`로
/// 패스를 관리할 수 있게 합니다.
pub trait DynPass<C>: Send + Sync {
    /// 고유한 패스 이름
    fn name(&self) -> &str;

    /// 한 줄 설명
    fn description(&self) -> &str;

    /// 실행 전 점검
    fn preflight(&self, ctx: &C) -> Result<(), OpgateError>;

    /// 패스를 실행합니다.
    fn run<'a>(&'a self, ctx: &'a mut C) -> BoxFuture<'a, Result<(), OpgateError>>;
}

/// Pass를 구현한 타입은 자동으로 DynPass도 구현됩니다.
impl<C: Send, T: Pass<C>> DynPass<C> for T {
    fn name(&self) -> &str {
        Pass::name(self)
    }

    fn description(&self) -> &str {
        Pass::description(self)
    }

    fn preflight(&self, ctx: &C) -> Result<(), OpgateError> {
        Pass::preflight(self, ctx)
    }

    fn run<'a>(&'a self, ctx: &'a mut C) -> BoxFuture<'a, Result<(), OpgateError>> {
        Box::pin(Pass::run(self, ctx))
    }
}

// ─── PassSelection ───────────────────────────────────────────────────

/// 실행할 패스 이름의 순서 있는 목록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSelection {
    names: Vec<String>,
}

impl PassSelection {
    /// 이름 목록으로 선택을 생성합니다. 공백은 제거되고 빈 항목은 무시됩니다.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_owned())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// 선택된 이름 목록
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 선택이 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for PassSelection {
    fn default() -> Self {
        Self::new(DEFAULT_PASSES)
    }
}

impl FromStr for PassSelection {
    type Err = ConfigError;

    /// 쉼표 또는 공백으로 구분된 목록을 파싱합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selection = Self::new(s.split([',', ' ']));
        if selection.is_empty() {
            return Err(ConfigError::EmptySelection);
        }
        Ok(selection)
    }
}

impl fmt::Display for PassSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(","))
    }
}

// ─── RunReport / RunError ────────────────────────────────────────────

/// 완료된 패스 하나의 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassRecord {
    /// 패스 이름
    pub name: String,
    /// 소요 시간 (밀리초)
    pub duration_ms: u64,
}

/// 실행 결과 요약
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// 선택 순서대로 완료된 패스
    pub passes: Vec<PassRecord>,
    /// 전체 소요 시간 (밀리초)
    pub total_ms: u64,
}

/// 실행 실패
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// 선택 목록이 유효하지 않음 (어떤 패스도 실행되지 않음)
    #[error("invalid pass selection: {0}")]
    Selection(#[from] ConfigError),

    /// 패스 실행 중 실패 (이후 패스는 실행되지 않음)
    #[error("pass '{pass}' failed: {source}")]
    PassFailed {
        /// 실패한 패스 이름
        pass: String,
        /// 원인
        #[source]
        source: OpgateError,
    },
}

// ─── PassRegistry ────────────────────────────────────────────────────

/// 패스 레지스트리
///
/// 프로세스 시작 시 정적으로 등록되며 실행 중에는 변경되지 않습니다.
///
/// # 사용 예시
/// ```ignore
/// let mut registry = PassRegistry::new();
/// registry.register(Box::new(VerifyPass::new()))?;
/// registry.register(Box::new(UnitPass::new()))?;
///
/// let report = registry.run(&selection, &mut ctx, &interrupt).await?;
/// ```
pub struct PassRegistry<C> {
    passes: Vec<Box<dyn DynPass<C>>>,
}

impl<C> PassRegistry<C> {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// 패스를 등록합니다.
    ///
    /// 동일한 이름의 패스가 이미 등록되어 있으면 에러를 반환합니다.
    pub fn register(&mut self, pass: Box<dyn DynPass<C>>) -> Result<(), ConfigError> {
        let name = pass.name().to_owned();
        if self.passes.iter().any(|p| p.name() == name) {
            return Err(ConfigError::DuplicatePass { name });
        }
        self.passes.push(pass);
        Ok(())
    }

    /// 이름으로 패스를 조회합니다.
    pub fn get(&self, name: &str) -> Option<&dyn DynPass<C>> {
        self.passes
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// 등록 순서대로 패스 이름을 반환합니다.
    pub fn names(&self) -> Vec<String> {
        self.passes.iter().map(|p| p.name().to_owned()).collect()
    }

    /// 등록된 (이름, 설명) 목록을 반환합니다.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.passes
            .iter()
            .map(|p| (p.name().to_owned(), p.description().to_owned()))
            .collect()
    }

    /// 등록된 패스 수
    pub fn count(&self) -> usize {
        self.passes.len()
    }

    /// 선택 목록의 모든 이름을 해석합니다.
    ///
    /// 하나라도 해석되지 않으면 아무 것도 실행하지 않고 에러를 반환합니다.
    /// 같은 패스를 두 번 선택하는 것도 거부합니다 (패스는 실행당 최대 한 번).
    pub fn resolve(&self, selection: &PassSelection) -> Result<Vec<&dyn DynPass<C>>, ConfigError> {
        if selection.is_empty() {
            return Err(ConfigError::EmptySelection);
        }

        let mut resolved: Vec<&dyn DynPass<C>> = Vec::with_capacity(selection.names().len());
        for name in selection.names() {
            let pass = self.get(name).ok_or_else(|| ConfigError::UnknownPass {
                name: name.clone(),
                known: self.names(),
            })?;
            if resolved.iter().any(|p| p.name() == name) {
                return Err(ConfigError::InvalidValue {
                    field: "passes".to_owned(),
                    reason: format!("pass '{name}' is selected more than once"),
                });
            }
            resolved.push(pass);
        }
        Ok(resolved)
    }
}

impl<C: Send> PassRegistry<C> {
    /// 선택된 패스를 순서대로 실행합니다.
    ///
    /// 첫 패스 실행 전에 선택된 모든 패스의 preflight를 확인합니다.
    /// 첫 번째 실패 시 즉시 반환합니다 (fail-fast).
    /// 각 패스 시작 전에 인터럽트 여부를 확인합니다.
    pub async fn run(
        &self,
        selection: &PassSelection,
        ctx: &mut C,
        interrupt: &Interrupt,
    ) -> Result<RunReport, RunError> {
        let passes = self.resolve(selection)?;
        info!(selection = %selection, "starting run");

        for pass in &passes {
            if let Err(e) = pass.preflight(ctx) {
                error!(pass = %pass.name(), error = %e, "preflight failed, nothing was run");
                return Err(RunError::PassFailed {
                    pass: pass.name().to_owned(),
                    source: e,
                });
            }
        }

        let started = Instant::now();
        let mut report = RunReport::default();

        for pass in passes {
            let name = pass.name().to_owned();
            if interrupt.is_triggered() {
                error!(pass = %name, "run interrupted before pass started");
                return Err(RunError::PassFailed {
                    pass: name,
                    source: interrupt.error(),
                });
            }

            info!(pass = %name, "pass started");
            let pass_started = Instant::now();
            if let Err(e) = pass.run(ctx).await {
                error!(pass = %name, error = %e, "pass failed, aborting run");
                return Err(RunError::PassFailed {
                    pass: name,
                    source: e,
                });
            }

            let duration_ms = elapsed_ms(pass_started);
            info!(pass = %name, duration_ms, "pass succeeded");
            report.passes.push(PassRecord { name, duration_ms });
        }

        report.total_ms = elapsed_ms(started);
        info!(
            passes = report.passes.len(),
            total_ms = report.total_ms,
            "run completed"
        );
        Ok(report)
    }
}

impl<C> Default for PassRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
