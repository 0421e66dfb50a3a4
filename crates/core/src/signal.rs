//! 인터럽트 처리: SIGINT/SIGTERM을 취소 토큰으로 전달
//!
//! [`Interrupt`]는 실행 전체에서 공유되는 취소 핸들입니다.
//! 시그널 리스너가 시그널을 받으면 토큰을 취소하고, 외부 명령 대기와
//! 권한 부여 스코프가 이를 감지하여 정리 작업을 수행한 뒤 반환합니다.
//! 프로세스를 즉시 종료하지 않으므로 정리 작업이 항상 먼저 실행됩니다.

use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::OpgateError;

/// 시그널 이름을 알 수 없을 때 사용하는 이름
const UNKNOWN_SIGNAL: &str = "cancellation";

/// 공유 인터럽트 핸들
///
/// 복제본은 모두 같은 토큰을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    token: CancellationToken,
    signal: Arc<OnceLock<&'static str>>,
}

impl Interrupt {
    /// 새 인터럽트 핸들을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 인터럽트를 발생시킵니다. 최초 시그널 이름만 기록됩니다.
    pub fn trigger(&self, signal: &'static str) {
        let _ = self.signal.set(signal);
        self.token.cancel();
    }

    /// 인터럽트가 발생했는지 여부
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 인터럽트가 발생할 때까지 대기하고 시그널 이름을 반환합니다.
    pub async fn triggered(&self) -> &'static str {
        self.token.cancelled().await;
        self.signal_name()
    }

    /// 기록된 시그널 이름
    pub fn signal_name(&self) -> &'static str {
        self.signal.get().copied().unwrap_or(UNKNOWN_SIGNAL)
    }

    /// 내부 취소 토큰
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// 인터럽트에 대응하는 에러를 만듭니다.
    pub fn error(&self) -> OpgateError {
        OpgateError::Interrupted {
            signal: self.signal_name().to_owned(),
        }
    }

    /// 종료 시그널을 기다리는 백그라운드 태스크를 시작합니다.
    ///
    /// 시그널을 받으면 프로세스를 끝내지 않고 인터럽트만 발생시킵니다.
    pub fn listen(&self) -> JoinHandle<()> {
        let interrupt = self.clone();
        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(signal) => {
                    warn!(signal, "interrupt received, finishing cleanup before exit");
                    interrupt.trigger(signal);
                }
                Err(e) => error!(error = %e, "failed to install signal handlers"),
            }
        })
    }
}

/// SIGTERM 또는 SIGINT를 기다립니다.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
