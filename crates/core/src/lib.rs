#![doc = include_str!("../README.md")]

pub mod capability;
pub mod config;
pub mod error;
pub mod pass;
pub mod process;
pub mod signal;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, OpgateError};

// 설정
pub use config::{DEFAULT_PASSES, OpgateConfig};

// 패스
pub use pass::{
    BoxFuture, DynPass, Pass, PassRecord, PassRegistry, PassSelection, RunError, RunReport,
};

// 외부 명령 / 도구
pub use capability::{Capability, Requirement, probe_tool};
pub use process::{CommandOutput, CommandRunner, CommandSpec};

// 인터럽트
pub use signal::Interrupt;
