use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

/// 선택 분석 도구 (바이너리 이름, 패키지 경로)
const ANALYZERS: [(&str, &str); 2] = [
    ("gosimple", "honnef.co/go/tools/cmd/gosimple"),
    ("unused", "honnef.co/go/tools/cmd/unused"),
];

/// 두 도구가 독립 명령으로 제공된 마지막 릴리스
const DEFAULT_TOOLS_VERSION: &str = "2019.2.3";

/// opgate 개발 태스크
#[derive(Parser)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// format-verify 패스의 선택 분석 도구 설치 (go install)
    InstallTools {
        /// honnef.co/go/tools 버전
        #[arg(long, default_value = DEFAULT_TOOLS_VERSION)]
        version: String,
        /// 실행하지 않고 명령만 출력
        #[arg(long)]
        dry_run: bool,
    },
    /// 선택 분석 도구 설치 여부 확인
    CheckTools,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InstallTools { version, dry_run } => install_tools(&version, dry_run),
        Commands::CheckTools => check_tools(),
    }
}

fn install_tools(version: &str, dry_run: bool) -> Result<()> {
    for (name, package) in ANALYZERS {
        let target = format!("{package}@{version}");
        if dry_run {
            println!("go install {target}");
            continue;
        }

        let status = Command::new("go")
            .args(["install", &target])
            .env("GO111MODULE", "on")
            .status()
            .context("failed to run `go install` (is Go installed?)")?;
        if !status.success() {
            bail!("installing {name} failed with {status}");
        }
        println!("installed {name} ({version})");
    }
    Ok(())
}

fn check_tools() -> Result<()> {
    let mut missing = Vec::new();
    for (name, _) in ANALYZERS {
        let found = Command::new(name)
            .arg("-version")
            .output()
            .is_ok();
        if found {
            println!("{name}: installed");
        } else {
            println!("{name}: missing (format-verify will skip it)");
            missing.push(name);
        }
    }
    if !missing.is_empty() {
        println!("run `cargo run -p xtask -- install-tools` to install {}", missing.join(", "));
    }
    Ok(())
}
