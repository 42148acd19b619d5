//! cinstaller 命令行入口

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use cinstaller_lib::{
    default_hosts, logger, ConfigStore, EmbeddedPayload, EnvironmentPublisher, FilePayload,
    HostEnvironment, InstallOrchestrator, InstallReport, InstallerConfig, MemoryStore,
    OutcomeStatus, PayloadStore,
};

/// 部分目标失败时的退出码
const EXIT_PARTIAL: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "cinstaller", version, about = "Revit / AutoCAD / Rhino / SketchUp 插件安装器")]
struct Cli {
    /// 配置文件 (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 在控制台输出日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 解压安装包并安装到所有宿主（默认）
    Install(InstallArgs),
    /// 列出每个宿主将要安装到的目标
    Discover {
        /// 使用内存存储和沙箱目录
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Default, Args)]
struct InstallArgs {
    /// 安装目录，默认 <本地应用数据>/<app_name>
    #[arg(long)]
    root: Option<PathBuf>,

    /// 使用指定的 ZIP 包代替内置安装包
    #[arg(long)]
    payload: Option<PathBuf>,

    /// 使用内存存储，所有系统目录放在 <安装目录>/.dry-run 下
    #[arg(long)]
    dry_run: bool,

    /// 安装完成后启动主程序
    #[arg(long)]
    launch: bool,

    /// 不显示进度条
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[-] {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => InstallerConfig::load(path)
            .with_context(|| format!("无法加载配置 {}", path.display()))?,
        None => InstallerConfig::default(),
    };
    let log_path = logger::init(&config.logging, cli.verbose).context("日志初始化失败")?;
    if let Some(path) = &log_path {
        info!("日志文件: {}", path.display());
    }

    match cli.command {
        Some(Command::Discover { dry_run }) => discover(&config, dry_run),
        Some(Command::Install(args)) => install(&config, args, log_path.as_deref()).await,
        None => install(&config, InstallArgs::default(), log_path.as_deref()).await,
    }
}

/// 按运行模式准备系统目录和配置存储
fn prepare(
    config: &InstallerConfig,
    root: Option<PathBuf>,
    dry_run: bool,
) -> Result<(PathBuf, HostEnvironment, Arc<dyn ConfigStore>)> {
    let detected = HostEnvironment::detect().context("无法确定系统目录")?;
    let install_root = root.unwrap_or_else(|| detected.default_install_root(config));

    if dry_run {
        let sandbox = install_root.join(".dry-run");
        info!("演练模式，系统目录位于 {}", sandbox.display());
        let env = HostEnvironment::for_root(&sandbox, detected.current_year);
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        return Ok((install_root, env, store));
    }

    Ok((install_root, detected, system_store()))
}

#[cfg(windows)]
fn system_store() -> Arc<dyn ConfigStore> {
    Arc::new(cinstaller_lib::RegistryStore::new())
}

#[cfg(not(windows))]
fn system_store() -> Arc<dyn ConfigStore> {
    warn!("当前平台没有注册表，注册信息只写入内存");
    Arc::new(MemoryStore::new())
}

fn discover(config: &InstallerConfig, dry_run: bool) -> Result<ExitCode> {
    let (_, env, store) = prepare(config, None, dry_run)?;

    for host in default_hosts(store, &env, config) {
        match host.discover() {
            Ok(targets) => {
                println!("{} ({})", host.family(), targets.len());
                for target in targets {
                    println!("  {:<10} {}", target.version, target.root);
                }
            }
            Err(e) => println!("{}: [-] {}", host.family(), e),
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn install(
    config: &InstallerConfig,
    args: InstallArgs,
    log_path: Option<&Path>,
) -> Result<ExitCode> {
    let (install_root, env, store) = prepare(config, args.root.clone(), args.dry_run)?;

    let payload: Box<dyn PayloadStore> = match &args.payload {
        Some(path) => Box::new(FilePayload::new(path)),
        None => Box::new(EmbeddedPayload::app()),
    };
    let hosts = default_hosts(store.clone(), &env, config);
    let orchestrator = InstallOrchestrator::new(payload, install_root.clone(), hosts)
        .with_environment(EnvironmentPublisher::new(store, &env, config));

    let bar = progress_bar(args.quiet);
    let (handle, mut rx) = orchestrator.spawn();
    while let Some(progress) = rx.recv().await {
        bar.set_position(progress.percent.round() as u64);
        bar.set_message(progress.message);
    }

    let report = match handle.await.context("安装任务异常退出")? {
        Ok(report) => {
            bar.finish_and_clear();
            report
        }
        Err(e) => {
            bar.abandon();
            return Err(e).context("安装失败");
        }
    };

    print_report(&report, log_path);

    if args.launch {
        if args.dry_run {
            println!("[*] 演练模式，不启动 {}", config.startup_app);
        } else {
            launch(&install_root, &config.startup_app)?;
        }
    }

    Ok(if report.has_failures() {
        ExitCode::from(EXIT_PARTIAL)
    } else {
        ExitCode::SUCCESS
    })
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar
}

fn print_report(report: &InstallReport, log_path: Option<&Path>) {
    println!("安装目录: {}", report.install_root.display());
    for outcome in &report.outcomes {
        let marker = match outcome.status {
            OutcomeStatus::Success => "[+]",
            OutcomeStatus::Skipped => "[*]",
            OutcomeStatus::PartialFailure => "[!]",
            OutcomeStatus::Failed => "[-]",
        };
        println!("{} {:<16} {}", marker, outcome.scope.to_string(), outcome.detail);
    }

    let (ok, skipped, failed) = report.status_counts();
    println!("成功 {}, 跳过 {}, 失败 {}", ok, skipped, failed);
    if failed > 0 {
        if let Some(path) = log_path {
            println!("详情见日志 {}", path.display());
        }
    }
}

fn launch(install_root: &Path, startup_app: &str) -> Result<()> {
    let program = install_root.join(startup_app);
    if !program.is_file() {
        warn!("启动程序不存在: {}", program.display());
        println!("[!] 未找到 {}", program.display());
        return Ok(());
    }
    std::process::Command::new(&program)
        .current_dir(install_root)
        .spawn()
        .with_context(|| format!("无法启动 {}", program.display()))?;
    println!("[+] 已启动 {}", program.display());
    Ok(())
}
