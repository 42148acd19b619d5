//! 安装编排
//!
//! 流程: 解压 → 各宿主依次发现并安装 → 发布环境变量 → 完成
//!
//! 只有解压失败会中止运行。宿主的发现或安装失败在宿主/目标边界被捕获，
//! 记入报告后继续下一个目标。

use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::extractor::ArchiveExtractor;
use super::payload::{PayloadStore, PluginPayload};
use super::progress::{ProgressAggregator, EXTRACTION_WEIGHT};
use super::types::{
    ChannelProgressCallback, InstallError, InstallOutcome, InstallProgress, InstallReport,
    OutcomeScope, OutcomeStatus, ProgressCallback, RunState,
};
use crate::environment::EnvironmentPublisher;
use crate::hosts::HostInstaller;

/// 安装编排器
///
/// 持有一次运行所需的全部依赖；每个实例只运行一次
pub struct InstallOrchestrator {
    payload: Box<dyn PayloadStore>,
    install_root: PathBuf,
    hosts: Vec<Box<dyn HostInstaller>>,
    publisher: Option<EnvironmentPublisher>,
    state: RunState,
}

impl InstallOrchestrator {
    pub fn new(
        payload: Box<dyn PayloadStore>,
        install_root: PathBuf,
        hosts: Vec<Box<dyn HostInstaller>>,
    ) -> Self {
        Self {
            payload,
            install_root,
            hosts,
            publisher: None,
            state: RunState::Idle,
        }
    }

    /// 安装完成后发布环境变量
    pub fn with_environment(mut self, publisher: EnvironmentPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// 执行完整安装
    ///
    /// 进度按发出顺序同步交给 `progress`
    pub fn run(&mut self, progress: &dyn ProgressCallback) -> Result<InstallReport, InstallError> {
        if self.state.is_terminal() {
            return Err(InstallError::AlreadyFinished(self.state));
        }
        let mut aggregator = ProgressAggregator::new();

        // 阶段 1: 解压
        self.state = RunState::Extracting;
        let files_written = match self.extract(&mut aggregator, progress) {
            Ok(files) => files,
            Err(e) => {
                self.state = RunState::Failed;
                error!("解压失败，安装中止: {}", e);
                progress.on_progress(InstallProgress::failed(aggregator.value(), e.to_string()));
                return Err(e);
            }
        };

        // 阶段 2: 各宿主
        let mut outcomes = vec![InstallOutcome::global(
            "extract",
            OutcomeStatus::Success,
            format!("{} 个文件 -> {}", files_written, self.install_root.display()),
        )];
        let host_count = self.hosts.len();
        for (index, host) in self.hosts.iter().enumerate() {
            let remaining_hosts = (host_count - index) as f64;
            let weight = aggregator.remaining_weight() / remaining_hosts;

            self.state = RunState::InstallingHost(host.family());
            Self::install_host(
                host.as_ref(),
                &self.install_root,
                weight,
                &mut aggregator,
                progress,
                &mut outcomes,
            );
        }

        // 阶段 3: 环境变量
        if let Some(publisher) = &self.publisher {
            outcomes.push(publisher.publish(&self.install_root));
        }

        self.state = RunState::Completed;
        let final_progress = aggregator.complete();
        let report = InstallReport {
            install_root: self.install_root.clone(),
            files_written,
            outcomes,
            final_progress,
        };
        let (ok, skipped, failed) = report.status_counts();
        info!("安装完成: 成功 {}, 跳过 {}, 失败 {}", ok, skipped, failed);
        progress.on_progress(InstallProgress::complete(format!(
            "安装完成: 成功 {}, 跳过 {}, 失败 {}",
            ok, skipped, failed
        )));

        Ok(report)
    }

    /// 在阻塞线程池上运行，进度通过通道送出
    ///
    /// 通道在运行结束时随回调一起关闭。必须在 tokio 运行时内调用。
    pub fn spawn(
        mut self,
    ) -> (
        JoinHandle<Result<InstallReport, InstallError>>,
        UnboundedReceiver<InstallProgress>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::task::spawn_blocking(move || {
            let callback = ChannelProgressCallback::new(tx);
            self.run(&callback)
        });
        (handle, rx)
    }

    fn extract(
        &self,
        aggregator: &mut ProgressAggregator,
        progress: &dyn ProgressCallback,
    ) -> Result<usize, InstallError> {
        progress.on_progress(InstallProgress::new(
            RunState::Extracting,
            aggregator.value(),
            format!("读取安装包 {}...", self.payload.name()),
        ));
        let bytes = self.payload.load()?;
        let payload = PluginPayload::from_archive(&bytes)?;
        if payload.is_empty() {
            warn!("安装包 {} 没有任何条目", self.payload.name());
        }
        info!(
            "解压 {} 个条目到 {}",
            payload.len(),
            self.install_root.display()
        );

        aggregator.begin_stage("extract", EXTRACTION_WEIGHT, payload.len());
        let summary = ArchiveExtractor::extract(&payload, &self.install_root, |done, total| {
            let percent = aggregator.advance();
            progress.on_progress(InstallProgress::new(
                RunState::Extracting,
                percent,
                format!("解压中 ({}/{})", done, total),
            ));
        })?;
        let percent = aggregator.finish_stage();
        progress.on_progress(InstallProgress::new(
            RunState::Extracting,
            percent,
            format!("已解压 {} 个文件", summary.files_written),
        ));

        Ok(summary.files_written)
    }

    fn install_host(
        host: &dyn HostInstaller,
        install_root: &Path,
        weight: f64,
        aggregator: &mut ProgressAggregator,
        progress: &dyn ProgressCallback,
        outcomes: &mut Vec<InstallOutcome>,
    ) {
        let family = host.family();
        let stage = RunState::InstallingHost(family);
        progress.on_progress(InstallProgress::new(
            stage,
            aggregator.value(),
            format!("查找 {} ...", family),
        ));

        let targets = match host.discover() {
            Ok(targets) => targets,
            Err(e) => {
                warn!("{} 发现失败: {}", family, e);
                outcomes.push(InstallOutcome::new(
                    OutcomeScope::Family { host: family },
                    OutcomeStatus::Failed,
                    e.to_string(),
                ));
                aggregator.begin_stage(family.as_str(), weight, 0);
                progress.on_progress(InstallProgress::new(
                    stage,
                    aggregator.value(),
                    format!("{} 发现失败", family),
                ));
                return;
            }
        };

        info!("{}: 发现 {} 个目标", family, targets.len());
        aggregator.begin_stage(family.as_str(), weight, targets.len());

        for target in &targets {
            let outcome = match host.install(target, install_root) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{} {} 安装失败: {}", family, target.version, e);
                    InstallOutcome::failed(target, e.to_string())
                }
            };
            let percent = aggregator.advance();
            progress.on_progress(InstallProgress::new(
                stage,
                percent,
                format!("{} {}: {:?}", family, target.version, outcome.status),
            ));
            outcomes.push(outcome);
        }

        let percent = aggregator.finish_stage();
        progress.on_progress(InstallProgress::new(
            stage,
            percent,
            format!("{} 完成", family),
        ));
    }
}
