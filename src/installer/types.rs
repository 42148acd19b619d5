//! 安装器类型定义
//!
//! 定义安装相关的错误类型、运行状态、进度类型和安装结果

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::hosts::{HostFamily, InstallTarget};
use crate::store::StoreError;

/// 安装错误类型
#[derive(Error, Debug)]
pub enum InstallError {
    /// 安装包资源不可用
    #[error("安装包不可用: {0}")]
    PayloadUnavailable(String),

    /// 包格式无效
    #[error("包格式无效: {0}")]
    InvalidPackage(String),

    /// 解压失败
    #[error("解压失败: {0}")]
    ExtractFailed(String),

    /// 插件文件缺失
    #[error("插件文件缺失: {}", .0.display())]
    MissingPluginFiles(PathBuf),

    /// 目标与安装器不匹配
    #[error("目标不匹配: 期望 {expected}, 实际 {actual}")]
    TargetMismatch { expected: String, actual: String },

    /// 配置无效
    #[error("配置无效: {0}")]
    InvalidConfig(String),

    /// 环境目录无法确定
    #[error("无法确定系统目录: {0}")]
    Environment(String),

    /// 编排器已运行结束
    #[error("安装已结束 ({0})，不能再次运行")]
    AlreadyFinished(RunState),

    /// 配置存储错误
    #[error("配置存储错误: {0}")]
    Store(#[from] StoreError),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML 解析错误
    #[error("YAML 解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// 运行状态
///
/// Idle → Extracting → InstallingHost(..) → Completed；
/// 只有解压失败会进入 Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "host", rename_all = "snake_case")]
pub enum RunState {
    /// 未开始
    Idle,
    /// 解压中
    Extracting,
    /// 安装到某个宿主
    InstallingHost(HostFamily),
    /// 完成
    Completed,
    /// 失败
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Extracting => write!(f, "extracting"),
            RunState::InstallingHost(host) => write!(f, "installing:{}", host),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// 安装进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallProgress {
    /// 当前阶段
    pub stage: RunState,
    /// 进度百分比 (0-100)
    pub percent: f64,
    /// 状态消息
    pub message: String,
}

impl InstallProgress {
    /// 创建新的进度实例
    pub fn new(stage: RunState, percent: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.clamp(0.0, 100.0),
            message: message.into(),
        }
    }

    /// 创建完成状态
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(RunState::Completed, 100.0, message)
    }

    /// 创建失败状态，保留失败时的进度
    pub fn failed(percent: f64, message: impl Into<String>) -> Self {
        Self::new(RunState::Failed, percent, message)
    }
}

/// 进度回调 trait
///
/// 用于接收安装进度更新，调用顺序即发出顺序
pub trait ProgressCallback: Send + Sync {
    /// 进度更新回调
    fn on_progress(&self, progress: InstallProgress);
}

/// 空进度回调实现
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _progress: InstallProgress) {}
}

/// 函数进度回调实现
///
/// 将闭包包装为 ProgressCallback
pub struct FnProgressCallback<F>
where
    F: Fn(InstallProgress) + Send + Sync,
{
    callback: F,
}

impl<F> FnProgressCallback<F>
where
    F: Fn(InstallProgress) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressCallback for FnProgressCallback<F>
where
    F: Fn(InstallProgress) + Send + Sync,
{
    fn on_progress(&self, progress: InstallProgress) {
        (self.callback)(progress);
    }
}

/// 通道进度回调
///
/// 把工作线程产生的进度交给唯一的展示端。无界通道保证按序且不丢弃；
/// 接收端已关闭时静默丢弃。
pub struct ChannelProgressCallback {
    sender: tokio::sync::mpsc::UnboundedSender<InstallProgress>,
}

impl ChannelProgressCallback {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<InstallProgress>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_progress(&self, progress: InstallProgress) {
        let _ = self.sender.send(progress);
    }
}

/// 结果范围
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutcomeScope {
    /// 与宿主无关的步骤（解压、环境变量）
    Global { step: String },
    /// 整个宿主族（发现失败）
    Family { host: HostFamily },
    /// 单个安装目标
    Target { target: InstallTarget },
}

impl std::fmt::Display for OutcomeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeScope::Global { step } => write!(f, "global/{}", step),
            OutcomeScope::Family { host } => write!(f, "{}", host),
            OutcomeScope::Target { target } => write!(f, "{} {}", target.host, target.version),
        }
    }
}

/// 结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    /// 有意跳过，例如缺少对应版本的插件二进制
    Skipped,
    PartialFailure,
    Failed,
}

impl OutcomeStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, OutcomeStatus::PartialFailure | OutcomeStatus::Failed)
    }
}

/// 单步安装结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub scope: OutcomeScope,
    pub status: OutcomeStatus,
    pub detail: String,
}

impl InstallOutcome {
    pub fn new(scope: OutcomeScope, status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self {
            scope,
            status,
            detail: detail.into(),
        }
    }

    pub fn global(step: &str, status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self::new(
            OutcomeScope::Global {
                step: step.to_string(),
            },
            status,
            detail,
        )
    }

    pub fn success(target: &InstallTarget, detail: impl Into<String>) -> Self {
        Self::new(
            OutcomeScope::Target {
                target: target.clone(),
            },
            OutcomeStatus::Success,
            detail,
        )
    }

    pub fn skipped(target: &InstallTarget, detail: impl Into<String>) -> Self {
        Self::new(
            OutcomeScope::Target {
                target: target.clone(),
            },
            OutcomeStatus::Skipped,
            detail,
        )
    }

    pub fn partial(target: &InstallTarget, detail: impl Into<String>) -> Self {
        Self::new(
            OutcomeScope::Target {
                target: target.clone(),
            },
            OutcomeStatus::PartialFailure,
            detail,
        )
    }

    pub fn failed(target: &InstallTarget, detail: impl Into<String>) -> Self {
        Self::new(
            OutcomeScope::Target {
                target: target.clone(),
            },
            OutcomeStatus::Failed,
            detail,
        )
    }
}

/// 一次运行的最终报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    /// 安装根目录
    pub install_root: PathBuf,
    /// 解压写入的文件数
    pub files_written: usize,
    /// 各步骤结果，按执行顺序
    pub outcomes: Vec<InstallOutcome>,
    /// 结束时的进度
    pub final_progress: f64,
}

impl InstallReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.status.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstallOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    /// 某宿主族的目标级结果
    pub fn outcomes_for(&self, host: HostFamily) -> impl Iterator<Item = &InstallOutcome> {
        self.outcomes.iter().filter(move |o| match &o.scope {
            OutcomeScope::Target { target } => target.host == host,
            OutcomeScope::Family { host: h } => *h == host,
            OutcomeScope::Global { .. } => false,
        })
    }

    /// (成功, 跳过, 失败) 计数，部分失败计入失败
    pub fn status_counts(&self) -> (usize, usize, usize) {
        self.outcomes
            .iter()
            .fold((0, 0, 0), |(ok, skipped, failed), o| match o.status {
                OutcomeStatus::Success => (ok + 1, skipped, failed),
                OutcomeStatus::Skipped => (ok, skipped + 1, failed),
                OutcomeStatus::PartialFailure | OutcomeStatus::Failed => (ok, skipped, failed + 1),
            })
    }
}
