//! 安装器模块
//!
//! - payload: 安装包来源与解码
//! - extractor: 解压到安装根目录
//! - progress: 加权进度聚合
//! - orchestrator: 串联解压、各宿主安装和环境变量发布
//! - types: 错误、状态、进度与结果类型

pub mod extractor;
pub mod orchestrator;
pub mod payload;
pub mod progress;
pub mod types;

pub use extractor::{ArchiveExtractor, ExtractSummary};
pub use orchestrator::InstallOrchestrator;
pub use payload::{
    BytesPayload, EmbeddedPayload, FilePayload, PayloadEntry, PayloadStore, PluginPayload,
};
pub use progress::{ProgressAggregator, ProgressStage, EXTRACTION_WEIGHT};
pub use types::{
    ChannelProgressCallback, FnProgressCallback, InstallError, InstallOutcome, InstallProgress,
    InstallReport, NoopProgressCallback, OutcomeScope, OutcomeStatus, ProgressCallback, RunState,
};
