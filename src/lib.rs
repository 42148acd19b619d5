//! cinstaller - 多宿主插件安装器
//!
//! 把内置安装包解压到安装目录，然后为 Revit、AutoCAD、Rhino 和 SketchUp
//! 各自完成插件注册，最后发布环境变量。

pub mod config;
pub mod environment;
pub mod hosts;
pub mod installer;
pub mod logger;
pub mod store;

pub use config::InstallerConfig;
pub use environment::{EnvironmentPublisher, HostEnvironment};
pub use hosts::{default_hosts, HostFamily, HostInstaller, InstallTarget, TargetRoot};
pub use installer::{
    EmbeddedPayload, FilePayload, InstallError, InstallOrchestrator, InstallProgress,
    InstallReport, OutcomeStatus, PayloadStore, RunState,
};
pub use store::{ConfigStore, KeyPath, MemoryStore};

#[cfg(windows)]
pub use store::RegistryStore;
