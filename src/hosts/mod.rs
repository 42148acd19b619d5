//! 宿主程序模块
//!
//! 四个宿主族各自独立实现 `HostInstaller`：
//! - Revit: 卸载记录 + 产品键联合发现，按目录约定放置文件
//! - Cad: 沿 CurVer 间接引用找到产品键，写入 Applications 注册
//! - Rhino: 每个版本子键写入固定 GUID 的插件注册
//! - Sketchup: 不做真正的发现，按年份约定合成插件目录
//!
//! 各实现之间不共享算法，只共享这一层很薄的接口。

pub mod cad;
mod fs_util;
pub mod revit;
pub mod rhino;
pub mod sketchup;

pub use cad::CadInstaller;
pub use fs_util::{copy_dir_recursive, copy_files};
pub use revit::RevitInstaller;
pub use rhino::RhinoInstaller;
pub use sketchup::SketchupInstaller;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::InstallerConfig;
use crate::environment::HostEnvironment;
use crate::installer::{InstallError, InstallOutcome};
use crate::store::{ConfigStore, KeyPath};

/// 宿主族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostFamily {
    Revit,
    Cad,
    Rhino,
    Sketchup,
}

impl HostFamily {
    /// 固定执行顺序
    pub const ORDER: [HostFamily; 4] = [
        HostFamily::Revit,
        HostFamily::Cad,
        HostFamily::Rhino,
        HostFamily::Sketchup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostFamily::Revit => "revit",
            HostFamily::Cad => "cad",
            HostFamily::Rhino => "rhino",
            HostFamily::Sketchup => "sketchup",
        }
    }

    /// 安装根目录下 `plugins/` 中对应的子目录名
    pub fn plugin_dir_name(&self) -> &'static str {
        match self {
            HostFamily::Revit => "Revit",
            HostFamily::Cad => "Cad",
            HostFamily::Rhino => "Rhino",
            HostFamily::Sketchup => "Sketchup",
        }
    }

    /// `<install_root>/plugins/<Family>`
    pub fn plugin_source(&self, install_root: &Path) -> PathBuf {
        install_root.join("plugins").join(self.plugin_dir_name())
    }
}

impl std::str::FromStr for HostFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "revit" => Ok(HostFamily::Revit),
            "cad" | "autocad" => Ok(HostFamily::Cad),
            "rhino" => Ok(HostFamily::Rhino),
            "sketchup" => Ok(HostFamily::Sketchup),
            _ => Err(format!("Invalid host family: {s}")),
        }
    }
}

impl std::fmt::Display for HostFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 目标根：文件系统目录或配置存储中的键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "location", rename_all = "lowercase")]
pub enum TargetRoot {
    Directory(PathBuf),
    StoreKey(KeyPath),
}

impl std::fmt::Display for TargetRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetRoot::Directory(path) => write!(f, "{}", path.display()),
            TargetRoot::StoreKey(key) => write!(f, "{}", key),
        }
    }
}

/// 一个已发现（或按约定合成）的宿主安装目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallTarget {
    pub host: HostFamily,
    pub root: TargetRoot,
    pub version: String,
}

impl InstallTarget {
    pub fn new(host: HostFamily, root: TargetRoot, version: impl Into<String>) -> Self {
        Self {
            host,
            root,
            version: version.into(),
        }
    }

    /// 取出目录型根，类型不符时报错
    pub fn directory(&self) -> Result<&Path, InstallError> {
        match &self.root {
            TargetRoot::Directory(path) => Ok(path),
            TargetRoot::StoreKey(key) => Err(InstallError::TargetMismatch {
                expected: "directory".to_string(),
                actual: key.to_string(),
            }),
        }
    }

    /// 取出存储键型根，类型不符时报错
    pub fn store_key(&self) -> Result<&KeyPath, InstallError> {
        match &self.root {
            TargetRoot::StoreKey(key) => Ok(key),
            TargetRoot::Directory(path) => Err(InstallError::TargetMismatch {
                expected: "store key".to_string(),
                actual: path.display().to_string(),
            }),
        }
    }
}

/// 宿主安装器
///
/// `discover` 在宿主未安装（存储分支不存在）时返回空列表而不是错误；
/// `install` 的错误由编排器在目标边界捕获，不会中断后续目标。
pub trait HostInstaller: Send + Sync {
    fn family(&self) -> HostFamily;

    fn discover(&self) -> Result<Vec<InstallTarget>, InstallError>;

    fn install(
        &self,
        target: &InstallTarget,
        install_root: &Path,
    ) -> Result<InstallOutcome, InstallError>;
}

/// 按固定顺序构建四个宿主安装器
pub fn default_hosts(
    store: Arc<dyn ConfigStore>,
    env: &HostEnvironment,
    config: &InstallerConfig,
) -> Vec<Box<dyn HostInstaller>> {
    vec![
        Box::new(RevitInstaller::new(
            store.clone(),
            env.program_data.clone(),
            config.revit.clone(),
        )),
        Box::new(CadInstaller::new(store.clone(), config.cad.clone())),
        Box::new(RhinoInstaller::new(store, config.rhino.clone())),
        Box::new(SketchupInstaller::new(
            env.roaming_app_data.clone(),
            env.current_year,
            config.sketchup.clone(),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_host_family_parse_and_display() {
        assert_eq!("AutoCAD".parse::<HostFamily>().unwrap(), HostFamily::Cad);
        assert_eq!("Sketchup".parse::<HostFamily>().unwrap(), HostFamily::Sketchup);
        assert!("maya".parse::<HostFamily>().is_err());
        assert_eq!(HostFamily::Rhino.to_string(), "rhino");
    }

    #[test]
    fn test_plugin_source_layout() {
        let root = Path::new("/opt/app");
        assert_eq!(
            HostFamily::Cad.plugin_source(root),
            PathBuf::from("/opt/app/plugins/Cad")
        );
    }

    #[test]
    fn test_target_root_accessors() {
        let dir = InstallTarget::new(
            HostFamily::Revit,
            TargetRoot::Directory(PathBuf::from("/addins/2022")),
            "2022",
        );
        assert!(dir.directory().is_ok());
        assert!(matches!(
            dir.store_key(),
            Err(InstallError::TargetMismatch { .. })
        ));
    }

    #[test]
    fn test_default_hosts_order() {
        let env = HostEnvironment::for_root(Path::new("/tmp/env"), 2025);
        let hosts = default_hosts(
            Arc::new(MemoryStore::new()),
            &env,
            &InstallerConfig::default(),
        );
        let families: Vec<HostFamily> = hosts.iter().map(|h| h.family()).collect();
        assert_eq!(families, HostFamily::ORDER.to_vec());
    }
}
