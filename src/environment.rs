//! 系统目录与安装后环境变量
//!
//! `HostEnvironment` 收集按约定推导路径所需的目录和当前年份，注入到各宿主安装器；
//! `EnvironmentPublisher` 在所有宿主安装完成后设置环境变量。

use chrono::Datelike;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::InstallerConfig;
use crate::installer::{InstallError, InstallOutcome, OutcomeStatus};
use crate::store::{ConfigStore, KeyPath, StoreValue};

/// 用户级环境变量所在的键
pub const USER_ENVIRONMENT_KEY: &str = "Environment";

/// 宿主安装所依赖的系统目录
#[derive(Debug, Clone, PartialEq)]
pub struct HostEnvironment {
    /// 漫游应用数据目录（Windows: %APPDATA%）
    pub roaming_app_data: PathBuf,
    /// 本地应用数据目录（Windows: %LOCALAPPDATA%）
    pub local_app_data: PathBuf,
    /// 所有用户共享的程序数据目录（Windows: %ProgramData%）
    pub program_data: PathBuf,
    /// 图片目录
    pub pictures_dir: PathBuf,
    pub current_year: i32,
}

impl HostEnvironment {
    /// 从当前系统解析
    pub fn detect() -> Result<Self, InstallError> {
        let roaming_app_data = dirs::config_dir()
            .ok_or_else(|| InstallError::Environment("roaming app data".to_string()))?;
        let local_app_data = dirs::data_local_dir()
            .ok_or_else(|| InstallError::Environment("local app data".to_string()))?;
        let pictures_dir = dirs::picture_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
            .ok_or_else(|| InstallError::Environment("pictures".to_string()))?;
        let program_data = std::env::var_os("ProgramData")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"));

        Ok(Self {
            roaming_app_data,
            local_app_data,
            program_data,
            pictures_dir,
            current_year: chrono::Local::now().year(),
        })
    }

    /// 所有目录都放在 `root` 之下，用于测试和演练
    pub fn for_root(root: &Path, current_year: i32) -> Self {
        Self {
            roaming_app_data: root.join("AppData").join("Roaming"),
            local_app_data: root.join("AppData").join("Local"),
            program_data: root.join("ProgramData"),
            pictures_dir: root.join("Pictures"),
            current_year,
        }
    }

    /// 默认安装根目录：<本地应用数据>/<app_name>
    pub fn default_install_root(&self, config: &InstallerConfig) -> PathBuf {
        config
            .install_dir
            .clone()
            .unwrap_or_else(|| self.local_app_data.join(&config.app_name))
    }
}

/// 安装后环境变量发布器
///
/// 设置两个变量：安装根目录和 `<图片>/<app_name>` 图片输出目录（不存在时创建）。
/// 变量同时写入当前进程和用户级环境（配置存储的 HKCU\Environment）。
pub struct EnvironmentPublisher {
    store: Arc<dyn ConfigStore>,
    home_var: String,
    image_var: String,
    image_dir: PathBuf,
}

impl EnvironmentPublisher {
    pub fn new(store: Arc<dyn ConfigStore>, env: &HostEnvironment, config: &InstallerConfig) -> Self {
        Self {
            store,
            home_var: config.home_env_var(),
            image_var: config.image_env_var(),
            image_dir: env.pictures_dir.join(&config.app_name),
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// 发布环境变量，失败不致命，以结果形式返回
    pub fn publish(&self, install_root: &Path) -> InstallOutcome {
        match self.try_publish(install_root) {
            Ok(()) => InstallOutcome::global(
                "environment",
                OutcomeStatus::Success,
                format!("{}, {}", self.home_var, self.image_var),
            ),
            Err(e) => {
                warn!("设置环境变量失败: {}", e);
                InstallOutcome::global("environment", OutcomeStatus::Failed, e.to_string())
            }
        }
    }

    fn try_publish(&self, install_root: &Path) -> Result<(), InstallError> {
        fs::create_dir_all(&self.image_dir)?;

        let vars = [
            (&self.home_var, install_root.to_string_lossy().to_string()),
            (&self.image_var, self.image_dir.to_string_lossy().to_string()),
        ];

        let key = KeyPath::current_user(USER_ENVIRONMENT_KEY);
        for (name, value) in vars {
            std::env::set_var(name, &value);
            self.store
                .set_value(&key, name, StoreValue::String(value.clone()))?;
            info!("环境变量 {} = {}", name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_for_root_layout() {
        let env = HostEnvironment::for_root(Path::new("/x"), 2025);
        assert_eq!(env.roaming_app_data, PathBuf::from("/x/AppData/Roaming"));
        assert_eq!(env.current_year, 2025);

        let config = InstallerConfig::default();
        assert_eq!(
            env.default_install_root(&config),
            PathBuf::from("/x/AppData/Local/SDPlugin")
        );
    }

    #[test]
    fn test_install_dir_override() {
        let env = HostEnvironment::for_root(Path::new("/x"), 2025);
        let config = InstallerConfig {
            install_dir: Some(PathBuf::from("/custom")),
            ..Default::default()
        };
        assert_eq!(env.default_install_root(&config), PathBuf::from("/custom"));
    }

    #[test]
    fn test_publish_sets_variables_and_creates_image_dir() {
        let temp = TempDir::new().unwrap();
        let env = HostEnvironment::for_root(temp.path(), 2025);
        let config = InstallerConfig {
            app_name: "PublishTest".to_string(),
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new());
        let publisher = EnvironmentPublisher::new(store.clone(), &env, &config);

        let root = temp.path().join("install");
        let outcome = publisher.publish(&root);

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(publisher.image_dir().is_dir());
        assert_eq!(
            std::env::var("PUBLISHTEST_HOME").unwrap(),
            root.to_string_lossy().into_owned()
        );

        let values = store.values_of(&KeyPath::current_user(USER_ENVIRONMENT_KEY));
        assert_eq!(
            values
                .get("PUBLISHTEST_IMAGE_DIR")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            Some(publisher.image_dir().to_string_lossy().into_owned())
        );
    }
}
