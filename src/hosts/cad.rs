//! AutoCAD 安装器
//!
//! 逐个遍历厂商键下的发行版子键（如 `R24.0`），沿 `CurVer` 值找到产品键
//! （如 `ACAD-4101:804`），目标是该产品键的 `Applications\<应用键>` 分支。
//! 遍历顺序即注册顺序。对应发行版前缀（前三个字符）的加载文件不存在时整版跳过。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{HostFamily, HostInstaller, InstallTarget, TargetRoot};
use crate::config::CadConfig;
use crate::installer::{InstallError, InstallOutcome};
use crate::store::{ConfigStore, KeyPath, StoreValue};

/// 厂商键（HKCU）
pub const VENDOR_KEY: &str = r"Software\Autodesk\AutoCAD";

pub struct CadInstaller {
    store: Arc<dyn ConfigStore>,
    config: CadConfig,
}

impl CadInstaller {
    pub fn new(store: Arc<dyn ConfigStore>, config: CadConfig) -> Self {
        Self { store, config }
    }

    /// `<install_root>/plugins/Cad/<发行版前三个字符>/<loader_file>`
    pub fn loader_path(&self, install_root: &Path, release: &str) -> PathBuf {
        let prefix: String = release.chars().take(3).collect();
        HostFamily::Cad
            .plugin_source(install_root)
            .join(prefix)
            .join(&self.config.loader_file)
    }
}

impl HostInstaller for CadInstaller {
    fn family(&self) -> HostFamily {
        HostFamily::Cad
    }

    fn discover(&self) -> Result<Vec<InstallTarget>, InstallError> {
        let vendor = KeyPath::current_user(VENDOR_KEY);
        let mut targets = Vec::new();

        for release in self.store.subkeys_or_empty(&vendor)? {
            let release_key = vendor.join(&release);
            let Some(cur_ver) = self.store.get_string(&release_key, "CurVer")? else {
                debug!("{} 没有 CurVer，跳过", release_key);
                continue;
            };
            let product_key = release_key.join(&cur_ver);
            if !self.store.open_path(&product_key)? {
                debug!("CurVer 指向不存在的键 {}，跳过", product_key);
                continue;
            }

            let app_key = product_key.join("Applications").join(&self.config.app_key);
            targets.push(InstallTarget::new(
                HostFamily::Cad,
                TargetRoot::StoreKey(app_key),
                release,
            ));
        }
        Ok(targets)
    }

    fn install(
        &self,
        target: &InstallTarget,
        install_root: &Path,
    ) -> Result<InstallOutcome, InstallError> {
        let app_key = target.store_key()?;
        let loader = self.loader_path(install_root, &target.version);
        if !loader.is_file() {
            warn!(
                "AutoCAD {}: 未找到 {}，跳过注册",
                target.version,
                loader.display()
            );
            return Ok(InstallOutcome::skipped(
                target,
                format!("未找到 {}", loader.display()),
            ));
        }

        let loader_str = loader.to_string_lossy().to_string();
        self.store
            .set_value(app_key, "LOADER", StoreValue::String(loader_str))?;
        self.store
            .set_value(app_key, "LOADCTRLS", StoreValue::Dword(self.config.load_ctrls))?;
        self.store.set_value(
            app_key,
            "DESCRIPTION",
            StoreValue::String(self.config.description.clone()),
        )?;

        let commands = app_key.join("Commands");
        for command in &self.config.commands {
            self.store
                .set_value(&commands, command, StoreValue::String(command.clone()))?;
        }
        self.store.create_path(&app_key.join("Groups"))?;

        info!("AutoCAD {}: 已注册 {}", target.version, app_key);
        Ok(InstallOutcome::success(target, app_key.to_string()))
    }
}
