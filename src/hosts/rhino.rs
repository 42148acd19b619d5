//! Rhino 安装器
//!
//! 产品键下每个子键代表一个已安装的主版本，插件注册写在
//! `<版本>\Plug-ins\<插件 GUID>` 下。插件文件目录按版本子键名的首字符区分。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::{HostFamily, HostInstaller, InstallTarget, TargetRoot};
use crate::config::RhinoConfig;
use crate::installer::{InstallError, InstallOutcome};
use crate::store::{ConfigStore, KeyPath, StoreValue};

/// Rhino 产品键（HKLM）
pub const PRODUCT_KEY: &str = r"SOFTWARE\McNeel\Rhinoceros";

pub struct RhinoInstaller {
    store: Arc<dyn ConfigStore>,
    config: RhinoConfig,
}

impl RhinoInstaller {
    pub fn new(store: Arc<dyn ConfigStore>, config: RhinoConfig) -> Self {
        Self { store, config }
    }

    /// `<install_root>/plugins/Rhino/<版本首字符>/<plugin_file>`
    pub fn plugin_path(&self, install_root: &Path, version: &str) -> Option<PathBuf> {
        let prefix = version.chars().next()?;
        Some(
            HostFamily::Rhino
                .plugin_source(install_root)
                .join(prefix.to_string())
                .join(&self.config.plugin_file),
        )
    }
}

impl HostInstaller for RhinoInstaller {
    fn family(&self) -> HostFamily {
        HostFamily::Rhino
    }

    fn discover(&self) -> Result<Vec<InstallTarget>, InstallError> {
        let product = KeyPath::local_machine(PRODUCT_KEY);
        Ok(self
            .store
            .subkeys_or_empty(&product)?
            .into_iter()
            .map(|version| {
                let plugin_key = product
                    .join(&version)
                    .join("Plug-ins")
                    .join(&self.config.plugin_guid);
                InstallTarget::new(HostFamily::Rhino, TargetRoot::StoreKey(plugin_key), version)
            })
            .collect())
    }

    fn install(
        &self,
        target: &InstallTarget,
        install_root: &Path,
    ) -> Result<InstallOutcome, InstallError> {
        let plugin_key = target.store_key()?;
        let plugin_path =
            self.plugin_path(install_root, &target.version)
                .ok_or_else(|| InstallError::TargetMismatch {
                    expected: "non-empty version".to_string(),
                    actual: plugin_key.to_string(),
                })?;

        let command_list = plugin_key.join("CommandList");
        for (index, command) in self.config.commands.iter().enumerate() {
            self.store.set_value(
                &command_list,
                &index.to_string(),
                StoreValue::String(command.clone()),
            )?;
        }
        self.store.set_value(
            plugin_key,
            "Name",
            StoreValue::String(self.config.plugin_name.clone()),
        )?;
        self.store.set_value(
            plugin_key,
            "FileName",
            StoreValue::String(plugin_path.to_string_lossy().to_string()),
        )?;

        if !plugin_path.is_file() {
            warn!(
                "Rhino {}: 已注册但插件文件不存在 {}",
                target.version,
                plugin_path.display()
            );
            return Ok(InstallOutcome::partial(
                target,
                format!("插件文件不存在 {}", plugin_path.display()),
            ));
        }

        info!("Rhino {}: 已注册 {}", target.version, plugin_key);
        Ok(InstallOutcome::success(target, plugin_key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::OutcomeStatus;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn product() -> KeyPath {
        KeyPath::local_machine(PRODUCT_KEY)
    }

    fn store_with_versions() -> MemoryStore {
        MemoryStore::new()
            .with_key(&product().join(r"7.0\Install"))
            .with_key(&product().join("8.0"))
    }

    #[test]
    fn test_discover_one_target_per_version() {
        let rhino = RhinoInstaller::new(Arc::new(store_with_versions()), RhinoConfig::default());
        let targets = rhino.discover().unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].version, "7.0");
        assert_eq!(
            targets[1].root,
            TargetRoot::StoreKey(product().join(&format!(
                r"8.0\Plug-ins\{}",
                RhinoConfig::default().plugin_guid
            )))
        );
    }

    #[test]
    fn test_discover_without_product_key_is_empty() {
        let rhino = RhinoInstaller::new(Arc::new(MemoryStore::new()), RhinoConfig::default());
        assert!(rhino.discover().unwrap().is_empty());
    }

    #[test]
    fn test_install_writes_command_list_and_file_name() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(store_with_versions());
        let rhino = RhinoInstaller::new(store.clone(), RhinoConfig::default());

        let plugin = rhino.plugin_path(temp.path(), "7.0").unwrap();
        fs::create_dir_all(plugin.parent().unwrap()).unwrap();
        fs::write(&plugin, "rhp").unwrap();
        assert!(plugin.ends_with("plugins/Rhino/7/SDPluginForRhino.rhp"));

        let target = rhino.discover().unwrap().remove(0);
        let outcome = rhino.install(&target, temp.path()).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);

        let key = target.store_key().unwrap();
        let commands = store.values_of(&key.join("CommandList"));
        assert_eq!(
            commands.keys().cloned().collect::<Vec<_>>(),
            vec!["0".to_string(), "1".to_string(), "2".to_string()]
        );
        assert_eq!(
            store.values_of(key).get("FileName").and_then(|v| v.as_str()).map(PathBuf::from),
            Some(plugin)
        );
    }

    #[test]
    fn test_install_with_missing_plugin_file_is_partial() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(store_with_versions());
        let rhino = RhinoInstaller::new(store.clone(), RhinoConfig::default());

        let target = rhino.discover().unwrap().remove(1);
        let outcome = rhino.install(&target, temp.path()).unwrap();

        assert_eq!(outcome.status, OutcomeStatus::PartialFailure);
        assert!(store.open_path(target.store_key().unwrap()).unwrap());
    }
}
