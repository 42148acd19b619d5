//! Revit 安装器
//!
//! 发现由两次独立查询组成，只按年份松散对齐：
//! 1. 卸载记录中 DisplayName 含 "Revit" 和四位年份（不早于 min_year）的条目 → 已安装年份
//! 2. 产品键下含 `Addins` 路径段的字符串值 → 各年份的插件加载目录
//!
//! 某年份在产品键中找不到加载目录时，回退到 `<ProgramData>/Autodesk/Revit/Addins/<年份>`。
//! 安装只放置文件，Revit 按目录约定自行加载。

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{copy_files, HostFamily, HostInstaller, InstallTarget, TargetRoot};
use crate::config::RevitConfig;
use crate::installer::{InstallError, InstallOutcome};
use crate::store::{ConfigStore, KeyPath, StoreError, StoreValue};

/// 卸载记录
pub const UNINSTALL_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";
/// Revit 产品键
pub const PRODUCT_KEY: &str = r"SOFTWARE\Autodesk\Revit";

static REVIT_DISPLAY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brevit\b.*?(?:^|\D)(\d{4})(?:\D|$)").expect("valid regex"));

static FOUR_DIGIT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{4})(?:\D|$)").expect("valid regex"));

/// 从 DisplayName 中取出 Revit 年份
fn display_name_year(display_name: &str) -> Option<u32> {
    REVIT_DISPLAY_NAME
        .captures(display_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 路径是否包含 `Addins` 段
fn has_addins_segment(path: &str) -> bool {
    path.split(['\\', '/'])
        .any(|segment| segment.eq_ignore_ascii_case("addins"))
}

/// 路径中最后一个四位年份
fn path_year(path: &str) -> Option<u32> {
    FOUR_DIGIT_YEAR
        .captures_iter(path)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .last()
}

pub struct RevitInstaller {
    store: Arc<dyn ConfigStore>,
    program_data: PathBuf,
    config: RevitConfig,
}

impl RevitInstaller {
    pub fn new(store: Arc<dyn ConfigStore>, program_data: PathBuf, config: RevitConfig) -> Self {
        Self {
            store,
            program_data,
            config,
        }
    }

    /// 约定的 Addins 目录
    pub fn convention_addins_dir(&self, year: u32) -> PathBuf {
        self.program_data
            .join("Autodesk")
            .join("Revit")
            .join("Addins")
            .join(year.to_string())
    }

    /// 查询一：卸载记录中的已安装年份
    fn installed_years(&self) -> Result<BTreeSet<u32>, StoreError> {
        let uninstall = KeyPath::local_machine(UNINSTALL_KEY);
        let mut years = BTreeSet::new();

        for entry in self.store.subkeys_or_empty(&uninstall)? {
            let key = uninstall.join(&entry);
            let display_name = match self.store.get_string(&key, "DisplayName") {
                Ok(Some(name)) => name,
                Ok(None) => continue,
                Err(e) => {
                    debug!("跳过无法读取的卸载记录 {}: {}", key, e);
                    continue;
                }
            };
            if let Some(year) = display_name_year(&display_name) {
                if year >= self.config.min_year {
                    debug!("发现 Revit {} ({})", year, display_name);
                    years.insert(year);
                }
            }
        }
        Ok(years)
    }

    /// 查询二：产品键中按年份索引的 Addins 目录
    fn addin_roots(&self) -> Result<BTreeMap<u32, PathBuf>, StoreError> {
        let product = KeyPath::local_machine(PRODUCT_KEY);
        let mut roots = BTreeMap::new();

        for entry in self.store.subkeys_or_empty(&product)? {
            let key = product.join(&entry);
            let mut keys = vec![key.clone()];
            keys.extend(
                self.store
                    .subkeys_or_empty(&key)?
                    .into_iter()
                    .map(|child| key.join(&child)),
            );

            for key in keys {
                for (_, value) in self.store.enumerate_values(&key)? {
                    let StoreValue::String(path) = value else {
                        continue;
                    };
                    if !has_addins_segment(&path) {
                        continue;
                    }
                    if let Some(year) = path_year(&path) {
                        roots.entry(year).or_insert_with(|| PathBuf::from(&path));
                    }
                }
            }
        }
        Ok(roots)
    }
}

impl HostInstaller for RevitInstaller {
    fn family(&self) -> HostFamily {
        HostFamily::Revit
    }

    fn discover(&self) -> Result<Vec<InstallTarget>, InstallError> {
        let years = self.installed_years()?;
        if years.is_empty() {
            return Ok(Vec::new());
        }
        let roots = self.addin_roots()?;

        Ok(years
            .into_iter()
            .map(|year| {
                let root = roots
                    .get(&year)
                    .cloned()
                    .unwrap_or_else(|| self.convention_addins_dir(year));
                InstallTarget::new(HostFamily::Revit, TargetRoot::Directory(root), year.to_string())
            })
            .collect())
    }

    fn install(
        &self,
        target: &InstallTarget,
        install_root: &Path,
    ) -> Result<InstallOutcome, InstallError> {
        let addins_dir = target.directory()?;
        let source = HostFamily::Revit.plugin_source(install_root);
        if !source.is_dir() {
            return Err(InstallError::MissingPluginFiles(source));
        }

        let copied = copy_files(&source, addins_dir)?;
        info!("Revit {}: 已复制 {} 个文件到 {}", target.version, copied, addins_dir.display());
        Ok(InstallOutcome::success(
            target,
            format!("{} 个文件 -> {}", copied, addins_dir.display()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::OutcomeStatus;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn uninstall_entry(store: MemoryStore, id: &str, name: &str) -> MemoryStore {
        store.with_value(
            &KeyPath::local_machine(UNINSTALL_KEY).join(id),
            "DisplayName",
            name,
        )
    }

    fn installer(store: MemoryStore, program_data: &Path) -> RevitInstaller {
        RevitInstaller::new(
            Arc::new(store),
            program_data.to_path_buf(),
            RevitConfig::default(),
        )
    }

    #[test]
    fn test_display_name_year() {
        assert_eq!(display_name_year("Autodesk Revit 2022"), Some(2022));
        assert_eq!(display_name_year("Revit 2024.2 Update"), Some(2024));
        assert_eq!(display_name_year("Autodesk AutoCAD 2022"), None);
        assert_eq!(display_name_year("Autodesk Revit"), None);
    }

    #[test]
    fn test_addins_segment_and_year() {
        assert!(has_addins_segment(r"C:\ProgramData\Autodesk\Revit\Addins\2023"));
        assert!(!has_addins_segment(r"C:\Program Files\Autodesk\Revit 2023"));
        assert_eq!(path_year(r"D:\Revit\Addins\2023"), Some(2023));
        assert_eq!(path_year(r"D:\Revit\Addins"), None);
    }

    #[test]
    fn test_discover_filters_years_and_joins_roots() {
        let temp = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        store = uninstall_entry(store, "{A}", "Autodesk Revit 2019");
        store = uninstall_entry(store, "{B}", "Autodesk Revit 2022");
        store = uninstall_entry(store, "{C}", "Autodesk Revit 2024");
        store = uninstall_entry(store, "{D}", "Revit 2024 Content Libraries");
        store = uninstall_entry(store, "{E}", "Microsoft Edge");
        store = store
            .with_value(
                &KeyPath::local_machine(PRODUCT_KEY).join(r"Autodesk Revit 2022\Install"),
                "AddinsPath",
                r"D:\Custom\Revit\Addins\2022",
            )
            .with_value(
                &KeyPath::local_machine(PRODUCT_KEY).join("Autodesk Revit 2024"),
                "InstallLocation",
                r"C:\Program Files\Autodesk\Revit 2024",
            );

        let revit = installer(store, temp.path());
        let targets = revit.discover().unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].version, "2022");
        assert_eq!(
            targets[0].root,
            TargetRoot::Directory(PathBuf::from(r"D:\Custom\Revit\Addins\2022"))
        );
        assert_eq!(targets[1].version, "2024");
        assert_eq!(
            targets[1].root,
            TargetRoot::Directory(revit.convention_addins_dir(2024))
        );
    }

    #[test]
    fn test_discover_without_uninstall_section_is_empty() {
        let temp = TempDir::new().unwrap();
        let revit = installer(MemoryStore::new(), temp.path());
        assert!(revit.discover().unwrap().is_empty());
    }

    #[test]
    fn test_install_copies_top_level_files() {
        let temp = TempDir::new().unwrap();
        let install_root = temp.path().join("app");
        let source = HostFamily::Revit.plugin_source(&install_root);
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("SDPlugin.addin"), "<RevitAddIns/>").unwrap();
        fs::write(source.join("SDPlugin.dll"), "dll").unwrap();
        fs::write(source.join("nested/ignored.txt"), "x").unwrap();

        let revit = installer(MemoryStore::new(), temp.path());
        let addins = revit.convention_addins_dir(2023);
        let target = InstallTarget::new(
            HostFamily::Revit,
            TargetRoot::Directory(addins.clone()),
            "2023",
        );

        let outcome = revit.install(&target, &install_root).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(addins.join("SDPlugin.addin").is_file());
        assert!(addins.join("SDPlugin.dll").is_file());
        assert!(!addins.join("nested").exists());
    }

    #[test]
    fn test_install_without_plugin_files_fails() {
        let temp = TempDir::new().unwrap();
        let revit = installer(MemoryStore::new(), temp.path());
        let target = InstallTarget::new(
            HostFamily::Revit,
            TargetRoot::Directory(temp.path().join("addins")),
            "2023",
        );
        assert!(matches!(
            revit.install(&target, &temp.path().join("missing")),
            Err(InstallError::MissingPluginFiles(_))
        ));
    }
}
