//! SketchUp 安装器
//!
//! 不查询任何安装记录：对 `first_year ..= 当前年份 + 1` 的每一年按约定合成
//! `<漫游应用数据>/SketchUp/SketchUp <年份>/SketchUp/Plugins`，不存在就创建。
//! 因此未安装的年份也会被“安装”，这是有意保留的行为。

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{copy_dir_recursive, HostFamily, HostInstaller, InstallTarget, TargetRoot};
use crate::config::SketchupConfig;
use crate::installer::{InstallError, InstallOutcome};

pub struct SketchupInstaller {
    roaming_app_data: PathBuf,
    current_year: i32,
    config: SketchupConfig,
}

impl SketchupInstaller {
    pub fn new(roaming_app_data: PathBuf, current_year: i32, config: SketchupConfig) -> Self {
        Self {
            roaming_app_data,
            current_year,
            config,
        }
    }

    pub fn plugins_dir(&self, year: i32) -> PathBuf {
        self.roaming_app_data
            .join("SketchUp")
            .join(format!("SketchUp {}", year))
            .join("SketchUp")
            .join("Plugins")
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.config.first_year..=self.current_year + 1
    }
}

impl HostInstaller for SketchupInstaller {
    fn family(&self) -> HostFamily {
        HostFamily::Sketchup
    }

    fn discover(&self) -> Result<Vec<InstallTarget>, InstallError> {
        let mut targets = Vec::new();
        for year in self.years() {
            let dir = self.plugins_dir(year);
            fs::create_dir_all(&dir)?;
            debug!("SketchUp {}: {}", year, dir.display());
            targets.push(InstallTarget::new(
                HostFamily::Sketchup,
                TargetRoot::Directory(dir),
                year.to_string(),
            ));
        }
        Ok(targets)
    }

    fn install(
        &self,
        target: &InstallTarget,
        install_root: &Path,
    ) -> Result<InstallOutcome, InstallError> {
        let plugins_dir = target.directory()?;
        let source = HostFamily::Sketchup.plugin_source(install_root);
        if !source.is_dir() {
            return Err(InstallError::MissingPluginFiles(source));
        }

        let copied = copy_dir_recursive(&source, plugins_dir)?;
        info!("SketchUp {}: 已复制 {} 个文件", target.version, copied);
        Ok(InstallOutcome::success(
            target,
            format!("{} 个文件 -> {}", copied, plugins_dir.display()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_synthesizes_year_range() {
        let temp = TempDir::new().unwrap();
        let sketchup =
            SketchupInstaller::new(temp.path().to_path_buf(), 2025, SketchupConfig::default());

        let targets = sketchup.discover().unwrap();

        assert_eq!(targets.len(), 12);
        assert_eq!(targets.first().unwrap().version, "2015");
        assert_eq!(targets.last().unwrap().version, "2026");
        for target in &targets {
            assert!(target.directory().unwrap().is_dir());
        }
        assert!(temp
            .path()
            .join("SketchUp/SketchUp 2020/SketchUp/Plugins")
            .is_dir());
    }

    #[test]
    fn test_empty_range_yields_no_targets() {
        let temp = TempDir::new().unwrap();
        let sketchup = SketchupInstaller::new(
            temp.path().to_path_buf(),
            2025,
            SketchupConfig { first_year: 2030 },
        );
        assert!(sketchup.discover().unwrap().is_empty());
    }

    #[test]
    fn test_install_copies_whole_subtree() {
        let temp = TempDir::new().unwrap();
        let install_root = temp.path().join("app");
        let source = HostFamily::Sketchup.plugin_source(&install_root);
        fs::create_dir_all(source.join("sd_plugin/icons")).unwrap();
        fs::write(source.join("sd_plugin.rb"), "loader").unwrap();
        fs::write(source.join("sd_plugin/icons/main.png"), "png").unwrap();

        let sketchup = SketchupInstaller::new(
            temp.path().join("roaming"),
            2025,
            SketchupConfig::default(),
        );
        let targets = sketchup.discover().unwrap();
        assert_eq!(targets.len(), 12);

        for target in &targets {
            sketchup.install(target, &install_root).unwrap();
        }
        for target in &targets {
            let dir = target.directory().unwrap();
            assert!(dir.join("sd_plugin.rb").is_file(), "{}", target.version);
            assert!(dir.join("sd_plugin/icons/main.png").is_file(), "{}", target.version);
        }
    }
}
