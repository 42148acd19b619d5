//! 安装器配置
//!
//! 所有字段都有默认值，可以用 YAML 文件覆盖其中一部分。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::installer::InstallError;

/// Revit 发现配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RevitConfig {
    /// 只接受不早于该年份的 Revit
    pub min_year: u32,
}

impl Default for RevitConfig {
    fn default() -> Self {
        Self { min_year: 2020 }
    }
}

/// AutoCAD 注册配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CadConfig {
    /// Applications 下的应用键名
    pub app_key: String,
    /// `plugins/Cad/<版本前缀>/` 下的加载文件名
    pub loader_file: String,
    /// LOADCTRLS 标志，14 = 启动时加载 + 命令调用时加载
    pub load_ctrls: u32,
    /// DESCRIPTION 值
    pub description: String,
    /// 两个注册命令
    pub commands: Vec<String>,
}

impl Default for CadConfig {
    fn default() -> Self {
        Self {
            app_key: "SDPlugin".to_string(),
            loader_file: "GDAD_YJZH.arx".to_string(),
            load_ctrls: 14,
            description: "SDPlugin for AutoCAD".to_string(),
            commands: vec!["GDAD_YJZH".to_string(), "GDAD_YJZHSET".to_string()],
        }
    }
}

/// Rhino 注册配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RhinoConfig {
    /// Plug-ins 下的插件 GUID 键名
    pub plugin_guid: String,
    pub plugin_name: String,
    /// `plugins/Rhino/<版本首字符>/` 下的插件文件名
    pub plugin_file: String,
    /// 三个命令列表项
    pub commands: Vec<String>,
}

impl Default for RhinoConfig {
    fn default() -> Self {
        Self {
            plugin_guid: "{6E2B8F4C-3A1D-4B7E-9C5F-2D8A1E7B4C90}".to_string(),
            plugin_name: "SDPluginForRhino".to_string(),
            plugin_file: "SDPluginForRhino.rhp".to_string(),
            commands: vec![
                "SDPlugin".to_string(),
                "SDPluginSettings".to_string(),
                "SDPluginExport".to_string(),
            ],
        }
    }
}

/// SketchUp 约定配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SketchupConfig {
    /// 合成目录的起始年份，终止年份为当前年份 + 1
    pub first_year: i32,
}

impl Default for SketchupConfig {
    fn default() -> Self {
        Self { first_year: 2015 }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 是否写日志文件
    pub enabled: bool,
    /// 默认日志级别（可被 RUST_LOG 覆盖）
    pub level: String,
    pub retention_days: u32,
    /// 单个日志文件的最大字节数，超过后轮转
    pub max_file_size: u64,
    /// 日志目录，默认 ~/.cinstaller/logs
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            retention_days: 7,
            max_file_size: 10 * 1024 * 1024,
            dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".cinstaller")
                .join("logs")
        })
    }
}

/// 安装器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstallerConfig {
    /// 应用名，决定默认安装目录、图片目录和环境变量名
    pub app_name: String,
    /// 安装完成后可启动的程序，相对安装根目录
    pub startup_app: String,
    /// 安装目录，None 时使用 <本地应用数据>/<app_name>
    pub install_dir: Option<PathBuf>,
    pub revit: RevitConfig,
    pub cad: CadConfig,
    pub rhino: RhinoConfig,
    pub sketchup: SketchupConfig,
    pub logging: LoggingConfig,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            app_name: "SDPlugin".to_string(),
            startup_app: "SDPlugin.exe".to_string(),
            install_dir: None,
            revit: RevitConfig::default(),
            cad: CadConfig::default(),
            rhino: RhinoConfig::default(),
            sketchup: SketchupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl InstallerConfig {
    /// 从 YAML 文件加载并校验
    pub fn load(path: &Path) -> Result<Self, InstallError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, InstallError> {
        let config: InstallerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InstallError> {
        if self.app_name.trim().is_empty() {
            return Err(InstallError::InvalidConfig("app_name 不能为空".to_string()));
        }
        if self.cad.commands.len() != 2 {
            return Err(InstallError::InvalidConfig(format!(
                "cad.commands 需要 2 个命令, 实际 {}",
                self.cad.commands.len()
            )));
        }
        if self.rhino.commands.len() != 3 {
            return Err(InstallError::InvalidConfig(format!(
                "rhino.commands 需要 3 个命令, 实际 {}",
                self.rhino.commands.len()
            )));
        }
        if self.rhino.plugin_guid.trim().is_empty() {
            return Err(InstallError::InvalidConfig(
                "rhino.plugin_guid 不能为空".to_string(),
            ));
        }
        Ok(())
    }

    /// 环境变量名前缀：应用名大写，非字母数字替换为下划线
    fn env_prefix(&self) -> String {
        self.app_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// 指向安装根目录的环境变量名
    pub fn home_env_var(&self) -> String {
        format!("{}_HOME", self.env_prefix())
    }

    /// 指向图片输出目录的环境变量名
    pub fn image_env_var(&self) -> String {
        format!("{}_IMAGE_DIR", self.env_prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(InstallerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
app_name: "My Tool"
cad:
  load_ctrls: 2
logging:
  enabled: false
"#;
        let config = InstallerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.app_name, "My Tool");
        assert_eq!(config.cad.load_ctrls, 2);
        assert_eq!(config.cad.loader_file, "GDAD_YJZH.arx");
        assert!(!config.logging.enabled);
        assert_eq!(config.sketchup.first_year, 2015);
        assert_eq!(config.home_env_var(), "MY_TOOL_HOME");
        assert_eq!(config.image_env_var(), "MY_TOOL_IMAGE_DIR");
    }

    #[test]
    fn test_wrong_command_count_rejected() {
        let yaml = "rhino:\n  commands: [\"A\"]\n";
        match InstallerConfig::from_yaml(yaml) {
            Err(InstallError::InvalidConfig(msg)) => assert!(msg.contains("rhino.commands")),
            other => panic!("期望 InvalidConfig 错误，实际: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(matches!(
            InstallerConfig::from_yaml("app_name: [unclosed"),
            Err(InstallError::YamlError(_))
        ));
    }
}
