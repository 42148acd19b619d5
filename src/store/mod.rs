//! 系统配置存储模块
//!
//! 以注册表的形状抽象宿主程序的发现与注册所依赖的层级键值存储：
//! - `ConfigStore`: 注入式存储能力（打开、读取、写入、枚举子键）
//! - `MemoryStore`: 内存实现，用于测试和非 Windows 平台的演练
//! - `RegistryStore`: 基于 winreg 的 Windows 注册表实现

mod memory;
#[cfg(windows)]
mod registry;

pub use memory::MemoryStore;
#[cfg(windows)]
pub use registry::RegistryStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 存储根
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hive {
    /// HKEY_LOCAL_MACHINE
    LocalMachine,
    /// HKEY_CURRENT_USER
    CurrentUser,
}

impl Hive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKLM",
            Hive::CurrentUser => "HKCU",
        }
    }
}

/// 键路径，由存储根和反斜杠分隔的子路径组成
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyPath {
    pub hive: Hive,
    pub path: String,
}

impl KeyPath {
    pub fn new(hive: Hive, path: impl Into<String>) -> Self {
        let path: String = path.into();
        Self {
            hive,
            path: path.trim_matches('\\').to_string(),
        }
    }

    /// HKLM 下的路径
    pub fn local_machine(path: impl Into<String>) -> Self {
        Self::new(Hive::LocalMachine, path)
    }

    /// HKCU 下的路径
    pub fn current_user(path: impl Into<String>) -> Self {
        Self::new(Hive::CurrentUser, path)
    }

    /// 拼接子键，`child` 本身可以包含多级
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_matches('\\');
        if child.is_empty() {
            return self.clone();
        }
        if self.path.is_empty() {
            return Self::new(self.hive, child);
        }
        Self::new(self.hive, format!("{}\\{}", self.path, child))
    }

    /// 父键路径，根键返回 None
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None;
        }
        match self.path.rfind('\\') {
            Some(idx) => Some(Self::new(self.hive, &self.path[..idx])),
            None => Some(Self::new(self.hive, "")),
        }
    }

    /// 最后一级键名
    pub fn leaf(&self) -> &str {
        self.path.rsplit('\\').next().unwrap_or_default()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.hive.as_str())
        } else {
            write!(f, "{}\\{}", self.hive.as_str(), self.path)
        }
    }
}

/// 存储值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StoreValue {
    /// REG_SZ / REG_EXPAND_SZ
    String(String),
    /// REG_DWORD
    Dword(u32),
}

impl StoreValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::String(s) => Some(s),
            StoreValue::Dword(_) => None,
        }
    }

    pub fn as_dword(&self) -> Option<u32> {
        match self {
            StoreValue::Dword(v) => Some(*v),
            StoreValue::String(_) => None,
        }
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        StoreValue::String(value.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        StoreValue::String(value)
    }
}

impl From<u32> for StoreValue {
    fn from(value: u32) -> Self {
        StoreValue::Dword(value)
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::String(s) => write!(f, "\"{}\"", s),
            StoreValue::Dword(v) => write!(f, "dword:{:08x}", v),
        }
    }
}

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    /// 键不存在
    #[error("键不存在: {0}")]
    NotFound(KeyPath),

    /// 访问被拒绝
    #[error("访问被拒绝: {0}")]
    AccessDenied(KeyPath),

    /// 底层 IO 错误
    #[error("存储访问失败: {key}: {source}")]
    Io {
        key: KeyPath,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// 是否为“键不存在”，发现阶段将其视为宿主未安装
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// 系统配置存储能力
///
/// 所有宿主发现与注册都通过该 trait 访问存储，不直接触碰全局状态
pub trait ConfigStore: Send + Sync {
    /// 检查键是否存在
    fn open_path(&self, key: &KeyPath) -> Result<bool, StoreError>;

    /// 读取值，值不存在时返回 None；键不存在时返回 `StoreError::NotFound`
    fn get_value(&self, key: &KeyPath, name: &str) -> Result<Option<StoreValue>, StoreError>;

    /// 写入值，缺失的键会被逐级创建
    fn set_value(&self, key: &KeyPath, name: &str, value: StoreValue) -> Result<(), StoreError>;

    /// 枚举直接子键
    fn enumerate_subkeys(&self, key: &KeyPath) -> Result<Vec<String>, StoreError>;

    /// 枚举键下所有可识别的值
    fn enumerate_values(&self, key: &KeyPath) -> Result<Vec<(String, StoreValue)>, StoreError>;

    /// 创建键（幂等）
    fn create_path(&self, key: &KeyPath) -> Result<(), StoreError>;

    /// 枚举子键，键不存在时返回空列表
    fn subkeys_or_empty(&self, key: &KeyPath) -> Result<Vec<String>, StoreError> {
        match self.enumerate_subkeys(key) {
            Ok(keys) => Ok(keys),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// 读取字符串值，键或值不存在、类型不符时返回 None
    fn get_string(&self, key: &KeyPath, name: &str) -> Result<Option<String>, StoreError> {
        match self.get_value(key, name) {
            Ok(Some(StoreValue::String(s))) => Ok(Some(s)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_path_join_and_parent() {
        let base = KeyPath::current_user(r"Software\Autodesk\AutoCAD");
        let child = base.join(r"R24.0\ACAD-4101:804");
        assert_eq!(child.path, r"Software\Autodesk\AutoCAD\R24.0\ACAD-4101:804");
        assert_eq!(child.leaf(), "ACAD-4101:804");
        assert_eq!(child.parent().unwrap().leaf(), "R24.0");
        assert_eq!(base.join(""), base);
    }

    #[test]
    fn test_key_path_display() {
        let key = KeyPath::local_machine(r"\SOFTWARE\McNeel\");
        assert_eq!(key.to_string(), r"HKLM\SOFTWARE\McNeel");
        assert_eq!(KeyPath::current_user("").to_string(), "HKCU");
    }

    #[test]
    fn test_store_value_accessors() {
        let s = StoreValue::from("loader");
        assert_eq!(s.as_str(), Some("loader"));
        assert_eq!(s.as_dword(), None);
        let d = StoreValue::from(14u32);
        assert_eq!(d.as_dword(), Some(14));
        assert_eq!(d.to_string(), "dword:0000000e");
    }
}
