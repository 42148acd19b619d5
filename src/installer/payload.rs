//! 安装包资源
//!
//! `PayloadStore` 只负责提供原始字节；`PluginPayload` 是一次运行中解码出的不可变条目序列。

use std::borrow::Cow;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use super::types::InstallError;

/// 嵌入资源名
pub const PAYLOAD_RESOURCE: &str = "app";

/// 构建脚本放入 OUT_DIR 的安装包
static EMBEDDED_APP: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/app.zip"));

/// 安装包来源
pub trait PayloadStore: Send + Sync {
    /// 资源名，用于日志
    fn name(&self) -> &str;

    /// 读取整个 ZIP 包
    fn load(&self) -> Result<Cow<'_, [u8]>, InstallError>;
}

/// 编译期嵌入的安装包
pub struct EmbeddedPayload {
    name: &'static str,
    bytes: &'static [u8],
}

impl EmbeddedPayload {
    /// 名为 `app` 的内置资源
    pub fn app() -> Self {
        Self::from_static(PAYLOAD_RESOURCE, EMBEDDED_APP)
    }

    pub fn from_static(name: &'static str, bytes: &'static [u8]) -> Self {
        Self { name, bytes }
    }
}

impl PayloadStore for EmbeddedPayload {
    fn name(&self) -> &str {
        self.name
    }

    fn load(&self) -> Result<Cow<'_, [u8]>, InstallError> {
        Ok(Cow::Borrowed(self.bytes))
    }
}

/// 磁盘上的安装包
pub struct FilePayload {
    path: PathBuf,
    name: String,
}

impl FilePayload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.to_string_lossy().to_string();
        Self { path, name }
    }
}

impl PayloadStore for FilePayload {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Cow<'_, [u8]>, InstallError> {
        std::fs::read(&self.path).map(Cow::Owned).map_err(|e| {
            InstallError::PayloadUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// 内存中的安装包，主要用于测试
pub struct BytesPayload {
    bytes: Vec<u8>,
}

impl BytesPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl PayloadStore for BytesPayload {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<Cow<'_, [u8]>, InstallError> {
        Ok(Cow::Borrowed(&self.bytes))
    }
}

/// 安装包条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    /// 相对安装根目录的路径
    pub relative_path: PathBuf,
    pub is_directory: bool,
    /// 目录条目为空
    pub bytes: Vec<u8>,
    pub unix_mode: Option<u32>,
}

/// 解码后的安装包，条目顺序与 ZIP 中一致
#[derive(Debug, Clone, Default)]
pub struct PluginPayload {
    entries: Vec<PayloadEntry>,
}

impl PluginPayload {
    /// 解码 ZIP 包
    ///
    /// 跳过 macOS 元数据；路径逃逸出目标目录的条目使整个包无效。
    /// 非 UTF-8 的条目名按 GBK 解码
    pub fn from_archive(bytes: &[u8]) -> Result<Self, InstallError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| InstallError::InvalidPackage(format!("无法读取 ZIP 文件: {}", e)))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| {
                InstallError::InvalidPackage(format!("无法读取 ZIP 条目 {}: {}", i, e))
            })?;

            let name = decode_entry_name(file.name_raw());
            if name.contains("__MACOSX") {
                continue;
            }
            let relative_path = enclosed_path(&name)
                .ok_or_else(|| InstallError::InvalidPackage(format!("不安全的条目路径: {}", name)))?;

            let is_directory = name.ends_with('/') || name.ends_with('\\');
            let unix_mode = file.unix_mode();
            let mut bytes = Vec::new();
            if !is_directory {
                file.read_to_end(&mut bytes)
                    .map_err(|e| InstallError::ExtractFailed(format!("{}: {}", name, e)))?;
            }

            entries.push(PayloadEntry {
                relative_path,
                is_directory,
                bytes,
                unix_mode,
            });
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<PayloadEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_directory).count()
    }
}

/// UTF-8 条目名原样使用，其余按 GBK 解码
fn decode_entry_name(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => {
            let (name, _, _) = encoding_rs::GBK.decode(raw);
            name.into_owned()
        }
    }
}

/// 与 `ZipFile::enclosed_name` 相同的规则：不含 NUL，不是绝对路径，不跳出根目录
fn enclosed_path(name: &str) -> Option<PathBuf> {
    if name.contains('\0') {
        return None;
    }
    let path = Path::new(name);
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return None,
            Component::ParentDir => depth = depth.checked_sub(1)?,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
        }
    }
    Some(path.to_path_buf())
}
