//! 安装包解压
//!
//! 把 `PluginPayload` 的全部条目写到安装根目录下。目录条目幂等创建，
//! 文件条目先补齐父目录再覆盖写入；任何一个条目失败都会中止整个解压。

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::debug;

use super::payload::{PayloadEntry, PluginPayload};
use super::types::InstallError;

/// 解压统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// 处理的条目数（含目录）
    pub entries_processed: usize,
    /// 写入的文件数
    pub files_written: usize,
}

/// 解压器
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// 解压到 `dest`
    ///
    /// 每处理完一个条目调用一次 `on_entry(已完成, 总数)`
    pub fn extract<F>(
        payload: &PluginPayload,
        dest: &Path,
        mut on_entry: F,
    ) -> Result<ExtractSummary, InstallError>
    where
        F: FnMut(usize, usize),
    {
        fs::create_dir_all(dest).map_err(|e| extract_error(dest, e))?;

        let total = payload.len();
        let mut summary = ExtractSummary::default();

        for (i, entry) in payload.entries().iter().enumerate() {
            let outpath = dest.join(&entry.relative_path);

            if entry.is_directory {
                fs::create_dir_all(&outpath).map_err(|e| extract_error(&outpath, e))?;
            } else {
                write_file(entry, &outpath)?;
                summary.files_written += 1;
            }

            summary.entries_processed += 1;
            on_entry(i + 1, total);
        }

        debug!(
            "解压完成: {} 个条目, {} 个文件 -> {}",
            summary.entries_processed,
            summary.files_written,
            dest.display()
        );
        Ok(summary)
    }
}

fn write_file(entry: &PayloadEntry, outpath: &Path) -> Result<(), InstallError> {
    if let Some(p) = outpath.parent() {
        if !p.exists() {
            fs::create_dir_all(p).map_err(|e| extract_error(p, e))?;
        }
    }
    clear_readonly(outpath).map_err(|e| extract_error(outpath, e))?;
    let mut outfile = File::create(outpath).map_err(|e| extract_error(outpath, e))?;
    outfile
        .write_all(&entry.bytes)
        .map_err(|e| extract_error(outpath, e))?;

    // 设置文件权限 (Unix)，属主写权限始终保留
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = entry.unix_mode {
            fs::set_permissions(outpath, fs::Permissions::from_mode(mode | OWNER_WRITE))
                .map_err(|e| extract_error(outpath, e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
const OWNER_WRITE: u32 = 0o200;

/// 已存在的只读文件先去掉只读属性
fn clear_readonly(path: &Path) -> std::io::Result<()> {
    let Ok(metadata) = fs::metadata(path) else {
        return Ok(());
    };
    let mut permissions = metadata.permissions();
    if !metadata.is_file() || !permissions.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | OWNER_WRITE);
    }
    #[cfg(not(unix))]
    {
        permissions.set_readonly(false);
    }
    fs::set_permissions(path, permissions)
}

fn extract_error(path: &Path, e: std::io::Error) -> InstallError {
    InstallError::ExtractFailed(format!("{}: {}", path.display(), e))
}
