//! 日志管理模块
//!
//! 初始化 tracing 订阅器：可选的控制台输出，加上写入
//! `~/.cinstaller/logs/cinstaller.log` 的文件输出。文件超过上限时按时间戳轮转，
//! 超过保留天数的轮转文件在启动和轮转时删除。写入文件前对消息脱敏。

use chrono::{Duration, Local, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::installer::InstallError;

/// 日志文件名
pub const LOG_FILE_NAME: &str = "cinstaller.log";

/// 初始化全局日志，返回日志文件路径（未启用文件日志时为 None）
pub fn init(config: &LoggingConfig, console: bool) -> Result<Option<PathBuf>, InstallError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| InstallError::InvalidConfig(format!("日志级别 {}: {}", config.level, e)))?;

    let file = if config.enabled {
        Some(LogFile::open(config)?)
    } else {
        None
    };
    let path = file.as_ref().map(|f| f.path().to_path_buf());

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
    });
    let file_layer = file.map(|f| fmt::layer().with_ansi(false).with_writer(f));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| InstallError::Environment(format!("日志初始化失败: {}", e)))?;

    Ok(path)
}

#[derive(Debug)]
struct LogFileState {
    path: PathBuf,
    max_file_size: u64,
    retention_days: u32,
}

/// 按大小轮转的日志文件
///
/// 每次写入都重新以追加方式打开，轮转后无需重新初始化
#[derive(Debug, Clone)]
pub struct LogFile {
    state: Arc<Mutex<LogFileState>>,
}

impl LogFile {
    pub fn open(config: &LoggingConfig) -> Result<Self, InstallError> {
        let dir = config.log_dir();
        fs::create_dir_all(&dir)?;

        let state = LogFileState {
            path: dir.join(LOG_FILE_NAME),
            max_file_size: config.max_file_size,
            retention_days: config.retention_days,
        };
        rotate_log_file_if_needed(&state);
        prune_old_logs(&state);

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.state.lock().path.clone()
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let state = self.state.lock();
        rotate_log_file_if_needed(&state);

        let sanitized = sanitize_log_message(&String::from_utf8_lossy(buf));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&state.path)?;
        file.write_all(sanitized.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn rotate_log_file_if_needed(state: &LogFileState) {
    let Ok(metadata) = fs::metadata(&state.path) else {
        return;
    };

    if metadata.len() <= state.max_file_size {
        return;
    }

    let suffix = Local::now().format("%Y%m%d-%H%M%S");
    let rotated = state.path.with_file_name(format!(
        "{}.{}",
        state.path.file_name().unwrap_or_default().to_string_lossy(),
        suffix
    ));

    let _ = fs::rename(&state.path, &rotated);
    prune_old_logs(state);
}

fn prune_old_logs(state: &LogFileState) {
    let Some(dir) = state.path.parent() else {
        return;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let cutoff = Utc::now() - Duration::days(state.retention_days as i64);
    let prefix = rotated_prefix(&state.path);

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !file_name.starts_with(&prefix) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let modified = chrono::DateTime::<Utc>::from(modified);
        if modified < cutoff {
            let _ = fs::remove_file(entry.path());
        }
    }
}

fn rotated_prefix(path: &Path) -> String {
    format!(
        "{}.",
        path.file_name().unwrap_or_default().to_string_lossy()
    )
}

static SENSITIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Bearer\s+[A-Za-z0-9._-]+", "Bearer ***"),
        (
            r#"(?i)license[_-]?key["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "license_key: ***",
        ),
        (r#"token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#, "token: ***"),
        (r#"password["']?\s*[:=]\s*["']?[^\s"',}]+"#, "password: ***"),
        (
            r#"secret["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "secret: ***",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// 日志脱敏
pub fn sanitize_log_message(message: &str) -> String {
    let mut sanitized = message.to_string();
    for (re, replacement) in SENSITIVE_PATTERNS.iter() {
        sanitized = re.replace_all(&sanitized, *replacement).to_string();
    }
    sanitized
}
