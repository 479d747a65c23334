//! 日志初始化.
//!
//! 库 crate 通过 `log` 门面输出, 这里安装 `tracing-subscriber` 注册表
//! (`log` 记录经 tracing-log 桥接进入同一套输出):
//!
//! - 控制台: 彩色级别, 带源码位置
//! - 文件: `<directory>/<file_prefix>.<YYYY-MM-DD>.log`, 非阻塞写入
//! - 后台维护线程: 零点翻滚, 压缩历史日志, 删除过期日志

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod task;

/// 日志配置, 缺省字段取 [`LoggingConfig::default`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 文件日志级别 (EnvFilter 语法)
    pub level: String,
    /// 控制台日志级别
    pub console_level: String,
    pub directory: String,
    pub file_prefix: String,
    /// 历史日志保留天数
    pub retention_days: i64,
    /// 是否把前一天及更早的日志压缩为 `.gz`
    pub compress_history: bool,
    pub cleanup_interval_seconds: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_level: "debug".to_string(),
            directory: "logs".to_string(),
            file_prefix: "aacfeed".to_string(),
            retention_days: 30,
            compress_history: true,
            cleanup_interval_seconds: 3600,
        }
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 安装全局日志订阅器并启动维护线程
///
/// 全局订阅器只能安装一次, 重复调用返回错误.
pub fn init(config: LoggingConfig) -> Result<()> {
    let console_filter = EnvFilter::try_new(&config.console_level)
        .with_context(|| format!("无效的控制台日志级别: {}", config.console_level))?;
    let file_filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("无效的文件日志级别: {}", config.level))?;

    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败, path={}", config.directory))?;

    let rotate_requested = Arc::new(AtomicBool::new(false));
    let daily_file = DailyLogFile::open(
        Path::new(&config.directory),
        &config.file_prefix,
        Arc::clone(&rotate_requested),
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(daily_file);
    LOG_GUARD.set(guard).ok();

    let console_layer = fmt::Layer::default()
        .with_writer(io::stdout)
        .event_format(LineFormat::Console)
        .with_filter(console_filter);
    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(LineFormat::File)
        .with_filter(file_filter);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("安装全局日志订阅器失败")?;

    task::spawn_log_maintenance_thread(config, rotate_requested)
        .context("启动日志维护线程失败")?;
    Ok(())
}

/// 当天的日志文件
///
/// 维护线程在零点置位 `rotate_requested`, 下一次写入时重新打开当天文件.
struct DailyLogFile {
    directory: PathBuf,
    prefix: String,
    rotate_requested: Arc<AtomicBool>,
    file: File,
}

impl DailyLogFile {
    fn open(directory: &Path, prefix: &str, rotate_requested: Arc<AtomicBool>) -> Result<Self> {
        let file = open_for_day(directory, prefix, Local::now().date_naive())?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            rotate_requested,
            file,
        })
    }
}

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.rotate_requested.swap(false, Ordering::AcqRel) {
            self.file = open_for_day(&self.directory, &self.prefix, Local::now().date_naive())
                .map_err(io::Error::other)?;
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_for_day(directory: &Path, prefix: &str, date: NaiveDate) -> Result<File> {
    let path = build_current_log_path(directory, prefix, date);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

/// 单行日志格式
///
/// ```text
/// 控制台: [02-06 13:04:05.120] INFO  src/driver.rs:152 > 开始解码 ...
/// 文件:   [2026-02-06 13:04:05.120] INFO  aacfeed::driver > 开始解码 ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineFormat {
    Console,
    File,
}

impl LineFormat {
    fn level_color(level: &tracing::Level) -> &'static str {
        match *level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let level = meta.level().to_string();
        match self {
            LineFormat::Console => {
                let stamp = Local::now().format("%m-%d %H:%M:%S%.3f");
                let (color, reset) = if writer.has_ansi_escapes() {
                    (Self::level_color(meta.level()), "\x1b[0m")
                } else {
                    ("", "")
                };
                write!(
                    writer,
                    "[{stamp}] {color}{level:5}{reset} {}:{} > ",
                    meta.file().unwrap_or("unknown"),
                    meta.line().unwrap_or(0)
                )?;
            }
            LineFormat::File => {
                let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                write!(writer, "[{stamp}] {level:5} {} > ", meta.target())?;
            }
        }
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CaptureBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(format: LineFormat, emit: impl FnOnce()) -> String {
        let buffer = CaptureBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(format)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        buffer.text()
    }

    #[test]
    fn test_build_current_log_path() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 6).unwrap();
        let path = build_current_log_path(Path::new("logs"), "aacfeed", date);
        assert_eq!(path, PathBuf::from("logs/aacfeed.2026-02-06.log"));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"level": "debug", "directory": "/tmp/x"}"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.directory, "/tmp/x");
        assert_eq!(config.file_prefix, "aacfeed");
        assert_eq!(config.retention_days, 30);
        assert!(config.compress_history);
    }

    #[test]
    fn test_file_line_has_date_level_and_target() {
        let text = capture(LineFormat::File, || {
            tracing::warn!(target: "aacfeed::driver", "缓冲区已满");
        });
        let year = Local::now().format("%Y").to_string();
        assert!(text.starts_with(&format!("[{year}-")), "{text}");
        assert!(text.contains("WARN  aacfeed::driver > 缓冲区已满"), "{text}");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_console_line_without_ansi_has_location() {
        let text = capture(LineFormat::Console, || {
            tracing::info!("开始解码");
        });
        assert!(!text.contains('\x1b'), "{text}");
        assert!(text.contains("INFO  "), "{text}");
        assert!(text.contains("src/logging/mod.rs:"), "{text}");
        assert!(text.contains("> 开始解码"), "{text}");
    }

    #[test]
    fn test_daily_file_reopens_after_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let rotate = Arc::new(AtomicBool::new(false));
        let mut file = DailyLogFile::open(dir.path(), "feed", Arc::clone(&rotate)).unwrap();
        let path = build_current_log_path(dir.path(), "feed", Local::now().date_naive());

        file.write_all(b"first\n").unwrap();
        let moved = dir.path().join("moved.log");
        std::fs::rename(&path, &moved).unwrap();

        rotate.store(true, Ordering::Release);
        file.write_all(b"second\n").unwrap();
        file.flush().unwrap();

        assert!(!rotate.load(Ordering::Acquire));
        assert_eq!(std::fs::read_to_string(&moved).unwrap(), "first\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }
}
