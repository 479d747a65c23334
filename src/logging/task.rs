use super::{LoggingConfig, build_current_log_path};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::error;

pub(super) fn spawn_log_maintenance_thread(
    config: LoggingConfig,
    rotate_requested: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("aacfeed-log-maintenance".to_string())
        .spawn(move || run_log_maintenance(config, rotate_requested))
}

fn run_log_maintenance(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) {
    if let Err(err) = ensure_current_log_file(&config) {
        error!("初始化当前日志文件失败: {}", err);
    }
    if let Err(err) = cleanup_logs(&config) {
        error!("启动时清理日志失败: {}", err);
    }

    let cleanup_every = Duration::from_secs(config.cleanup_interval_seconds.max(1));
    let mut next_cleanup_at = Instant::now() + cleanup_every;
    let mut next_rollover_at = next_rollover_or_retry(Local::now());

    loop {
        let wake_at = next_cleanup_at.min(next_rollover_at);
        let now = Instant::now();
        if wake_at > now {
            thread::sleep(wake_at - now);
        }

        let now = Instant::now();
        if now >= next_rollover_at {
            if let Err(err) = rotate_current_log(&config) {
                error!("日志翻滚失败: {}", err);
            } else {
                rotate_requested.store(true, Ordering::Release);
            }
            if let Err(err) = cleanup_logs(&config) {
                error!("翻滚后清理日志失败: {}", err);
            }
            next_rollover_at = next_rollover_or_retry(Local::now());
        }
        if now >= next_cleanup_at {
            if let Err(err) = cleanup_logs(&config) {
                error!("清理日志失败: {}", err);
            }
            next_cleanup_at = now + cleanup_every;
        }
    }
}

fn next_rollover_or_retry(now: DateTime<Local>) -> Instant {
    match compute_next_rollover(now) {
        Ok(at) => at,
        Err(err) => {
            error!("计算下一次翻滚时间失败: {}", err);
            Instant::now() + Duration::from_secs(1)
        }
    }
}

fn ensure_current_log_file(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    fs::create_dir_all(directory)?;
    let today = Local::now().date_naive();
    let current_path = build_current_log_path(directory, &config.file_prefix, today);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&current_path)
        .with_context(|| format!("创建当前日志文件失败, path={}", current_path.display()))?;
    Ok(())
}

/// 新的一天开始时创建当日日志文件, 写入端随后切换过去
fn rotate_current_log(config: &LoggingConfig) -> Result<()> {
    ensure_current_log_file(config).context("创建当前日期日志文件失败")
}

fn cleanup_logs(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(());
    }

    let today = Local::now().date_naive();
    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let file_path = entry.path();

        let Some((date, compressed)) = parse_rotated_log_name(&file_name, &config.file_prefix)
        else {
            continue;
        };

        if date < cutoff {
            let _ = fs::remove_file(&file_path);
            continue;
        }

        if config.compress_history && !compressed && date < today {
            if let Err(err) = compress_to_gz(&file_path) {
                error!("压缩历史日志失败: {}", err);
            }
        }
    }

    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());

    let mut buf = [0u8; 8 * 1024];
    loop {
        let read = input.read(&mut buf)?;
        if read == 0 {
            break;
        }
        encoder.write_all(&buf[..read])?;
    }

    encoder.finish()?;
    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let with_prefix = file_name.strip_prefix(prefix)?;
    let with_dot = with_prefix.strip_prefix('.')?;

    if let Some(date_part) = with_dot.strip_suffix(".log") {
        let date = parse_date(date_part)?;
        return Some((date, false));
    }

    if let Some(date_part) = with_dot.strip_suffix(".log.gz") {
        let date = parse_date(date_part)?;
        return Some((date, true));
    }

    None
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn compute_next_rollover(now: DateTime<Local>) -> Result<Instant> {
    let next_date = now.date_naive() + ChronoDuration::days(1);
    let next_midnight = next_date
        .and_hms_opt(0, 0, 0)
        .context("计算下一次日志翻滚时间失败")?;
    let next_local = Local
        .from_local_datetime(&next_midnight)
        .earliest()
        .context("转换本地时间失败")?;
    let system_time = SystemTime::from(next_local.with_timezone(&Utc));
    let duration = system_time
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::from_secs(0));
    Ok(Instant::now() + duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> LoggingConfig {
        LoggingConfig {
            level: "info".to_string(),
            directory: dir.path().to_string_lossy().to_string(),
            file_prefix: "aacfeed".to_string(),
            retention_days: 30,
            compress_history: true,
            cleanup_interval_seconds: 60,
            ..Default::default()
        }
    }

    fn dated_log(config: &LoggingConfig, days_ago: i64) -> PathBuf {
        let date = Local::now().date_naive() - ChronoDuration::days(days_ago);
        build_current_log_path(Path::new(&config.directory), &config.file_prefix, date)
    }

    #[test]
    fn test_parse_rotated_log_name() {
        let prefix = "aacfeed";

        let parsed = parse_rotated_log_name("aacfeed.2026-02-06.log", prefix);
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2026, 2, 6).map(|d| (d, false))
        );

        let parsed = parse_rotated_log_name("aacfeed.2026-02-06.log.gz", prefix);
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2026, 2, 6).map(|d| (d, true))
        );

        assert!(parse_rotated_log_name("aacfeed.log", prefix).is_none());
        assert!(parse_rotated_log_name("other.2026-02-06.log", prefix).is_none());
    }

    #[test]
    fn test_rotate_current_log_creates_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        rotate_current_log(&config).unwrap();

        let current_path = dated_log(&config, 0);
        assert!(current_path.exists(), "当前日志文件不存在");
        assert_eq!(current_path.metadata().unwrap().len(), 0);
    }

    #[test]
    fn test_cleanup_compresses_and_expires() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let yesterday = dated_log(&config, 1);
        fs::write(&yesterday, "昨天的日志\n").unwrap();
        let expired = dated_log(&config, 45);
        fs::write(&expired, "过期日志\n").unwrap();
        let today = dated_log(&config, 0);
        fs::write(&today, "今天的日志\n").unwrap();

        cleanup_logs(&config).unwrap();

        assert!(!expired.exists(), "过期日志应被删除");
        assert!(today.exists(), "当天日志不应被压缩");
        assert!(!yesterday.exists(), "历史日志应被压缩");

        let gz_path = PathBuf::from(format!("{}.gz", yesterday.display()));
        let mut text = String::new();
        GzDecoder::new(File::open(&gz_path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "昨天的日志\n");
    }

    #[test]
    fn test_next_rollover_within_a_day() {
        let at = compute_next_rollover(Local::now()).unwrap();
        let wait = at.saturating_duration_since(Instant::now());
        assert!(wait <= Duration::from_secs(25 * 3600));
    }
}
