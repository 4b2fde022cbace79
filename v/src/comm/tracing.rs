use anyhow::Result;
use chrono::{Datelike, Timelike};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

struct LogTimer;

impl fmt::time::FormatTime for LogTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        let cs = now.timestamp_subsec_millis() / 10;
        let s = format!(
            "{:04}-{:02}-{:02}:{:02}:{:02}:{:02}:{:02}",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            cs
        );
        w.write_str(&s)
    }
}

/// 日志过滤表达式：`logging.level`，默认 `info`；`RUST_LOG` 优先
/// Filter directive from `logging.level` (default `info`); `RUST_LOG` wins
pub fn log_filter() -> EnvFilter {
    let level: String = crate::comm::config::get_global_config_manager()
        .ok()
        .and_then(|mgr| mgr.get("logging.level").ok())
        .unwrap_or_else(|| "info".to_string());

    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},sqlx=warn", level)))
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"))
}

/// 安装全局 fmt 订阅者，并把 `log` 记录桥接到 tracing
/// Install the global fmt subscriber and bridge `log` records into tracing
pub fn init_tracing() -> Result<()> {
    let subscriber = fmt::SubscriberBuilder::default()
        .with_env_filter(log_filter())
        .with_timer(LogTimer)
        .compact()
        .with_target(false)
        .finish();
    LogTracer::init().ok();
    ::tracing::subscriber::set_global_default(subscriber).ok();
    Ok(())
}
