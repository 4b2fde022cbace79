//! 应用配置 / Application configuration
//!
//! 由 `ConfigManager` 读取，命令行参数在其上覆盖
//! Read from `ConfigManager`; command line flags override on top

use serde::de::DeserializeOwned;
use v::{ConfigError, ConfigManager};

use crate::modules::base::service::base_sys_user::DEFAULT_SUPER_ADMIN_ID;

/// 日志输出格式 / log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 紧凑文本（默认）/ compact text (default)
    Compact,
    /// Bunyan JSON
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// 应用配置结构体
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub debug: bool,
    /// 使用内存存储并写入初始数据 / in-memory store with seed data
    pub memory: bool,
    pub log_format: LogFormat,
    pub super_admin_id: i64,
    /// 信任网关身份头 / trust gateway identity headers
    pub trust_headers: bool,
    /// 数据库分组 / database group
    pub db_group: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: None,
            debug: false,
            memory: false,
            log_format: LogFormat::Compact,
            super_admin_id: DEFAULT_SUPER_ADMIN_ID,
            trust_headers: false,
            db_group: "default".to_string(),
        }
    }
}

/// 缺省项取默认值，类型错误则报错 / missing keys default, mistyped keys fail
fn setting<T: DeserializeOwned>(mgr: &ConfigManager, key: &str, default: T) -> Result<T, ConfigError> {
    match mgr.get_safe(key) {
        Ok(v) => Ok(v),
        Err(ConfigError::KeyNotFound { .. }) => Ok(default),
        Err(e) => Err(e),
    }
}

impl AppConfig {
    /// 从配置管理器加载
    pub fn from_manager(mgr: &ConfigManager) -> Result<Self, ConfigError> {
        let d = Self::default();
        let workers: usize = setting(mgr, "server.workers", 0)?;
        let log_format: String = setting(mgr, "logging.format", "compact".to_string())?;
        Ok(Self {
            host: setting(mgr, "server.host", d.host)?,
            port: setting(mgr, "server.port", d.port)?,
            workers: Some(workers).filter(|w| *w > 0),
            debug: setting(mgr, "server.debug", d.debug)?,
            memory: setting(mgr, "server.memory", d.memory)?,
            log_format: LogFormat::parse(&log_format),
            super_admin_id: setting(mgr, "admin.superAdminId", d.super_admin_id)?,
            trust_headers: setting(mgr, "admin.trustHeaders", d.trust_headers)?,
            db_group: setting(mgr, "admin.dbGroup", d.db_group)?,
        })
    }
}
