use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref GLOBAL_CONFIG_MANAGER: RwLock<Option<Arc<ConfigManager>>> = RwLock::new(None);
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置项 '{key}' 不存在")]
    KeyNotFound { key: String },
    #[error("配置项 '{key}' 类型转换失败: {message}")]
    TypeConversionError { key: String, message: String },
    #[error("配置初始化失败: {message}")]
    InitializationError { message: String },
}

/// 配置数据源信息
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub source_type: String,
    pub description: String,
    pub loaded: bool,
}

/// 配置管理器
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 创建配置管理器（默认配置源）
    pub fn new() -> Result<Self> {
        Self::with_sources(vec![])
    }

    /// 使用额外的配置源创建配置管理器
    ///
    /// 优先级（后添加者优先生效）/ precedence, later wins:
    /// `config/development.toml` -> `config/default.toml` -> `config/production.toml`
    /// -> 环境变量 `V_*` -> `extra`
    pub fn with_sources(extra: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::new();

        let default_sources = vec![
            ConfigSource::File {
                path: "config/development.toml".to_string(),
                required: false,
            },
            ConfigSource::File {
                path: "config/default.toml".to_string(),
                required: false,
            },
            ConfigSource::File {
                path: "config/production.toml".to_string(),
                required: false,
            },
            ConfigSource::Env {
                prefix: "V".to_string(),
                separator: "_",
            },
        ];

        for source in default_sources.into_iter().chain(extra) {
            let mut info = source.source_info();
            if let ConfigSource::File { path, required } = &source {
                let exists = std::path::Path::new(path).exists();
                if !exists && *required {
                    return Err(anyhow!("必需的配置文件不存在: {}", path));
                }
                if !exists {
                    // 可选文件不存在，记录但不添加
                    sources_info.push(info);
                    continue;
                }
            }
            builder = source.add_to_builder(builder)?;
            info.loaded = true;
            sources_info.push(info);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("构建配置失败: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 获取指定 key 的配置值
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败: {}", key, e))
    }

    /// 获取指定 key 的配置值，如果不存在返回默认值
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 安全获取配置值，返回详细错误信息
    pub fn get_safe<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, ConfigError> {
        self.config.get(key).map_err(|e| {
            if e.to_string().contains("not found") {
                ConfigError::KeyNotFound {
                    key: key.to_string(),
                }
            } else {
                ConfigError::TypeConversionError {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// 记录配置源加载情况 / Log which sources were loaded
    pub fn log_sources(&self) {
        for info in &self.sources_info {
            tracing::info!(
                source = %info.source_type,
                loaded = info.loaded,
                "{}",
                info.description
            );
        }
    }
}

/// 配置源类型
pub enum ConfigSource {
    /// 文件配置源（TOML）
    File { path: String, required: bool },
    /// 环境变量配置源
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 内存配置源（HashMap）
    Memory(HashMap<String, serde_json::Value>),
    /// 字符串配置源
    String { content: String, format: FileFormat },
}

impl ConfigSource {
    fn source_info(&self) -> ConfigSourceInfo {
        let (source_type, description) = match self {
            ConfigSource::File { path, required } => (
                "File",
                format!("文件配置源: {} (必需: {})", path, required),
            ),
            ConfigSource::Env { prefix, separator } => (
                "Environment",
                format!("环境变量配置源: 前缀={}, 分隔符={}", prefix, separator),
            ),
            ConfigSource::Memory(map) => ("Memory", format!("内存配置源: {} 个配置项", map.len())),
            ConfigSource::String { .. } => ("String", "字符串配置源".to_string()),
        };
        ConfigSourceInfo {
            source_type: source_type.to_string(),
            description,
            loaded: false,
        }
    }

    fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File { path, required } => Ok(builder.add_source(
                File::with_name(&path)
                    .format(FileFormat::Toml)
                    .required(required),
            )),
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .ignore_empty(true),
            )),
            ConfigSource::Memory(map) => {
                let mut builder = builder;
                for (key, value) in map {
                    builder = builder
                        .set_override(key.as_str(), json_to_config_value(value))
                        .map_err(|e| anyhow!("写入内存配置 '{}' 失败: {}", key, e))?;
                }
                Ok(builder)
            }
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}

fn json_to_config_value(value: serde_json::Value) -> config::Value {
    match value {
        serde_json::Value::Bool(b) => config::Value::from(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => config::Value::from(i),
            None => config::Value::from(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => config::Value::from(s),
        other => config::Value::from(other.to_string()),
    }
}

/// 获取全局配置管理器实例（单例模式）
pub fn get_global_config_manager() -> Result<Arc<ConfigManager>> {
    {
        let manager = GLOBAL_CONFIG_MANAGER
            .read()
            .map_err(|e| anyhow!("读取全局配置管理器锁失败: {}", e))?;
        if let Some(ref config_manager) = *manager {
            return Ok(Arc::clone(config_manager));
        }
    }
    let mut manager = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("获取全局配置管理器写锁失败: {}", e))?;
    match manager.as_ref() {
        Some(existing) => Ok(Arc::clone(existing)),
        None => {
            let config_manager =
                Arc::new(ConfigManager::new().map_err(|e| anyhow!("创建配置管理器失败: {}", e))?);
            *manager = Some(Arc::clone(&config_manager));
            Ok(config_manager)
        }
    }
}

/// 替换全局配置管理器（启动参数覆盖或测试使用）
/// Replace the global config manager (CLI overrides or tests)
pub fn set_global_config_manager(config_manager: ConfigManager) -> Result<()> {
    let mut manager = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("获取全局配置管理器写锁失败: {}", e))?;
    *manager = Some(Arc::new(config_manager));
    Ok(())
}
