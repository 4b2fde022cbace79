use std::sync::Arc;

use actix_web::{
    middleware::{Condition, Logger},
    web, App, HttpServer,
};
use tracing::{error, info, instrument};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, Registry};
use v::{Cache, MemoryCache, MemoryStore, PasswordHasher, PgStore, Sha1Hasher, Store};

use crate::conf::{AppConfig, LogFormat};
use crate::error::{AppError, AppResult};
use crate::middleware::identity::TrustedIdentity;
use crate::modules::base::seed::seed_memory_store;
use crate::modules::base::service::BaseSysUserService;
use crate::modules::configure_routes;

/// 初始化日志：`logging.format = "json"` 时输出 Bunyan JSON
pub fn init_logging(format: LogFormat) -> AppResult<()> {
    match format {
        LogFormat::Json => {
            let formatting_layer = BunyanFormattingLayer::new("vgo-admin".into(), std::io::stdout);
            let subscriber = Registry::default()
                .with(v::comm::tracing::log_filter())
                .with(JsonStorageLayer)
                .with(formatting_layer);
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| AppError::Internal(anyhow::Error::new(e)))
        }
        LogFormat::Compact => v::init_tracing().map_err(AppError::Internal),
    }
}

/// 组装用户服务及其存储、缓存、摘要依赖
/// Assemble the user service with its store, cache and hasher
pub async fn build_user_service(config: &AppConfig) -> AppResult<BaseSysUserService> {
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Sha1Hasher);
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let store: Arc<dyn Store> = if config.memory {
        let store = MemoryStore::new();
        seed_memory_store(&store, hasher.as_ref()).map_err(|e| AppError::Internal(e.into()))?;
        info!("使用内存存储 / using in-memory store");
        Arc::new(store)
    } else {
        let store = PgStore::connect(&config.db_group)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
        info!(group = %config.db_group, "使用 PostgreSQL 存储 / using postgres store");
        Arc::new(store)
    };
    Ok(BaseSysUserService::new(store, cache, hasher).with_super_admin(config.super_admin_id))
}

/// 应用启动器
pub struct AppBootstrap {
    config: Option<AppConfig>,
}

impl AppBootstrap {
    /// 创建新的应用启动器
    pub fn new() -> Self {
        Self { config: None }
    }

    /// 设置配置
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 运行应用服务器
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let config = self.config.unwrap_or_default();
        info!("启动应用服务器，配置: {:?}", config);

        let users = web::Data::new(build_user_service(&config).await?);
        // 内存模式用于本地调试，无上游认证层，直接信任身份头
        let trust_headers = config.trust_headers || config.memory;

        let mut server = HttpServer::new(move || {
            App::new()
                .wrap(Condition::new(trust_headers, TrustedIdentity))
                .wrap(Logger::default())
                .app_data(users.clone())
                .configure(configure_routes)
        });
        if let Some(workers) = config.workers {
            server = server.workers(workers);
        }

        let addr = format!("{}:{}", config.host, config.port);
        info!("服务器将在 {} 上启动", addr);
        server
            .bind(&addr)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?
            .run()
            .await
            .map_err(|e| {
                error!("服务器运行失败: {}", e);
                AppError::Internal(anyhow::Error::new(e))
            })
    }
}

impl Default for AppBootstrap {
    fn default() -> Self {
        Self::new()
    }
}
