// v 库主入口，按需导出模块

pub mod comm;
pub use crate::comm::config::*;
pub use crate::comm::tracing::init_tracing;

pub mod db;
#[cfg(feature = "postgres")]
pub use crate::db::connection::*;
pub use crate::db::error::*;
pub use crate::db::model::*;
pub use crate::db::query::*;
pub use crate::db::store::*;
pub use crate::db::memory::{MemoryStore, WriteKind, WriteOp};
#[cfg(feature = "postgres")]
pub use crate::db::postgres::PgStore;

pub mod cache;
pub use crate::cache::{Cache, CacheError, MemoryCache};

pub mod crypto;
pub use crate::crypto::{PasswordHasher, Sha1Hasher};

pub mod ctx;
pub use crate::ctx::{Admin, RequestCtx};

pub mod service;
pub use crate::service::{ModifyOp, ResourceService, Service, ServiceConfig, ServiceError};

pub mod response;
pub use crate::response::BaseRes;

// 重新导出 tracing 宏，方便业务模块使用
// Re-export tracing macros for business modules
pub use tracing::{debug, error, info, trace, warn};
