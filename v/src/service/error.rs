use thiserror::Error;

use crate::cache::CacheError;
use crate::db::error::DbError;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// 资源服务错误 / resource service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("数据库错误: {0}")]
    Db(#[from] DbError),
    #[error("缓存错误: {0}")]
    Cache(String),
}

impl From<CacheError> for ServiceError {
    fn from(e: CacheError) -> Self {
        ServiceError::Cache(e.to_string())
    }
}

impl ServiceError {
    /// 对应的 HTTP 状态码 / matching HTTP status
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::Forbidden(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Db(_) | ServiceError::Cache(_) => 500,
        }
    }

    /// 响应体中的业务错误码 / business code carried in the response envelope
    pub fn error_code(&self) -> i32 {
        match self {
            ServiceError::Validation(_) => 1001,
            ServiceError::Forbidden(_) => 1003,
            ServiceError::NotFound(_) => 1004,
            ServiceError::Db(_) | ServiceError::Cache(_) => 1000,
        }
    }
}
