use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("配置错误: {0}")]
    Config(String),
    #[cfg(feature = "postgres")]
    #[error("SQLx 错误: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("事务错误: {0}")]
    Tx(String),
    #[error("写入被拒绝: {0}")]
    Write(String),
}
