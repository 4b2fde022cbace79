use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use v::{BaseRes, ConfigError, ServiceError};

/// 统一的应用错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// 获取错误代码（响应信封中的 code，非零）
    pub fn error_code(&self) -> i32 {
        match self {
            AppError::Service(e) => e.error_code(),
            AppError::Config(_) => 1002,
            AppError::Internal(_) => 1000,
        }
    }

    /// 获取HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Service(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = AppError::status_code(self);
        let message = self.to_string();

        // 记录错误日志
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "internal error: {}", message);
        } else {
            tracing::info!(code = self.error_code(), "client error: {}", message);
        }

        HttpResponse::build(status).json(BaseRes::<()>::fail(self.error_code(), message))
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use v::DbError;

    #[test]
    fn test_service_errors_map_to_http() {
        let e = AppError::from(ServiceError::Forbidden("superadmin cannot be deleted".into()));
        assert_eq!(e.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(e.error_code(), 1003);
        assert_eq!(e.to_string(), "superadmin cannot be deleted");

        let e = AppError::from(ServiceError::Db(DbError::Write("boom".into())));
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let e = AppError::from(ConfigError::TypeConversionError {
            key: "server.port".into(),
            message: "invalid type".into(),
        });
        assert_eq!(e.error_code(), 1002);
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
