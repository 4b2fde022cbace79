use serde::{Deserialize, Serialize};

// 通用响应信封：成功 code = 0，失败为非零业务码
// Response envelope: code 0 on success, a non-zero business code on failure

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRes<T = serde_json::Value> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> BaseRes<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    /// 无数据的成功响应 / success without data
    pub fn done() -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: None,
        }
    }

    pub fn fail(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}
