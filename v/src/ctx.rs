use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::model::{value_as_i64, value_as_i64_list, Record};

/// 当前登录管理员 / the authenticated administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
}

/// 单次请求上下文：调用者身份与请求参数
/// Per-request context: caller identity and request parameters
#[derive(Debug, Clone, Default)]
pub struct RequestCtx {
    pub admin: Option<Admin>,
    pub params: Record,
}

impl RequestCtx {
    pub fn new(admin: Option<Admin>, params: Record) -> Self {
        Self { admin, params }
    }

    /// 由 JSON 对象构造；非对象视为空参数 / non-objects yield empty params
    pub fn from_json(admin: Option<Admin>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Record::new(),
        };
        Self { admin, params }
    }

    pub fn admin_id(&self) -> Option<i64> {
        self.admin.as_ref().map(|a| a.user_id)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.param(key).and_then(value_as_i64)
    }

    /// 字符串参数（去除首尾空白，空串视为缺省）/ trimmed, empty means absent
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.param(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn get_i64_list(&self, key: &str) -> Option<Vec<i64>> {
        self.param(key).and_then(value_as_i64_list)
    }
}
