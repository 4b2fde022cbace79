use chrono::NaiveDateTime;
use serde_json::Value;

/// 一行数据（列名 -> JSON 值）/ One row (column name -> JSON value)
pub type Record = serde_json::Map<String, Value>;

/// 通用模型元信息 Trait（表名与分库组）
/// Generic model meta trait (table name and group)
pub trait DbModel {
    fn table_name() -> &'static str;
    fn table_group() -> &'static str;
}

/// 便捷宏：为模型实现 DbModel（使用模块内约定常量）
/// Helper macro: implement DbModel using module-level consts
#[macro_export]
macro_rules! impl_table_meta {
    ($ty:path, $table:path, $group:path) => {
        impl $crate::db::model::DbModel for $ty {
            fn table_name() -> &'static str {
                $table
            }
            fn table_group() -> &'static str {
                $group
            }
        }
    };
}

/// 列类型声明（用于插入/更新的类型转换与绑定）
/// Column type declaration (conversion and binding for insert/update)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColType {
    Text,
    Int64,
    Int16,
    Bool,
    Timestamp,
    Json,
}

/// 列默认值（仅内存存储使用，数据库由表结构提供）
/// Column default (applied by the memory store; databases use the schema)
#[derive(Debug, Clone, Copy)]
pub enum ColDefault {
    Int(i64),
    Text(&'static str),
}

/// 列定义 / Column definition
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColType,
    pub default: Option<ColDefault>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColType) -> Self {
        Self {
            name,
            ty,
            default: None,
        }
    }

    pub const fn with_default(self, default: ColDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    pub fn default_value(&self) -> Value {
        match self.default {
            Some(ColDefault::Int(i)) => Value::from(i),
            Some(ColDefault::Text(s)) => Value::from(s),
            None => Value::Null,
        }
    }

    /// 将请求值转换为列类型；无法表示时返回 `None`
    /// Convert a request value to the column type; `None` if it cannot be represented
    pub fn coerce(&self, v: &Value) -> Option<Value> {
        if v.is_null() {
            return Some(Value::Null);
        }
        match self.ty {
            ColType::Text => Some(match v {
                Value::String(_) => v.clone(),
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => Value::String(other.to_string()),
            }),
            ColType::Int64 => value_as_i64(v).map(Value::from),
            ColType::Int16 => value_as_i64(v)
                .filter(|i| i16::try_from(*i).is_ok())
                .map(Value::from),
            ColType::Bool => match v {
                Value::Bool(_) => Some(v.clone()),
                Value::Number(n) => n.as_i64().map(|i| Value::Bool(i != 0)),
                Value::String(s) => match s.trim() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            ColType::Timestamp => v
                .as_str()
                .and_then(parse_timestamp)
                .map(|dt| Value::String(format_timestamp(&dt))),
            ColType::Json => Some(v.clone()),
        }
    }
}

/// 可选的模型列规范 Trait（用于自动映射）
/// Optional model column spec trait (for auto mapping)
pub trait ModelSpec: DbModel {
    fn columns() -> &'static [ColumnDef];
}

/// 运行期表描述：查询构建与存储实现共用
/// Runtime table descriptor shared by the query builder and stores
#[derive(Debug, Clone, Copy)]
pub struct TableMeta {
    pub name: &'static str,
    pub group: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableMeta {
    pub fn of<M: ModelSpec>() -> Self {
        Self {
            name: M::table_name(),
            group: M::table_group(),
            columns: M::columns(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// 宽松整数解析：数字或数字字符串 / Lenient integer: number or numeric string
pub fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// 宽松整数列表：数组、逗号分隔字符串或单个值
/// Lenient integer list: array, comma separated string or a single value
pub fn value_as_i64_list(v: &Value) -> Option<Vec<i64>> {
    match v {
        Value::Null => None,
        Value::Array(items) => items.iter().map(value_as_i64).collect(),
        Value::String(s) if s.trim().is_empty() => Some(Vec::new()),
        Value::String(s) => s.split(',').map(|p| p.trim().parse::<i64>().ok()).collect(),
        other => value_as_i64(other).map(|i| vec![i]),
    }
}

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s.trim(), f).ok())
}

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 当前 UTC 时间（列值格式）/ Current UTC time in column format
pub fn now_timestamp() -> Value {
    Value::String(format_timestamp(&chrono::Utc::now().naive_utc()))
}
