use serde_json::Value;

use crate::db::model::TableMeta;

/// 列引用：可带表别名；未带别名时指主表
/// Column reference, optionally qualified by a table alias (defaults to the base table)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Col {
    pub alias: Option<&'static str>,
    pub name: &'static str,
}

impl Col {
    pub const fn new(name: &'static str) -> Self {
        Self { alias: None, name }
    }

    pub const fn of(alias: &'static str, name: &'static str) -> Self {
        Self {
            alias: Some(alias),
            name,
        }
    }
}

/// 左连接描述 / Left join descriptor
///
/// `on` 为等值条件 `left = right` / `on` is the equality `left = right`
#[derive(Debug, Clone)]
pub struct JoinOp {
    pub table: TableMeta,
    pub alias: &'static str,
    pub on: (Col, Col),
}

impl JoinOp {
    pub fn left(table: TableMeta, alias: &'static str, left: Col, right: Col) -> Self {
        Self {
            table,
            alias,
            on: (left, right),
        }
    }
}

/// 查询字段 / Selected field
#[derive(Debug, Clone)]
pub enum Field {
    /// `alias.*`（受排除列表影响）/ `alias.*`, minus excluded columns
    All(Option<&'static str>),
    Column {
        col: Col,
        alias: Option<&'static str>,
    },
    /// 逗号拼接的分组聚合 / comma-joined group aggregate
    GroupConcat { col: Col, alias: &'static str },
}

impl Field {
    pub const fn all() -> Self {
        Field::All(None)
    }

    pub const fn col_as(col: Col, alias: &'static str) -> Self {
        Field::Column {
            col,
            alias: Some(alias),
        }
    }

    pub const fn group_concat(col: Col, alias: &'static str) -> Self {
        Field::GroupConcat { col, alias }
    }
}

/// 过滤条件；所有值均以绑定参数传递
/// Filter predicate; every value is passed as a bound parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Col, Value),
    Ne(Col, Value),
    /// 空列表不匹配任何行 / an empty list matches nothing
    In(Col, Vec<Value>),
    /// 任一列包含关键字（不区分大小写）/ any column contains the keyword, case-insensitive
    Keyword(Vec<Col>, String),
}

impl Predicate {
    pub fn eq(col: Col, v: impl Into<Value>) -> Self {
        Predicate::Eq(col, v.into())
    }

    pub fn in_ids(col: Col, ids: &[i64]) -> Self {
        Predicate::In(col, ids.iter().map(|id| Value::from(*id)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub col: Col,
    pub desc: bool,
}

/// 类型化 SELECT 描述，由存储实现解释
/// Typed SELECT description, interpreted by store implementations
#[derive(Debug, Clone)]
pub struct Select {
    pub table: TableMeta,
    pub alias: Option<&'static str>,
    pub fields: Vec<Field>,
    pub exclude: Vec<&'static str>,
    pub joins: Vec<JoinOp>,
    pub filters: Vec<Predicate>,
    pub group_by: Vec<Col>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn from(table: TableMeta) -> Self {
        Self {
            table,
            alias: None,
            fields: Vec::new(),
            exclude: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// 选择字段；为空时等价 `*` / select fields; empty means `*`
    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// 排除列（对 `*` 投影生效）/ exclude columns from `*` projections
    pub fn exclude(mut self, cols: &[&'static str]) -> Self {
        self.exclude.extend_from_slice(cols);
        self
    }

    pub fn join(mut self, join: JoinOp) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, p: Predicate) -> Self {
        self.filters.push(p);
        self
    }

    pub fn where_eq(self, col: &'static str, v: impl Into<Value>) -> Self {
        self.filter(Predicate::eq(Col::new(col), v))
    }

    pub fn group_by(mut self, col: Col) -> Self {
        self.group_by.push(col);
        self
    }

    pub fn order_by(mut self, col: Col, desc: bool) -> Self {
        self.order_by.push(OrderBy { col, desc });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// 主表别名（默认表名）/ base alias, defaults to the table name
    pub fn base_alias(&self) -> &'static str {
        self.alias.unwrap_or(self.table.name)
    }

    /// 按别名查找表描述 / look up a table by alias
    pub fn table_for(&self, alias: &str) -> Option<TableMeta> {
        if alias == self.base_alias() {
            return Some(self.table);
        }
        self.joins
            .iter()
            .find(|j| j.alias == alias)
            .map(|j| j.table)
    }

    /// 列所属别名 / alias a column belongs to
    pub fn resolve_alias(&self, col: &Col) -> &'static str {
        col.alias.unwrap_or_else(|| self.base_alias())
    }
}
