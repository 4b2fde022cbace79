use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{types, Column, Pool, Postgres, QueryBuilder, Row};

use crate::db::connection::get_pool;
use crate::db::error::{DbError, Result};
use crate::db::model::{format_timestamp, parse_timestamp, ColType, ColumnDef, Record, TableMeta};
use crate::db::query::{Col, Field, Predicate, Select};
use crate::db::store::{Executor, Store, Transaction};

/// PostgreSQL 存储：SQL 全部参数化，列名由表描述限定
/// PostgreSQL store: every value is bound, identifiers come from table descriptors
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// 使用分库组的连接池 / use the pool of a database group
    pub async fn connect(group: &str) -> Result<Self> {
        Ok(Self::new(get_pool(group).await?))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    fn executor(&self) -> Box<dyn Executor + '_> {
        Box::new(PgExecutor { pool: &self.pool })
    }
}

/// 连接池执行器（每次操作获取一个连接）/ pool executor, one connection per call
pub struct PgExecutor<'a> {
    pool: &'a Pool<Postgres>,
}

#[async_trait]
impl Executor for PgExecutor<'_> {
    async fn select(&mut self, q: &Select) -> Result<Vec<Record>> {
        let mut conn = self.pool.acquire().await?;
        run_select(&mut conn, q).await
    }

    async fn count(&mut self, q: &Select) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        run_count(&mut conn, q).await
    }

    async fn insert(&mut self, table: &TableMeta, row: &Record) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        run_insert(&mut conn, table, row).await
    }

    async fn insert_many(&mut self, table: &TableMeta, rows: &[Record]) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        run_insert_many(&mut conn, table, rows).await
    }

    async fn update(
        &mut self,
        table: &TableMeta,
        filter: &[Predicate],
        set: &Record,
    ) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        run_update(&mut conn, table, filter, set).await
    }

    async fn delete(&mut self, table: &TableMeta, filter: &[Predicate]) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        run_delete(&mut conn, table, filter).await
    }
}

/// PostgreSQL 事务；drop 时由 sqlx 回滚 / sqlx rolls back on drop
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Executor for PgTx {
    async fn select(&mut self, q: &Select) -> Result<Vec<Record>> {
        run_select(&mut self.tx, q).await
    }

    async fn count(&mut self, q: &Select) -> Result<u64> {
        run_count(&mut self.tx, q).await
    }

    async fn insert(&mut self, table: &TableMeta, row: &Record) -> Result<i64> {
        run_insert(&mut self.tx, table, row).await
    }

    async fn insert_many(&mut self, table: &TableMeta, rows: &[Record]) -> Result<u64> {
        run_insert_many(&mut self.tx, table, rows).await
    }

    async fn update(
        &mut self,
        table: &TableMeta,
        filter: &[Predicate],
        set: &Record,
    ) -> Result<u64> {
        run_update(&mut self.tx, table, filter, set).await
    }

    async fn delete(&mut self, table: &TableMeta, filter: &[Predicate]) -> Result<u64> {
        run_delete(&mut self.tx, table, filter).await
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(DbError::from)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(DbError::from)
    }
}

async fn run_select(conn: &mut PgConnection, q: &Select) -> Result<Vec<Record>> {
    let mut qb = render_select(q)?;
    tracing::debug!(sql = qb.sql(), "select");
    let rows = qb.build().fetch_all(&mut *conn).await?;
    rows.iter().map(row_to_record).collect()
}

async fn run_count(conn: &mut PgConnection, q: &Select) -> Result<u64> {
    let mut qb = render_count(q)?;
    let row = qb.build().fetch_one(&mut *conn).await?;
    let n: i64 = row.try_get(0)?;
    Ok(n.max(0) as u64)
}

async fn run_insert(conn: &mut PgConnection, table: &TableMeta, row: &Record) -> Result<i64> {
    let mut qb = render_insert(table, std::slice::from_ref(row))?;
    if table.has_column("id") {
        let rec = qb.build().fetch_one(&mut *conn).await?;
        Ok(rec.try_get::<i64, _>(0)?)
    } else {
        qb.build().execute(&mut *conn).await?;
        Ok(0)
    }
}

async fn run_insert_many(conn: &mut PgConnection, table: &TableMeta, rows: &[Record]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut qb = render_insert(table, rows)?;
    let res = qb.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}

async fn run_update(
    conn: &mut PgConnection,
    table: &TableMeta,
    filter: &[Predicate],
    set: &Record,
) -> Result<u64> {
    let Some(mut qb) = render_update(table, filter, set)? else {
        return Ok(0);
    };
    let res = qb.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}

async fn run_delete(conn: &mut PgConnection, table: &TableMeta, filter: &[Predicate]) -> Result<u64> {
    let mut qb = render_delete(table, filter)?;
    let res = qb.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 列名解析范围 / where column references resolve
enum Scope<'a> {
    Query(&'a Select),
    Table(&'a TableMeta),
}

impl Scope<'_> {
    fn column(&self, col: &Col) -> Result<(String, &'static ColumnDef)> {
        match self {
            Scope::Query(q) => {
                let alias = q.resolve_alias(col);
                let table = q
                    .table_for(alias)
                    .ok_or_else(|| DbError::Config(format!("unknown table alias {}", alias)))?;
                let def = lookup_column(&table, col.name)?;
                Ok((format!("{}.{}", ident(alias), ident(col.name)), def))
            }
            Scope::Table(table) => {
                if let Some(alias) = col.alias.filter(|a| *a != table.name) {
                    return Err(DbError::Config(format!(
                        "alias {} not allowed on {}",
                        alias, table.name
                    )));
                }
                Ok((ident(col.name), lookup_column(table, col.name)?))
            }
        }
    }
}

fn lookup_column(table: &TableMeta, name: &str) -> Result<&'static ColumnDef> {
    table
        .column(name)
        .ok_or_else(|| DbError::Config(format!("column {} does not exist on {}", name, table.name)))
}

/// 按列类型绑定参数 / bind a value with the column's type
fn push_typed(qb: &mut QueryBuilder<'static, Postgres>, def: &ColumnDef, v: &Value) -> Result<()> {
    let v = def
        .coerce(v)
        .ok_or_else(|| DbError::Config(format!("invalid value for column {}: {}", def.name, v)))?;
    match def.ty {
        ColType::Text => {
            qb.push_bind(v.as_str().map(str::to_string));
        }
        ColType::Int64 => {
            qb.push_bind(v.as_i64());
        }
        ColType::Int16 => {
            qb.push_bind(v.as_i64().and_then(|i| i16::try_from(i).ok()));
        }
        ColType::Bool => {
            qb.push_bind(v.as_bool());
        }
        ColType::Timestamp => {
            qb.push_bind(v.as_str().and_then(parse_timestamp));
        }
        ColType::Json => {
            qb.push_bind(types::Json(v));
        }
    }
    Ok(())
}

fn push_filters(
    qb: &mut QueryBuilder<'static, Postgres>,
    scope: &Scope<'_>,
    filters: &[Predicate],
) -> Result<()> {
    let mut first = true;
    for p in filters {
        if let Predicate::Keyword(cols, _) = p {
            if cols.is_empty() {
                continue;
            }
        }
        qb.push(if first { " WHERE " } else { " AND " });
        first = false;
        match p {
            Predicate::Eq(col, v) | Predicate::Ne(col, v) => {
                let (sql, def) = scope.column(col)?;
                let eq = matches!(p, Predicate::Eq(..));
                qb.push(sql);
                if v.is_null() {
                    qb.push(if eq { " IS NULL" } else { " IS NOT NULL" });
                } else {
                    qb.push(if eq { " = " } else { " <> " });
                    push_typed(qb, def, v)?;
                }
            }
            Predicate::In(col, values) => {
                if values.is_empty() {
                    qb.push("FALSE");
                    continue;
                }
                let (sql, def) = scope.column(col)?;
                qb.push(sql).push(" IN (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_typed(qb, def, v)?;
                }
                qb.push(")");
            }
            Predicate::Keyword(cols, keyword) => {
                let pattern = format!("%{}%", escape_like(keyword));
                qb.push("(");
                for (i, col) in cols.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    let (sql, _) = scope.column(col)?;
                    qb.push(sql).push("::text ILIKE ");
                    qb.push_bind(pattern.clone());
                }
                qb.push(")");
            }
        }
    }
    Ok(())
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_body(qb: &mut QueryBuilder<'static, Postgres>, q: &Select) -> Result<()> {
    let scope = Scope::Query(q);
    qb.push(" FROM ")
        .push(ident(q.table.name))
        .push(" AS ")
        .push(ident(q.base_alias()));
    for join in &q.joins {
        qb.push(" LEFT JOIN ")
            .push(ident(join.table.name))
            .push(" AS ")
            .push(ident(join.alias))
            .push(" ON ");
        let (left, _) = scope.column(&join.on.0)?;
        let (right, _) = scope.column(&join.on.1)?;
        qb.push(left).push(" = ").push(right);
    }
    push_filters(qb, &scope, &q.filters)?;
    if !q.group_by.is_empty() {
        qb.push(" GROUP BY ");
        for (i, col) in q.group_by.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(scope.column(col)?.0);
        }
    }
    Ok(())
}

fn push_fields(qb: &mut QueryBuilder<'static, Postgres>, q: &Select) -> Result<()> {
    let scope = Scope::Query(q);
    let mut parts: Vec<String> = Vec::new();
    let default_fields = [Field::all()];
    let fields: &[Field] = if q.fields.is_empty() {
        &default_fields
    } else {
        &q.fields
    };
    for field in fields {
        match field {
            Field::All(alias) => {
                let alias = alias.unwrap_or(q.base_alias());
                let table = q
                    .table_for(alias)
                    .ok_or_else(|| DbError::Config(format!("unknown table alias {}", alias)))?;
                parts.extend(
                    table
                        .columns
                        .iter()
                        .filter(|c| !q.exclude.contains(&c.name))
                        .map(|c| format!("{}.{}", ident(alias), ident(c.name))),
                );
            }
            Field::Column { col, alias } => {
                let (sql, _) = scope.column(col)?;
                parts.push(format!("{} AS {}", sql, ident(alias.unwrap_or(col.name))));
            }
            Field::GroupConcat { col, alias } => {
                let (sql, _) = scope.column(col)?;
                parts.push(format!("string_agg({}::text, ',') AS {}", sql, ident(alias)));
            }
        }
    }
    qb.push(parts.join(", "));
    Ok(())
}

/// 渲染 SELECT / render a SELECT
pub fn render_select(q: &Select) -> Result<QueryBuilder<'static, Postgres>> {
    let scope = Scope::Query(q);
    let mut qb = QueryBuilder::new("SELECT ");
    push_fields(&mut qb, q)?;
    push_body(&mut qb, q)?;
    if !q.order_by.is_empty() {
        qb.push(" ORDER BY ");
        for (i, o) in q.order_by.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(scope.column(&o.col)?.0);
            qb.push(if o.desc {
                " DESC NULLS LAST"
            } else {
                " ASC NULLS FIRST"
            });
        }
    }
    if let Some(limit) = q.limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }
    if let Some(offset) = q.offset {
        qb.push(" OFFSET ").push_bind(offset as i64);
    }
    Ok(qb)
}

/// 渲染计数（分组后）/ render a count over the grouped result
pub fn render_count(q: &Select) -> Result<QueryBuilder<'static, Postgres>> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT 1");
    push_body(&mut qb, q)?;
    qb.push(") AS \"counted\"");
    Ok(qb)
}

/// 渲染 INSERT；多行时列取各行键的并集 / columns are the union of row keys
pub fn render_insert(table: &TableMeta, rows: &[Record]) -> Result<QueryBuilder<'static, Postgres>> {
    for row in rows {
        for key in row.keys() {
            lookup_column(table, key)?;
        }
    }
    let cols: Vec<&'static ColumnDef> = table
        .columns
        .iter()
        .filter(|c| rows.iter().any(|r| r.contains_key(c.name)))
        .collect();

    let mut qb = QueryBuilder::new("INSERT INTO ");
    qb.push(ident(table.name));
    if cols.is_empty() {
        qb.push(" DEFAULT VALUES");
    } else {
        let names: Vec<String> = cols.iter().map(|c| ident(c.name)).collect();
        qb.push(" (").push(names.join(", ")).push(") VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push("(");
            for (j, col) in cols.iter().enumerate() {
                if j > 0 {
                    qb.push(", ");
                }
                push_typed(&mut qb, col, row.get(col.name).unwrap_or(&Value::Null))?;
            }
            qb.push(")");
        }
    }
    if table.has_column("id") {
        qb.push(" RETURNING \"id\"");
    }
    Ok(qb)
}

/// 渲染 UPDATE；无可写列时返回 None / None when nothing is set
pub fn render_update(
    table: &TableMeta,
    filter: &[Predicate],
    set: &Record,
) -> Result<Option<QueryBuilder<'static, Postgres>>> {
    if set.is_empty() {
        return Ok(None);
    }
    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(ident(table.name)).push(" SET ");
    for (i, (key, v)) in set.iter().enumerate() {
        let def = lookup_column(table, key)?;
        if i > 0 {
            qb.push(", ");
        }
        qb.push(ident(key)).push(" = ");
        push_typed(&mut qb, def, v)?;
    }
    push_filters(&mut qb, &Scope::Table(table), filter)?;
    Ok(Some(qb))
}

pub fn render_delete(table: &TableMeta, filter: &[Predicate]) -> Result<QueryBuilder<'static, Postgres>> {
    let mut qb = QueryBuilder::new("DELETE FROM ");
    qb.push(ident(table.name));
    push_filters(&mut qb, &Scope::Table(table), filter)?;
    Ok(qb)
}

fn row_to_record(row: &PgRow) -> Result<Record> {
    // 依次尝试常见类型；时间统一为列格式
    // Try common types in turn; timestamps use the column format
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        let val_json = row
            .try_get::<types::Json<Value>, _>(name)
            .map(|j| j.0)
            .or_else(|_| row.try_get::<i16, _>(name).map(|v| Value::from(v as i64)))
            .or_else(|_| row.try_get::<i32, _>(name).map(|v| Value::from(v as i64)))
            .or_else(|_| row.try_get::<i64, _>(name).map(Value::from))
            .or_else(|_| row.try_get::<bool, _>(name).map(Value::from))
            .or_else(|_| {
                row.try_get::<chrono::NaiveDateTime, _>(name)
                    .map(|dt| Value::String(format_timestamp(&dt)))
            })
            .or_else(|_| {
                row.try_get::<chrono::DateTime<chrono::Utc>, _>(name)
                    .map(|dt| Value::String(format_timestamp(&dt.naive_utc())))
            })
            .or_else(|_| row.try_get::<String, _>(name).map(Value::String))
            .unwrap_or(Value::Null);
        map.insert(name.to_string(), val_json);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::JoinOp;
    use serde_json::json;

    const USER: &[ColumnDef] = &[
        ColumnDef::new("id", ColType::Int64),
        ColumnDef::new("name", ColType::Text),
        ColumnDef::new("password", ColType::Text),
        ColumnDef::new("departmentId", ColType::Int64),
        ColumnDef::new("createTime", ColType::Timestamp),
    ];
    const DEPT: &[ColumnDef] = &[
        ColumnDef::new("id", ColType::Int64),
        ColumnDef::new("name", ColType::Text),
    ];

    fn t(name: &'static str, columns: &'static [ColumnDef]) -> TableMeta {
        TableMeta {
            name,
            group: "default",
            columns,
        }
    }

    #[test]
    fn test_render_select_with_join_and_keyword() {
        let q = Select::from(t("user", USER))
            .alias("a")
            .fields(vec![
                Field::all(),
                Field::col_as(Col::of("d", "name"), "departmentName"),
                Field::group_concat(Col::of("d", "id"), "deptIds"),
            ])
            .exclude(&["password"])
            .join(JoinOp::left(
                t("dept", DEPT),
                "d",
                Col::new("departmentId"),
                Col::of("d", "id"),
            ))
            .filter(Predicate::Keyword(
                vec![Col::new("name")],
                "50%_off'; DROP".to_string(),
            ))
            .filter(Predicate::in_ids(Col::new("departmentId"), &[1, 2]))
            .group_by(Col::new("id"))
            .group_by(Col::of("d", "name"))
            .order_by(Col::new("createTime"), true)
            .limit(20)
            .offset(40);
        let qb = render_select(&q).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT \"a\".\"id\", \"a\".\"name\", \"a\".\"departmentId\", \"a\".\"createTime\", \
             \"d\".\"name\" AS \"departmentName\", string_agg(\"d\".\"id\"::text, ',') AS \"deptIds\" \
             FROM \"user\" AS \"a\" LEFT JOIN \"dept\" AS \"d\" ON \"a\".\"departmentId\" = \"d\".\"id\" \
             WHERE (\"a\".\"name\"::text ILIKE $1) AND \"a\".\"departmentId\" IN ($2, $3) \
             GROUP BY \"a\".\"id\", \"d\".\"name\" ORDER BY \"a\".\"createTime\" DESC NULLS LAST \
             LIMIT $4 OFFSET $5"
        );
    }

    #[test]
    fn test_render_count_and_empty_in() {
        let q = Select::from(t("user", USER)).filter(Predicate::In(Col::new("id"), vec![]));
        let qb = render_count(&q).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM (SELECT 1 FROM \"user\" AS \"user\" WHERE FALSE) AS \"counted\""
        );
    }

    #[test]
    fn test_render_writes() {
        let mut row = Record::new();
        row.insert("name".into(), json!("alice"));
        row.insert("departmentId".into(), json!("3"));
        let qb = render_insert(&t("user", USER), &[row.clone()]).unwrap();
        assert_eq!(
            qb.sql(),
            "INSERT INTO \"user\" (\"name\", \"departmentId\") VALUES ($1, $2) RETURNING \"id\""
        );

        let qb = render_update(
            &t("user", USER),
            &[Predicate::eq(Col::new("id"), 9)],
            &row,
        )
        .unwrap()
        .unwrap();
        assert!(qb.sql().starts_with("UPDATE \"user\" SET "));
        assert!(qb.sql().ends_with(" WHERE \"id\" = $3"));
        assert!(render_update(&t("user", USER), &[], &Record::new())
            .unwrap()
            .is_none());

        let qb = render_delete(&t("dept", DEPT), &[Predicate::in_ids(Col::new("id"), &[4])]).unwrap();
        assert_eq!(qb.sql(), "DELETE FROM \"dept\" WHERE \"id\" IN ($1)");
    }

    #[test]
    fn test_render_rejects_unknown_names() {
        let mut row = Record::new();
        row.insert("roleIdList".into(), json!([1]));
        assert!(render_insert(&t("user", USER), &[row]).is_err());

        let q = Select::from(t("user", USER)).filter(Predicate::eq(Col::of("zz", "id"), 1));
        assert!(render_select(&q).is_err());

        let mut bad = Record::new();
        bad.insert("departmentId".into(), json!("abc"));
        assert!(render_update(&t("user", USER), &[], &bad).is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\"), "a\\%b\\_c\\\\");
    }
}
