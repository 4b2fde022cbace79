//! 内存表格存储：单元测试与 `--memory` 本地运行使用
//! In-memory tabular store used by tests and `--memory` local runs
//!
//! 事务在快照上执行并记录写操作，提交时在共享状态上重放；
//! 重放失败则整个事务不生效。
//! A transaction runs against a snapshot and records its writes; commit replays
//! them on the shared state, and a failed replay leaves the state untouched.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::db::error::{DbError, Result};
use crate::db::model::{value_as_i64, Record, TableMeta};
use crate::db::query::{Col, Field, Predicate, Select};
use crate::db::store::{Executor, Store, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// 已提交的写操作记录 / A committed write statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub table: &'static str,
    pub kind: WriteKind,
    pub rows: u64,
}

#[derive(Debug, Default, Clone)]
struct TableData {
    rows: Vec<Record>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<&'static str, TableData>,
    log: Vec<WriteOp>,
    failing: HashSet<&'static str>,
}

/// 一行联表结果：别名 -> 行（左连接未命中为 None）
/// One joined row: alias -> row (None for an unmatched left join)
type Joined<'a> = Vec<(&'static str, Option<&'a Record>)>;

impl State {
    fn snapshot(&self) -> Self {
        Self {
            tables: self.tables.clone(),
            log: Vec::new(),
            failing: self.failing.clone(),
        }
    }

    fn table_rows(&self, name: &str) -> &[Record] {
        self.tables
            .get(name)
            .map(|t| t.rows.as_slice())
            .unwrap_or(&[])
    }

    fn joined_rows<'a>(&'a self, q: &Select) -> Vec<Joined<'a>> {
        let base = q.base_alias();
        let mut rows: Vec<Joined<'a>> = self
            .table_rows(q.table.name)
            .iter()
            .map(|r| vec![(base, Some(r))])
            .collect();

        for join in &q.joins {
            let candidates = self.table_rows(join.table.name);
            let mut next = Vec::with_capacity(rows.len());
            for row in rows {
                let mut matched = false;
                for cand in candidates {
                    let mut probe = row.clone();
                    probe.push((join.alias, Some(cand)));
                    let left = lookup(&probe, base, &join.on.0);
                    let right = lookup(&probe, base, &join.on.1);
                    if loose_eq(&left, &right) {
                        next.push(probe);
                        matched = true;
                    }
                }
                if !matched {
                    let mut probe = row;
                    probe.push((join.alias, None));
                    next.push(probe);
                }
            }
            rows = next;
        }

        rows.retain(|row| q.filters.iter().all(|p| matches(row, base, p)));
        rows
    }

    /// 过滤、分组、排序后的结果组 / filtered, grouped and ordered result groups
    fn groups<'a>(&'a self, q: &Select) -> Vec<Vec<Joined<'a>>> {
        let base = q.base_alias();
        let rows = self.joined_rows(q);

        let mut groups: Vec<Vec<Joined<'a>>> = if q.group_by.is_empty() {
            rows.into_iter().map(|r| vec![r]).collect()
        } else {
            let mut index: HashMap<String, usize> = HashMap::new();
            let mut groups: Vec<Vec<Joined<'a>>> = Vec::new();
            for row in rows {
                let key = Value::Array(q.group_by.iter().map(|c| lookup(&row, base, c)).collect())
                    .to_string();
                match index.get(&key) {
                    Some(&i) => groups[i].push(row),
                    None => {
                        index.insert(key, groups.len());
                        groups.push(vec![row]);
                    }
                }
            }
            groups
        };

        groups.sort_by(|a, b| {
            for o in &q.order_by {
                let ord = cmp_values(&lookup(&a[0], base, &o.col), &lookup(&b[0], base, &o.col));
                let ord = if o.desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        groups
    }

    fn select(&self, q: &Select) -> Vec<Record> {
        let offset = q.offset.unwrap_or(0) as usize;
        let limit = q.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        self.groups(q)
            .iter()
            .skip(offset)
            .take(limit)
            .map(|g| project(q, g))
            .collect()
    }

    fn count(&self, q: &Select) -> u64 {
        self.groups(q).len() as u64
    }

    fn check_writable(&self, table: &TableMeta) -> Result<()> {
        if self.failing.contains(table.name) {
            return Err(DbError::Write(format!("table {} rejects writes", table.name)));
        }
        Ok(())
    }

    /// 不记录日志的插入（种子数据共用）/ insert without logging, shared with seeding
    fn insert_row(&mut self, table: &TableMeta, row: &Record) -> Result<i64> {
        let mut full = Record::new();
        for key in row.keys() {
            if !table.has_column(key) {
                return Err(DbError::Config(format!(
                    "column {} does not exist on {}",
                    key, table.name
                )));
            }
        }
        for col in table.columns {
            let value = match row.get(col.name) {
                Some(v) => col.coerce(v).ok_or_else(|| {
                    DbError::Config(format!("invalid value for column {}: {}", col.name, v))
                })?,
                None => col.default_value(),
            };
            full.insert(col.name.to_string(), value);
        }

        let data = self.tables.entry(table.name).or_default();
        let mut id = 0;
        if table.has_column("id") {
            id = match full.get("id").and_then(value_as_i64) {
                Some(explicit) => explicit,
                None => data
                    .rows
                    .iter()
                    .filter_map(|r| r.get("id").and_then(value_as_i64))
                    .fold(data.next_id, i64::max)
                    + 1,
            };
            data.next_id = data.next_id.max(id);
            full.insert("id".to_string(), Value::from(id));
        }
        data.rows.push(full);
        Ok(id)
    }

    fn insert(&mut self, table: &TableMeta, row: &Record) -> Result<i64> {
        self.check_writable(table)?;
        let id = self.insert_row(table, row)?;
        self.log_write(table, WriteKind::Insert, 1);
        Ok(id)
    }

    fn insert_many(&mut self, table: &TableMeta, rows: &[Record]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.check_writable(table)?;
        for row in rows {
            self.insert_row(table, row)?;
        }
        self.log_write(table, WriteKind::Insert, rows.len() as u64);
        Ok(rows.len() as u64)
    }

    fn update(&mut self, table: &TableMeta, filter: &[Predicate], set: &Record) -> Result<u64> {
        self.check_writable(table)?;
        let mut coerced = Record::new();
        for (key, v) in set {
            let col = table.column(key).ok_or_else(|| {
                DbError::Config(format!("column {} does not exist on {}", key, table.name))
            })?;
            let value = col.coerce(v).ok_or_else(|| {
                DbError::Config(format!("invalid value for column {}: {}", key, v))
            })?;
            coerced.insert(key.clone(), value);
        }

        let data = self.tables.entry(table.name).or_default();
        let mut affected = 0u64;
        for row in data.rows.iter_mut() {
            let hit = {
                let joined: Joined<'_> = vec![(table.name, Some(&*row))];
                filter.iter().all(|p| matches(&joined, table.name, p))
            };
            if hit {
                for (k, v) in &coerced {
                    row.insert(k.clone(), v.clone());
                }
                affected += 1;
            }
        }
        self.log_write(table, WriteKind::Update, affected);
        Ok(affected)
    }

    fn delete(&mut self, table: &TableMeta, filter: &[Predicate]) -> Result<u64> {
        self.check_writable(table)?;
        let data = self.tables.entry(table.name).or_default();
        let before = data.rows.len();
        data.rows.retain(|row| {
            let joined: Joined<'_> = vec![(table.name, Some(row))];
            !filter.iter().all(|p| matches(&joined, table.name, p))
        });
        let affected = (before - data.rows.len()) as u64;
        self.log_write(table, WriteKind::Delete, affected);
        Ok(affected)
    }

    /// 重放事务写入；插入沿用事务内分配的 id
    /// Replay a transaction write; inserts keep the ids assigned inside the transaction
    fn replay(&mut self, op: &Pending) -> Result<()> {
        match op {
            Pending::Insert(table, rows) => {
                self.check_writable(table)?;
                for row in rows {
                    if let Some(id) = row.get("id").and_then(value_as_i64) {
                        let taken = self
                            .table_rows(table.name)
                            .iter()
                            .any(|r| r.get("id").and_then(value_as_i64) == Some(id));
                        if taken {
                            return Err(DbError::Tx(format!(
                                "id {} on {} was taken by a concurrent write",
                                id, table.name
                            )));
                        }
                    }
                    self.insert_row(table, row)?;
                }
                self.log_write(table, WriteKind::Insert, rows.len() as u64);
            }
            Pending::Update(table, filter, set) => {
                self.update(table, filter, set)?;
            }
            Pending::Delete(table, filter) => {
                self.delete(table, filter)?;
            }
        }
        Ok(())
    }

    fn last_rows(&self, table: &str, n: usize) -> Vec<Record> {
        let rows = self.table_rows(table);
        rows[rows.len().saturating_sub(n)..].to_vec()
    }

    fn log_write(&mut self, table: &TableMeta, kind: WriteKind, rows: u64) {
        self.log.push(WriteOp {
            table: table.name,
            kind,
            rows,
        });
    }
}

fn lookup(row: &Joined<'_>, base: &'static str, col: &Col) -> Value {
    let alias = col.alias.unwrap_or(base);
    row.iter()
        .find(|(a, _)| *a == alias)
        .and_then(|(_, r)| *r)
        .and_then(|r| r.get(col.name))
        .cloned()
        .unwrap_or(Value::Null)
}

fn matches(row: &Joined<'_>, base: &'static str, p: &Predicate) -> bool {
    match p {
        Predicate::Eq(col, v) => loose_eq(&lookup(row, base, col), v),
        Predicate::Ne(col, v) => {
            let actual = lookup(row, base, col);
            !actual.is_null() && !loose_eq(&actual, v)
        }
        Predicate::In(col, values) => {
            let actual = lookup(row, base, col);
            values.iter().any(|v| loose_eq(&actual, v))
        }
        Predicate::Keyword(cols, keyword) => {
            let keyword = keyword.to_lowercase();
            cols.iter().any(|c| {
                value_text(&lookup(row, base, c))
                    .map(|t| t.to_lowercase().contains(&keyword))
                    .unwrap_or(false)
            })
        }
    }
}

fn project(q: &Select, group: &[Joined<'_>]) -> Record {
    let base = q.base_alias();
    let first = &group[0];
    let default_fields = [Field::all()];
    let fields: &[Field] = if q.fields.is_empty() {
        &default_fields
    } else {
        &q.fields
    };
    let excluded = |name: &str| q.exclude.iter().any(|e| *e == name);

    let mut out = Record::new();
    for field in fields {
        match field {
            Field::All(alias) => {
                let alias = alias.unwrap_or(base);
                let row = first.iter().find(|(a, _)| *a == alias).and_then(|(_, r)| *r);
                match (row, q.table_for(alias)) {
                    (Some(rec), _) => {
                        for (k, v) in rec {
                            if !excluded(k) {
                                out.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    (None, Some(table)) => {
                        for c in table.columns {
                            if !excluded(c.name) {
                                out.insert(c.name.to_string(), Value::Null);
                            }
                        }
                    }
                    (None, None) => {}
                }
            }
            Field::Column { col, alias } => {
                out.insert(
                    alias.unwrap_or(col.name).to_string(),
                    lookup(first, base, col),
                );
            }
            Field::GroupConcat { col, alias } => {
                let parts: Vec<String> = group
                    .iter()
                    .filter_map(|r| value_text(&lookup(r, base, col)))
                    .collect();
                let value = if parts.is_empty() {
                    Value::Null
                } else {
                    Value::String(parts.join(","))
                };
                out.insert(alias.to_string(), value);
            }
        }
    }
    out
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// SQL 风格比较：NULL 不等于任何值；数字与数字字符串可比较
/// SQL-like equality: NULL equals nothing; numbers compare with numeric strings
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (value_as_i64(a), value_as_i64(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64().is_some() && a.as_f64() == b.as_f64(),
            }
        }
        _ => a == b,
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => value_text(a).cmp(&value_text(b)),
    }
}

/// 内存存储 / In-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入种子数据（不计入写日志）/ seed rows without touching the write log
    pub fn seed(&self, table: &TableMeta, rows: Vec<Record>) -> Result<()> {
        let mut state = self.shared.lock();
        for row in &rows {
            state.insert_row(table, row)?;
        }
        Ok(())
    }

    /// 表中当前全部行 / all rows currently in a table
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.shared.lock().table_rows(table).to_vec()
    }

    /// 已提交的写操作 / committed write statements
    pub fn write_log(&self) -> Vec<WriteOp> {
        self.shared.lock().log.clone()
    }

    pub fn writes_to(&self, table: &str) -> usize {
        self.shared
            .lock()
            .log
            .iter()
            .filter(|w| w.table == table)
            .count()
    }

    pub fn clear_log(&self) {
        self.shared.lock().log.clear();
    }

    /// 让指定表的写操作失败（故障注入）/ make writes to a table fail (fault injection)
    pub fn fail_writes_to(&self, table: &'static str) {
        self.shared.lock().failing.insert(table);
    }

    pub fn allow_writes_to(&self, table: &str) {
        self.shared.lock().failing.remove(table);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let state = self.shared.lock().snapshot();
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.shared),
            state,
            pending: Vec::new(),
        }))
    }

    fn executor(&self) -> Box<dyn Executor + '_> {
        Box::new(MemoryExecutor {
            shared: &self.shared,
        })
    }
}

/// 自动提交执行器 / autocommit executor
pub struct MemoryExecutor<'a> {
    shared: &'a Mutex<State>,
}

#[async_trait]
impl Executor for MemoryExecutor<'_> {
    async fn select(&mut self, q: &Select) -> Result<Vec<Record>> {
        Ok(self.shared.lock().select(q))
    }

    async fn count(&mut self, q: &Select) -> Result<u64> {
        Ok(self.shared.lock().count(q))
    }

    async fn insert(&mut self, table: &TableMeta, row: &Record) -> Result<i64> {
        self.shared.lock().insert(table, row)
    }

    async fn insert_many(&mut self, table: &TableMeta, rows: &[Record]) -> Result<u64> {
        self.shared.lock().insert_many(table, rows)
    }

    async fn update(
        &mut self,
        table: &TableMeta,
        filter: &[Predicate],
        set: &Record,
    ) -> Result<u64> {
        self.shared.lock().update(table, filter, set)
    }

    async fn delete(&mut self, table: &TableMeta, filter: &[Predicate]) -> Result<u64> {
        self.shared.lock().delete(table, filter)
    }
}

/// 事务内已执行的写操作 / write executed inside a transaction
#[derive(Debug, Clone)]
enum Pending {
    /// 含事务内分配 id 的完整行 / full rows with the ids assigned in the transaction
    Insert(TableMeta, Vec<Record>),
    Update(TableMeta, Vec<Predicate>, Record),
    Delete(TableMeta, Vec<Predicate>),
}

/// 内存事务 / in-memory transaction
pub struct MemoryTx {
    shared: Arc<Mutex<State>>,
    state: State,
    pending: Vec<Pending>,
}

#[async_trait]
impl Executor for MemoryTx {
    async fn select(&mut self, q: &Select) -> Result<Vec<Record>> {
        Ok(self.state.select(q))
    }

    async fn count(&mut self, q: &Select) -> Result<u64> {
        Ok(self.state.count(q))
    }

    async fn insert(&mut self, table: &TableMeta, row: &Record) -> Result<i64> {
        let id = self.state.insert(table, row)?;
        let rows = self.state.last_rows(table.name, 1);
        self.pending.push(Pending::Insert(*table, rows));
        Ok(id)
    }

    async fn insert_many(&mut self, table: &TableMeta, rows: &[Record]) -> Result<u64> {
        let n = self.state.insert_many(table, rows)?;
        if n > 0 {
            let rows = self.state.last_rows(table.name, n as usize);
            self.pending.push(Pending::Insert(*table, rows));
        }
        Ok(n)
    }

    async fn update(
        &mut self,
        table: &TableMeta,
        filter: &[Predicate],
        set: &Record,
    ) -> Result<u64> {
        let n = self.state.update(table, filter, set)?;
        self.pending
            .push(Pending::Update(*table, filter.to_vec(), set.clone()));
        Ok(n)
    }

    async fn delete(&mut self, table: &TableMeta, filter: &[Predicate]) -> Result<u64> {
        let n = self.state.delete(table, filter)?;
        self.pending.push(Pending::Delete(*table, filter.to_vec()));
        Ok(n)
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            shared, pending, ..
        } = *self;
        let mut guard = shared.lock();
        // 先在副本上重放，全部成功才替换 / replay on a copy, swap only if all succeed
        let mut next = guard.snapshot();
        for op in &pending {
            next.replay(op)?;
        }
        guard.tables = next.tables;
        guard.log.extend(next.log);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::model::{ColDefault, ColType, ColumnDef};
    use crate::db::query::JoinOp;
    use crate::db::store::fetch_one;
    use serde_json::json;

    const USER: &[ColumnDef] = &[
        ColumnDef::new("id", ColType::Int64),
        ColumnDef::new("name", ColType::Text),
        ColumnDef::new("deptId", ColType::Int64),
        ColumnDef::new("status", ColType::Int16).with_default(ColDefault::Int(1)),
    ];
    const DEPT: &[ColumnDef] = &[
        ColumnDef::new("id", ColType::Int64),
        ColumnDef::new("name", ColType::Text),
    ];
    const TAG: &[ColumnDef] = &[
        ColumnDef::new("id", ColType::Int64),
        ColumnDef::new("userId", ColType::Int64),
        ColumnDef::new("label", ColType::Text),
    ];

    fn t(name: &'static str, columns: &'static [ColumnDef]) -> TableMeta {
        TableMeta {
            name,
            group: "default",
            columns,
        }
    }

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap_or_default()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed(
                &t("dept", DEPT),
                vec![rec(json!({"id": 1, "name": "R&D"}))],
            )
            .unwrap();
        store
            .seed(
                &t("user", USER),
                vec![
                    rec(json!({"name": "alice", "deptId": 1})),
                    rec(json!({"name": "bob", "deptId": 2})),
                    rec(json!({"name": "carol"})),
                ],
            )
            .unwrap();
        store
            .seed(
                &t("tag", TAG),
                vec![
                    rec(json!({"userId": 1, "label": "x"})),
                    rec(json!({"userId": 1, "label": "y"})),
                    rec(json!({"userId": 2, "label": "z"})),
                ],
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_defaults() {
        let store = seeded();
        let rows = store.rows("user");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["id"], json!(3));
        assert_eq!(rows[2]["status"], json!(1));
        assert_eq!(rows[2]["deptId"], Value::Null);

        let id = store
            .executor()
            .insert(&t("user", USER), &rec(json!({"name": "dave", "deptId": "1"})))
            .await
            .unwrap();
        assert_eq!(id, 4);
        assert_eq!(store.rows("user")[3]["deptId"], json!(1));
        assert_eq!(store.writes_to("user"), 1);
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected() {
        let store = seeded();
        let err = store
            .executor()
            .insert(&t("user", USER), &rec(json!({"name": "x", "roleIdList": [1]})))
            .await;
        assert!(matches!(err, Err(DbError::Config(_))));
    }

    #[tokio::test]
    async fn test_left_join_group_concat() {
        let store = seeded();
        let q = Select::from(t("user", USER))
            .fields(vec![
                Field::all(),
                Field::col_as(Col::of("d", "name"), "deptName"),
                Field::group_concat(Col::of("g", "label"), "labels"),
            ])
            .exclude(&["status"])
            .join(JoinOp::left(
                t("dept", DEPT),
                "d",
                Col::new("deptId"),
                Col::of("d", "id"),
            ))
            .join(JoinOp::left(
                t("tag", TAG),
                "g",
                Col::new("id"),
                Col::of("g", "userId"),
            ))
            .group_by(Col::new("id"))
            .order_by(Col::new("id"), false);

        let rows = store.executor().select(&q).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["name"], json!("alice"));
        assert_eq!(rows[0]["deptName"], json!("R&D"));
        assert_eq!(rows[0]["labels"], json!("x,y"));
        assert!(rows[0].get("status").is_none());
        assert_eq!(rows[1]["deptName"], Value::Null);
        assert_eq!(rows[1]["labels"], json!("z"));
        assert_eq!(rows[2]["labels"], Value::Null);
        assert_eq!(store.executor().count(&q).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_keyword_and_in_filters() {
        let store = seeded();
        let q = Select::from(t("user", USER))
            .filter(Predicate::Keyword(vec![Col::new("name")], "AR".to_string()));
        let rows = store.executor().select(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("carol"));

        let q = Select::from(t("user", USER)).filter(Predicate::In(
            Col::new("deptId"),
            vec![json!("1"), json!(2)],
        ));
        assert_eq!(store.executor().count(&q).await.unwrap(), 2);

        let q = Select::from(t("user", USER)).filter(Predicate::In(Col::new("id"), vec![]));
        assert_eq!(store.executor().count(&q).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_order_and_paging() {
        let store = seeded();
        let q = Select::from(t("user", USER))
            .order_by(Col::new("id"), true)
            .offset(1)
            .limit(1);
        let rows = store.executor().select(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("bob"));
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let store = seeded();
        let users = t("user", USER);

        let mut tx = store.begin().await.unwrap();
        tx.delete(&users, &[Predicate::eq(Col::new("id"), 1)])
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.rows("user").len(), 3);
        assert_eq!(store.writes_to("user"), 0);

        let mut tx = store.begin().await.unwrap();
        let mut set = Record::new();
        set.insert("name".into(), json!("alicia"));
        let n = tx
            .update(&users, &[Predicate::eq(Col::new("id"), 1)], &set)
            .await
            .unwrap();
        assert_eq!(n, 1);
        // 未提交前外部不可见 / invisible outside until commit
        let outside = fetch_one(&mut *store.executor(), Select::from(users).where_eq("id", 1))
            .await
            .unwrap();
        assert_eq!(outside.unwrap()["name"], json!("alice"));
        tx.commit().await.unwrap();

        let after = fetch_one(&mut *store.executor(), Select::from(users).where_eq("id", 1))
            .await
            .unwrap();
        assert_eq!(after.unwrap()["name"], json!("alicia"));
        assert_eq!(
            store.write_log(),
            vec![WriteOp {
                table: "user",
                kind: WriteKind::Update,
                rows: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_interleaved_transactions_keep_each_other() {
        let store = seeded();
        let users = t("user", USER);
        let set = |k: &str, v: Value| {
            let mut r = Record::new();
            r.insert(k.to_string(), v);
            r
        };

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first
            .update(&users, &[Predicate::eq(Col::new("id"), 1)], &set("name", json!("alicia")))
            .await
            .unwrap();
        second
            .update(&users, &[Predicate::eq(Col::new("id"), 2)], &set("name", json!("robert")))
            .await
            .unwrap();
        // 事务开启后的自动提交写入 / autocommit write after both began
        store
            .executor()
            .update(&users, &[Predicate::eq(Col::new("id"), 3)], &set("deptId", json!(1)))
            .await
            .unwrap();
        second.commit().await.unwrap();
        first.commit().await.unwrap();

        let rows = store.rows("user");
        assert_eq!(rows[0]["name"], json!("alicia"));
        assert_eq!(rows[1]["name"], json!("robert"));
        assert_eq!(rows[2]["deptId"], json!(1));
        assert_eq!(store.writes_to("user"), 3);
    }

    #[tokio::test]
    async fn test_commit_conflicting_insert_id_is_rejected() {
        let store = seeded();
        let tags = t("tag", TAG);
        let mut tx = store.begin().await.unwrap();
        let id = tx
            .insert(&tags, &rec(json!({"userId": 3, "label": "w"})))
            .await
            .unwrap();
        let other = store
            .executor()
            .insert(&tags, &rec(json!({"userId": 2, "label": "v"})))
            .await
            .unwrap();
        assert_eq!(id, other);

        assert!(matches!(tx.commit().await, Err(DbError::Tx(_))));
        assert_eq!(store.rows("tag").len(), 4);
    }

    #[tokio::test]
    async fn test_fail_writes_to() {
        let store = seeded();
        store.fail_writes_to("tag");
        let err = store
            .executor()
            .delete(&t("tag", TAG), &[Predicate::eq(Col::new("userId"), 1)])
            .await;
        assert!(matches!(err, Err(DbError::Write(_))));
        assert_eq!(store.rows("tag").len(), 3);
        store.allow_writes_to("tag");
        let n = store
            .executor()
            .delete(&t("tag", TAG), &[Predicate::eq(Col::new("userId"), 1)])
            .await
            .unwrap();
        assert_eq!(n, 2);
    }
}
