use async_trait::async_trait;

use crate::db::error::Result;
use crate::db::model::{Record, TableMeta};
use crate::db::query::{Predicate, Select};

/// 表格存储操作（连接池自动提交或事务内执行）
/// Tabular store operations, run in autocommit mode or inside a transaction
///
/// `update` / `delete` 的过滤条件只引用目标表的列。
/// Filters passed to `update` / `delete` reference columns of the target table only.
#[async_trait]
pub trait Executor: Send {
    async fn select(&mut self, q: &Select) -> Result<Vec<Record>>;

    /// 满足条件的行数（分组后计数）/ number of result rows, counted after grouping
    async fn count(&mut self, q: &Select) -> Result<u64>;

    /// 插入一行并返回主键 / insert one row and return its id
    async fn insert(&mut self, table: &TableMeta, row: &Record) -> Result<i64>;

    async fn insert_many(&mut self, table: &TableMeta, rows: &[Record]) -> Result<u64>;

    async fn update(&mut self, table: &TableMeta, filter: &[Predicate], set: &Record)
        -> Result<u64>;

    async fn delete(&mut self, table: &TableMeta, filter: &[Predicate]) -> Result<u64>;
}

/// 写事务；未提交即丢弃时回滚
/// Write transaction; dropping it without commit rolls it back
#[async_trait]
pub trait Transaction: Executor {
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 存储入口 / Store entry point
#[async_trait]
pub trait Store: Send + Sync {
    /// 开启事务 / Begin transaction
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// 自动提交执行器 / autocommit executor
    fn executor(&self) -> Box<dyn Executor + '_>;
}

/// 读取第一行 / Fetch the first row
pub async fn fetch_one<E: Executor + ?Sized>(exec: &mut E, q: Select) -> Result<Option<Record>> {
    let mut rows = exec.select(&q.limit(1)).await?;
    Ok(if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(0))
    })
}
