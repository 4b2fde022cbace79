//! 通用资源服务 / generic resource service
//!
//! `Service` 持有表配置与存储，提供基础 CRUD；`ResourceService` 提供
//! 带钩子的默认流程，具体资源按需覆盖钩子。
//! `Service` holds table configuration and the store and performs plain CRUD;
//! `ResourceService` runs the hooked default flows that resources override.

pub mod association;
pub mod error;
pub mod page;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::ctx::RequestCtx;
use crate::db::model::{now_timestamp, Record, TableMeta};
use crate::db::query::{Col, Field, JoinOp, Predicate, Select};
use crate::db::store::{fetch_one, Executor, Store, Transaction};

pub use association::{Association, MemberDiff, SyncOutcome};
pub use error::{Result, ServiceError};
pub use page::{PageParams, PageResult, Pagination};

pub type WhereFn = Box<dyn Fn(&RequestCtx) -> Vec<Predicate> + Send + Sync>;
pub type ExtendFn = Box<dyn Fn(&RequestCtx, Select) -> Select + Send + Sync>;

/// 列表/分页查询配置 / list and page query configuration
#[derive(Default)]
pub struct QueryOp {
    pub alias: Option<&'static str>,
    pub fields: Vec<Field>,
    pub exclude: Vec<&'static str>,
    pub joins: Vec<JoinOp>,
    pub keyword_fields: Vec<Col>,
    pub where_fn: Option<WhereFn>,
    pub extend: Option<ExtendFn>,
}

impl QueryOp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn exclude(mut self, cols: &[&'static str]) -> Self {
        self.exclude.extend_from_slice(cols);
        self
    }

    pub fn join(mut self, join: JoinOp) -> Self {
        self.joins.push(join);
        self
    }

    /// 关键字搜索列（参数 `keyWord`）/ keyword search columns (param `keyWord`)
    pub fn keyword_fields(mut self, cols: Vec<Col>) -> Self {
        self.keyword_fields = cols;
        self
    }

    pub fn where_fn(
        mut self,
        f: impl Fn(&RequestCtx) -> Vec<Predicate> + Send + Sync + 'static,
    ) -> Self {
        self.where_fn = Some(Box::new(f));
        self
    }

    /// 分组/排序等收尾调整 / final shaping such as grouping and ordering
    pub fn extend(mut self, f: impl Fn(&RequestCtx, Select) -> Select + Send + Sync + 'static) -> Self {
        self.extend = Some(Box::new(f));
        self
    }
}

/// 资源配置 / per-resource configuration
pub struct ServiceConfig {
    pub table: TableMeta,
    /// Info 不返回的列 / columns Info never returns
    pub info_ignore_property: Vec<&'static str>,
    pub add_ignore_property: Vec<&'static str>,
    pub update_ignore_property: Vec<&'static str>,
    /// 唯一列 -> 重复提示 / unique column -> duplicate message
    pub unique_key: Vec<(&'static str, &'static str)>,
    pub page_query_op: QueryOp,
}

impl ServiceConfig {
    pub fn new(table: TableMeta) -> Self {
        Self {
            table,
            info_ignore_property: Vec::new(),
            add_ignore_property: vec!["id", "createTime", "updateTime"],
            update_ignore_property: vec!["id", "createTime", "updateTime"],
            unique_key: Vec::new(),
            page_query_op: QueryOp::default(),
        }
    }

    pub fn info_ignore(mut self, cols: &[&'static str]) -> Self {
        self.info_ignore_property.extend_from_slice(cols);
        self
    }

    pub fn add_ignore(mut self, cols: &[&'static str]) -> Self {
        self.add_ignore_property.extend_from_slice(cols);
        self
    }

    pub fn update_ignore(mut self, cols: &[&'static str]) -> Self {
        self.update_ignore_property.extend_from_slice(cols);
        self
    }

    pub fn unique(mut self, col: &'static str, message: &'static str) -> Self {
        self.unique_key.push((col, message));
        self
    }

    pub fn page_query(mut self, op: QueryOp) -> Self {
        self.page_query_op = op;
        self
    }
}

/// 基础 CRUD / plain CRUD over one table
pub struct Service {
    config: ServiceConfig,
    store: Arc<dyn Store>,
}

impl Service {
    pub fn new(config: ServiceConfig, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn table(&self) -> &TableMeta {
        &self.config.table
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// 仅保留表中存在且未被忽略的列，并按列类型转换
    /// Keep known, non-ignored columns converted to their column type
    pub fn writable(&self, params: &Record, ignore: &[&'static str]) -> Result<Record> {
        let mut row = Record::new();
        for (k, v) in params {
            if ignore.iter().any(|i| *i == k.as_str()) {
                continue;
            }
            let Some(col) = self.config.table.column(k) else {
                continue;
            };
            let value = col
                .coerce(v)
                .ok_or_else(|| ServiceError::Validation(format!("invalid value for {}", k)))?;
            row.insert(k.clone(), value);
        }
        Ok(row)
    }

    /// 唯一键校验；`exclude_id` 为更新时排除的自身行
    /// Unique key check; `exclude_id` skips the row being updated
    pub async fn check_unique<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        row: &Record,
        exclude_id: Option<i64>,
    ) -> Result<()> {
        for &(col, message) in &self.config.unique_key {
            let Some(value) = row.get(col).filter(|v| !v.is_null()) else {
                continue;
            };
            let mut q = Select::from(self.config.table).where_eq(col, value.clone());
            if let Some(id) = exclude_id {
                q = q.filter(Predicate::Ne(Col::new("id"), Value::from(id)));
            }
            if exec.count(&q).await? > 0 {
                return Err(ServiceError::Validation(message.to_string()));
            }
        }
        Ok(())
    }

    fn stamp(&self, row: &mut Record, created: bool) {
        let table = &self.config.table;
        if created && table.has_column("createTime") {
            row.insert("createTime".to_string(), now_timestamp());
        }
        if table.has_column("updateTime") {
            row.insert("updateTime".to_string(), now_timestamp());
        }
    }

    #[instrument(skip(self, params), fields(table = self.config.table.name))]
    pub async fn add(&self, params: &Record) -> Result<i64> {
        let mut row = self.writable(params, &self.config.add_ignore_property)?;
        let mut exec = self.store.executor();
        self.check_unique(&mut *exec, &row, None).await?;
        self.stamp(&mut row, true);
        let id = exec.insert(&self.config.table, &row).await?;
        info!(id, "row added");
        Ok(id)
    }

    /// 按 id 读取（排除 info 忽略列）/ read by id without info-ignored columns
    pub async fn info(&self, id: i64) -> Result<Option<Record>> {
        let q = Select::from(self.config.table)
            .exclude(&self.config.info_ignore_property)
            .where_eq("id", id);
        Ok(fetch_one(&mut *self.store.executor(), q).await?)
    }

    /// 读取完整行 / read the full row
    pub async fn find_in<E: Executor + ?Sized>(&self, exec: &mut E, id: i64) -> Result<Option<Record>> {
        let q = Select::from(self.config.table).where_eq("id", id);
        Ok(fetch_one(exec, q).await?)
    }

    #[instrument(skip(self, exec, params), fields(table = self.config.table.name))]
    pub async fn update_in<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        id: i64,
        params: &Record,
    ) -> Result<u64> {
        let mut row = self.writable(params, &self.config.update_ignore_property)?;
        self.check_unique(exec, &row, Some(id)).await?;
        self.stamp(&mut row, false);
        let n = exec
            .update(&self.config.table, &[Predicate::eq(Col::new("id"), id)], &row)
            .await?;
        debug!(id, columns = row.len(), "row updated");
        Ok(n)
    }

    pub async fn delete_in<E: Executor + ?Sized>(&self, exec: &mut E, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let n = exec
            .delete(&self.config.table, &[Predicate::in_ids(Col::new("id"), ids)])
            .await?;
        info!(table = self.config.table.name, ?ids, deleted = n, "rows deleted");
        Ok(n)
    }

    /// 组装列表查询 / build the list query
    pub fn build_query(&self, ctx: &RequestCtx) -> Select {
        let op = &self.config.page_query_op;
        let table = self.config.table;
        let mut q = Select::from(table)
            .fields(op.fields.clone())
            .exclude(&op.exclude);
        if let Some(alias) = op.alias {
            q = q.alias(alias);
        }
        for join in &op.joins {
            q = q.join(join.clone());
        }
        if let Some(keyword) = ctx.get_str("keyWord") {
            if !op.keyword_fields.is_empty() {
                q = q.filter(Predicate::Keyword(op.keyword_fields.clone(), keyword.to_string()));
            }
        }
        if let Some(where_fn) = &op.where_fn {
            for p in where_fn(ctx) {
                q = q.filter(p);
            }
        }
        if let Some(extend) = &op.extend {
            q = extend(ctx, q);
        }

        if q.order_by.is_empty() {
            // 排序列只接受主表列 / order only by base table columns
            let desc = !matches!(ctx.get_str("sort"), Some(s) if s.eq_ignore_ascii_case("asc"));
            match ctx.get_str("order").and_then(|o| table.column(o)) {
                Some(col) => q = q.order_by(Col::new(col.name), desc),
                None => {
                    if table.has_column("createTime") {
                        q = q.order_by(Col::new("createTime"), true);
                    }
                    if table.has_column("id") {
                        q = q.order_by(Col::new("id"), true);
                    }
                }
            }
        }
        debug!(table = table.name, filters = q.filters.len(), "list query built");
        q
    }

    pub async fn list(&self, ctx: &RequestCtx) -> Result<Vec<Record>> {
        let q = self.build_query(ctx);
        Ok(self.store.executor().select(&q).await?)
    }

    pub async fn page(&self, ctx: &RequestCtx) -> Result<PageResult> {
        let params = PageParams::from_ctx(ctx);
        let q = self.build_query(ctx);
        let mut exec = self.store.executor();
        let total = exec.count(&q).await?;
        let list = exec
            .select(&q.offset(params.offset()).limit(params.size))
            .await?;
        Ok(PageResult {
            list,
            pagination: Pagination {
                page: params.page,
                size: params.size,
                total,
            },
        })
    }
}

/// 写操作钩子载荷 / payload handed to modify hooks
#[derive(Debug, Clone, PartialEq)]
pub enum ModifyOp {
    Add { params: Record },
    /// `current` 为事务内读取的原始行 / `current` is the row read inside the transaction
    Update {
        id: i64,
        current: Record,
        params: Record,
    },
    Delete { ids: Vec<i64> },
}

fn kind_changed() -> ServiceError {
    ServiceError::Validation("modify hook changed the operation kind".to_string())
}

/// 带钩子的资源流程 / hooked resource flows
///
/// 默认实现覆盖 Add/Info/Update/Delete/List/Page；资源只需实现 `base`
/// 并按需覆盖钩子。
/// Defaults cover Add/Info/Update/Delete/List/Page; a resource implements
/// `base` and overrides the hooks it needs.
#[async_trait]
pub trait ResourceService: Send + Sync {
    fn base(&self) -> &Service;

    /// 写前钩子，可修改载荷或中止 / before-write hook, may rewrite or abort
    async fn modify_before(&self, _ctx: &RequestCtx, _op: &mut ModifyOp) -> Result<()> {
        Ok(())
    }

    /// 提交后钩子 / after-commit hook
    async fn modify_after(&self, _ctx: &RequestCtx, _op: &ModifyOp) -> Result<()> {
        Ok(())
    }

    /// 更新目标 id / id targeted by Update
    fn update_target(&self, ctx: &RequestCtx) -> Result<i64> {
        ctx.get_i64("id")
            .ok_or_else(|| ServiceError::Validation("id is required".to_string()))
    }

    /// 在更新事务内追加写入 / extra writes inside the update transaction
    async fn update_extend(
        &self,
        _ctx: &RequestCtx,
        _tx: &mut dyn Transaction,
        _op: &ModifyOp,
    ) -> Result<()> {
        Ok(())
    }

    /// Info 与 Update 返回的行 / row returned by Info and Update
    async fn info_by_id(&self, id: i64) -> Result<Option<Record>> {
        self.base().info(id).await
    }

    async fn service_add(&self, ctx: &RequestCtx) -> Result<Value> {
        let mut op = ModifyOp::Add {
            params: ctx.params.clone(),
        };
        self.modify_before(ctx, &mut op).await?;
        let id = match &op {
            ModifyOp::Add { params } => self.base().add(params).await?,
            _ => return Err(kind_changed()),
        };
        self.modify_after(ctx, &op).await?;
        Ok(json!({ "id": id }))
    }

    async fn service_info(&self, ctx: &RequestCtx) -> Result<Option<Record>> {
        let id = ctx
            .get_i64("id")
            .ok_or_else(|| ServiceError::Validation("id is required".to_string()))?;
        self.info_by_id(id).await
    }

    async fn service_update(&self, ctx: &RequestCtx) -> Result<Record> {
        let id = self.update_target(ctx)?;
        let base = self.base();

        let mut tx = base.store().begin().await?;
        let current = base
            .find_in(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("record {} not found", id)))?;
        let mut op = ModifyOp::Update {
            id,
            current,
            params: ctx.params.clone(),
        };
        self.modify_before(ctx, &mut op).await?;
        match &op {
            ModifyOp::Update { params, .. } => {
                base.update_in(&mut *tx, id, params).await?;
            }
            _ => return Err(kind_changed()),
        }
        self.update_extend(ctx, &mut *tx, &op).await?;
        tx.commit().await?;
        info!(table = base.table().name, id, "update committed");

        self.modify_after(ctx, &op).await?;
        self.info_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("record {} not found", id)))
    }

    async fn service_delete(&self, ctx: &RequestCtx) -> Result<()> {
        let ids = ctx
            .get_i64_list("ids")
            .ok_or_else(|| ServiceError::Validation("ids is required".to_string()))?;
        let mut op = ModifyOp::Delete { ids };
        self.modify_before(ctx, &mut op).await?;
        let ids = match &op {
            ModifyOp::Delete { ids } => ids.clone(),
            _ => return Err(kind_changed()),
        };
        if ids.is_empty() {
            return Ok(());
        }

        let base = self.base();
        let mut tx = base.store().begin().await?;
        base.delete_in(&mut *tx, &ids).await?;
        tx.commit().await?;

        // 提交后清理，失败仅记录 / post-commit cleanup, failures are only logged
        if let Err(e) = self.modify_after(ctx, &op).await {
            warn!(table = base.table().name, ?ids, error = %e, "delete cleanup failed");
        }
        Ok(())
    }

    async fn service_list(&self, ctx: &RequestCtx) -> Result<Vec<Record>> {
        self.base().list(ctx).await
    }

    async fn service_page(&self, ctx: &RequestCtx) -> Result<PageResult> {
        self.base().page(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::model::{ColType, ColumnDef};

    const ITEM: &[ColumnDef] = &[
        ColumnDef::new("id", ColType::Int64),
        ColumnDef::new("code", ColType::Text),
        ColumnDef::new("level", ColType::Int16),
        ColumnDef::new("secret", ColType::Text),
        ColumnDef::new("createTime", ColType::Timestamp),
        ColumnDef::new("updateTime", ColType::Timestamp),
    ];

    fn table() -> TableMeta {
        TableMeta {
            name: "item",
            group: "default",
            columns: ITEM,
        }
    }

    struct Items {
        base: Service,
    }

    impl ResourceService for Items {
        fn base(&self) -> &Service {
            &self.base
        }
    }

    fn items(store: Arc<MemoryStore>) -> Items {
        let config = ServiceConfig::new(table())
            .info_ignore(&["secret"])
            .unique("code", "duplicate code")
            .page_query(QueryOp::new().keyword_fields(vec![Col::new("code")]));
        Items {
            base: Service::new(config, store),
        }
    }

    fn ctx(v: Value) -> RequestCtx {
        RequestCtx::from_json(None, v)
    }

    #[tokio::test]
    async fn test_add_info_update_delete() {
        let store = Arc::new(MemoryStore::new());
        let svc = items(store.clone());

        let out = svc
            .service_add(&ctx(json!({"code": "a", "secret": "s", "bogus": 1, "id": 99})))
            .await
            .unwrap();
        assert_eq!(out, json!({"id": 1}));
        let dup = svc.service_add(&ctx(json!({"code": "a"}))).await;
        assert!(matches!(dup, Err(ServiceError::Validation(m)) if m == "duplicate code"));

        let row = svc.service_info(&ctx(json!({"id": 1}))).await.unwrap().unwrap();
        assert!(row.get("secret").is_none());
        assert!(row["createTime"].is_string());

        svc.service_add(&ctx(json!({"code": "b"}))).await.unwrap();
        let clash = svc.service_update(&ctx(json!({"id": 1, "code": "b"}))).await;
        assert!(matches!(clash, Err(ServiceError::Validation(_))));
        // 自身值不算重复 / keeping its own value is not a duplicate
        let row = svc
            .service_update(&ctx(json!({"id": 1, "code": "a"})))
            .await
            .unwrap();
        assert_eq!(row["code"], json!("a"));

        let missing = svc.service_update(&ctx(json!({"id": 42}))).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        svc.service_delete(&ctx(json!({"ids": [1, 2]}))).await.unwrap();
        assert!(store.rows("item").is_empty());
    }

    #[tokio::test]
    async fn test_page_and_order() {
        let store = Arc::new(MemoryStore::new());
        let svc = items(store);
        for code in ["x1", "x2", "y1"] {
            svc.service_add(&ctx(json!({ "code": code }))).await.unwrap();
        }

        let page = svc
            .service_page(&ctx(json!({"keyWord": "X", "page": 1, "size": 1})))
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.list.len(), 1);
        // 默认最新在前 / newest first by default
        assert_eq!(page.list[0]["code"], json!("x2"));

        let list = svc
            .service_list(&ctx(json!({"order": "code", "sort": "asc"})))
            .await
            .unwrap();
        let codes: Vec<&str> = list.iter().filter_map(|r| r["code"].as_str()).collect();
        assert_eq!(codes, vec!["x1", "x2", "y1"]);

        let list = svc
            .service_list(&ctx(json!({"order": "no_such; DROP", "sort": "asc"})))
            .await
            .unwrap();
        assert_eq!(list.len(), 3);
    }

    #[tokio::test]
    async fn test_mistyped_values_are_rejected_before_writing() {
        let store = Arc::new(MemoryStore::new());
        let svc = items(store.clone());
        svc.service_add(&ctx(json!({"code": "a", "level": "3"}))).await.unwrap();
        assert_eq!(store.rows("item")[0]["level"], json!(3));
        store.clear_log();

        let bad_add = svc.service_add(&ctx(json!({"code": "b", "level": "high"}))).await;
        assert!(matches!(bad_add, Err(ServiceError::Validation(m)) if m == "invalid value for level"));

        let bad_update = svc
            .service_update(&ctx(json!({"id": 1, "level": 70000})))
            .await;
        assert!(matches!(bad_update, Err(ServiceError::Validation(_))));
        assert_eq!(store.rows("item")[0]["level"], json!(3));
        assert!(store.write_log().is_empty());

        // 数字写入文本列按字符串保存 / numbers written to text columns become strings
        svc.service_update(&ctx(json!({"id": 1, "code": 42}))).await.unwrap();
        assert_eq!(store.rows("item")[0]["code"], json!("42"));
    }
}
