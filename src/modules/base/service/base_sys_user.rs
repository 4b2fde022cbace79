// 系统用户服务 / System user service
//
// 在通用资源流程上增加：密码摘要与版本、超级管理员保护、
// 角色列表同步、部门迁移。
// Adds password digest and versioning, superadmin protection, role list
// sync and department moves on top of the generic resource flow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument, warn};
use v::service::{
    Association, ModifyOp, QueryOp, ResourceService, Result, Service, ServiceConfig, ServiceError,
};
use v::{
    value_as_i64, value_as_i64_list, Cache, Col, Field, JoinOp, PasswordHasher, Predicate, Record,
    RequestCtx, Store, Transaction,
};

use crate::modules::base::model::{BaseSysDepartment, BaseSysRole, BaseSysUser, BaseSysUserRole};

/// 默认超级管理员 id / default superadmin id
pub const DEFAULT_SUPER_ADMIN_ID: i64 = 1;

/// 密码版本缓存键前缀 / password version cache key prefix
pub const PASSWORD_VERSION_KEY: &str = "admin:passwordVersion:";

pub fn password_version_key(user_id: i64) -> String {
    format!("{}{}", PASSWORD_VERSION_KEY, user_id)
}

/// 请求中的明文口令：标量按文本处理，空串视为未提供
/// Plaintext password from a request: scalars read as text, empty means absent
fn password_text(params: &Record) -> Result<Option<String>> {
    let text = match params.get("password") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        Some(_) => return Err(ServiceError::Validation("password must be text".to_string())),
    };
    Ok(Some(text).filter(|t| !t.is_empty()))
}

pub struct BaseSysUserService {
    base: Service,
    cache: Arc<dyn Cache>,
    hasher: Arc<dyn PasswordHasher>,
    user_roles: Association,
    super_admin_id: i64,
}

impl BaseSysUserService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            base: Service::new(Self::config(), store),
            cache,
            hasher,
            user_roles: BaseSysUserRole::association(),
            super_admin_id: DEFAULT_SUPER_ADMIN_ID,
        }
    }

    pub fn with_super_admin(mut self, id: i64) -> Self {
        self.super_admin_id = id;
        self
    }

    pub fn super_admin_id(&self) -> i64 {
        self.super_admin_id
    }

    fn config() -> ServiceConfig {
        // 列表：部门名 + 逗号拼接角色名，按用户分组
        // List: department name plus comma-joined role names, grouped per user
        let page_query = QueryOp::new()
            .alias("a")
            .fields(vec![
                Field::all(),
                Field::col_as(Col::of("dept", "name"), "departmentName"),
                Field::group_concat(Col::of("role", "name"), "roleName"),
            ])
            .exclude(&["password"])
            .join(JoinOp::left(
                BaseSysDepartment::meta(),
                "dept",
                Col::new("departmentId"),
                Col::of("dept", "id"),
            ))
            .join(JoinOp::left(
                BaseSysUserRole::meta(),
                "ur",
                Col::new("id"),
                Col::of("ur", "userId"),
            ))
            .join(JoinOp::left(
                BaseSysRole::meta(),
                "role",
                Col::of("ur", "roleId"),
                Col::of("role", "id"),
            ))
            .keyword_fields(vec![
                Col::new("name"),
                Col::new("username"),
                Col::new("nickName"),
            ])
            .where_fn(|ctx| {
                ctx.get_i64_list("departmentIds")
                    .filter(|ids| !ids.is_empty())
                    .map(|ids| vec![Predicate::in_ids(Col::new("departmentId"), &ids)])
                    .unwrap_or_default()
            })
            .extend(|_, q| q.group_by(Col::new("id")).group_by(Col::of("dept", "name")));

        ServiceConfig::new(BaseSysUser::meta())
            .info_ignore(&["password"])
            .unique("username", "duplicate username")
            .page_query(page_query)
    }

    fn caller_id(ctx: &RequestCtx) -> Result<i64> {
        ctx.admin_id()
            .ok_or_else(|| ServiceError::Validation("caller identity is required".to_string()))
    }

    /// 当前登录用户信息（不含密码）/ the caller's own row without password
    #[instrument(skip(self, ctx))]
    pub async fn person(&self, ctx: &RequestCtx) -> Result<Option<Record>> {
        let id = Self::caller_id(ctx)?;
        self.base.info(id).await
    }

    /// 批量迁移部门（单条语句，不校验部门存在）
    /// Move users to a department in one statement, without checking the department
    #[instrument(skip(self, ctx))]
    pub async fn move_users(&self, ctx: &RequestCtx) -> Result<u64> {
        let department_id = ctx
            .get_i64("departmentId")
            .ok_or_else(|| ServiceError::Validation("departmentId is required".to_string()))?;
        let user_ids = ctx
            .get_i64_list("userIds")
            .ok_or_else(|| ServiceError::Validation("userIds is required".to_string()))?;
        if user_ids.is_empty() {
            return Ok(0);
        }

        let mut set = Record::new();
        set.insert("departmentId".to_string(), Value::from(department_id));
        let moved = self
            .base
            .store()
            .executor()
            .update(
                self.base.table(),
                &[Predicate::in_ids(Col::new("id"), &user_ids)],
                &set,
            )
            .await?;
        info!(department_id, moved, "users moved");
        Ok(moved)
    }

    /// 密码变更处理：摘要不同则写入新摘要并递增版本，否则不写密码
    /// Store a new digest and bump the version when the digest differs; otherwise drop the password
    fn apply_password(&self, current: &Record, params: &mut Record) -> Result<()> {
        let requested = password_text(params)?.map(|p| self.hasher.hash(&p));
        let stored = current.get("password").and_then(Value::as_str).unwrap_or("");
        match requested {
            Some(hashed) if hashed != stored => {
                let version = current
                    .get("passwordV")
                    .and_then(value_as_i64)
                    .unwrap_or(0)
                    + 1;
                params.insert("password".to_string(), Value::String(hashed));
                params.insert("passwordV".to_string(), Value::from(version));
            }
            _ => {
                params.remove("password");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceService for BaseSysUserService {
    fn base(&self) -> &Service {
        &self.base
    }

    /// 未给 id 时更新调用者本人；给了无效 id 直接拒绝
    /// Without an id the caller is updated; an unreadable id is rejected
    fn update_target(&self, ctx: &RequestCtx) -> Result<i64> {
        match ctx.param("id") {
            None => Self::caller_id(ctx)
                .map_err(|_| ServiceError::Validation("id is required".to_string())),
            Some(v) => value_as_i64(v)
                .ok_or_else(|| ServiceError::Validation("invalid id".to_string())),
        }
    }

    async fn modify_before(&self, _ctx: &RequestCtx, op: &mut ModifyOp) -> Result<()> {
        match op {
            ModifyOp::Add { params } => {
                params.remove("passwordV");
                match password_text(params)? {
                    Some(p) => {
                        params.insert("password".to_string(), Value::String(self.hasher.hash(&p)));
                    }
                    None => {
                        params.remove("password");
                    }
                }
            }
            ModifyOp::Update {
                id,
                current,
                params,
            } => {
                params.remove("passwordV");
                let disabling = params.get("status").and_then(value_as_i64) == Some(0);
                if *id == self.super_admin_id && disabling {
                    return Err(ServiceError::Forbidden(
                        "superadmin cannot be disabled".to_string(),
                    ));
                }
                self.apply_password(current, params)?;
            }
            ModifyOp::Delete { ids } => {
                if !ids.is_empty() && ids.iter().all(|id| *id == self.super_admin_id) {
                    return Err(ServiceError::Forbidden(
                        "superadmin cannot be deleted".to_string(),
                    ));
                }
                ids.retain(|id| *id != self.super_admin_id);
            }
        }
        Ok(())
    }

    async fn update_extend(
        &self,
        _ctx: &RequestCtx,
        tx: &mut dyn Transaction,
        op: &ModifyOp,
    ) -> Result<()> {
        let ModifyOp::Update { id, params, .. } = op else {
            return Ok(());
        };
        let requested = match params.get("roleIdList").filter(|v| !v.is_null()) {
            None => None,
            Some(v) => Some(value_as_i64_list(v).ok_or_else(|| {
                ServiceError::Validation("roleIdList must be a list of ids".to_string())
            })?),
        };
        let outcome = self
            .user_roles
            .sync(tx, *id, requested.as_deref())
            .await?;
        tracing::debug!(user_id = id, ?outcome, "role sync");
        Ok(())
    }

    async fn modify_after(&self, _ctx: &RequestCtx, op: &ModifyOp) -> Result<()> {
        match op {
            ModifyOp::Update { id, params, .. } => {
                // 仅在提交后写缓存 / cache write only after commit
                if let Some(version) = params.get("passwordV").and_then(value_as_i64) {
                    let key = password_version_key(*id);
                    if let Err(e) = self.cache.set(&key, Value::from(version), Duration::ZERO).await {
                        warn!(user_id = id, error = %e, "password version cache write failed");
                    }
                }
            }
            ModifyOp::Delete { ids } => {
                let removed = self
                    .user_roles
                    .remove_owners(&mut *self.base.store().executor(), ids)
                    .await?;
                info!(?ids, removed, "user roles removed");
            }
            ModifyOp::Add { .. } => {}
        }
        Ok(())
    }

    async fn info_by_id(&self, id: i64) -> Result<Option<Record>> {
        let Some(mut row) = self.base.info(id).await? else {
            return Ok(None);
        };
        let roles = self
            .user_roles
            .members(&mut *self.base.store().executor(), id)
            .await?;
        row.insert("roleIdList".to_string(), Value::from(roles));
        Ok(Some(row))
    }
}
