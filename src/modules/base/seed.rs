// 内存模式初始数据 / seed data for `--memory` runs
use serde_json::{json, Value};
use v::{MemoryStore, PasswordHasher, Record};

use crate::modules::base::model::{BaseSysDepartment, BaseSysRole, BaseSysUser, BaseSysUserRole};

/// 初始管理员口令 / initial superadmin password
pub const INITIAL_ADMIN_PASSWORD: &str = "123456";

fn rows(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

pub fn seed_memory_store(store: &MemoryStore, hasher: &dyn PasswordHasher) -> v::Result<()> {
    store.seed(
        &BaseSysDepartment::meta(),
        rows(vec![
            json!({"id": 1, "name": "COOL", "orderNum": 0}),
            json!({"id": 11, "name": "开发", "parentId": 1, "orderNum": 0}),
            json!({"id": 12, "name": "测试", "parentId": 1, "orderNum": 1}),
        ]),
    )?;
    store.seed(
        &BaseSysRole::meta(),
        rows(vec![
            json!({"id": 1, "name": "超管", "label": "admin"}),
            json!({"id": 10, "name": "系统管理员", "label": "admin-sys"}),
            json!({"id": 11, "name": "游客", "label": "visitor"}),
        ]),
    )?;
    store.seed(
        &BaseSysUser::meta(),
        rows(vec![json!({
            "id": 1,
            "departmentId": 1,
            "name": "超级管理员",
            "username": "admin",
            "password": hasher.hash(INITIAL_ADMIN_PASSWORD),
            "nickName": "admin",
            "createTime": "2024-01-01 00:00:00",
            "updateTime": "2024-01-01 00:00:00",
        })]),
    )?;
    store.seed(
        &BaseSysUserRole::meta(),
        rows(vec![json!({"userId": 1, "roleId": 1})]),
    )?;
    Ok(())
}
