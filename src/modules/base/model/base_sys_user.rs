// 系统用户模型 / System user model
use v::{impl_table_meta, ColDefault, ColType, ColumnDef, ModelSpec, TableMeta};

pub const TABLE_NAME: &str = "base_sys_user";
pub const GROUP_NAME: &str = "default";

/// 列定义；`passwordV` 与 `status` 默认 1
/// Columns; `passwordV` and `status` default to 1
pub const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", ColType::Int64),
    ColumnDef::new("createTime", ColType::Timestamp),
    ColumnDef::new("updateTime", ColType::Timestamp),
    ColumnDef::new("departmentId", ColType::Int64),
    ColumnDef::new("name", ColType::Text),
    ColumnDef::new("username", ColType::Text),
    ColumnDef::new("password", ColType::Text),
    ColumnDef::new("passwordV", ColType::Int64).with_default(ColDefault::Int(1)),
    ColumnDef::new("nickName", ColType::Text),
    ColumnDef::new("headImg", ColType::Text),
    ColumnDef::new("phone", ColType::Text),
    ColumnDef::new("email", ColType::Text),
    ColumnDef::new("remark", ColType::Text),
    ColumnDef::new("status", ColType::Int16).with_default(ColDefault::Int(1)),
];

/// 行以 `Record` 流转，此类型只承载表元数据
/// Rows travel as `Record`; this type only carries table metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseSysUser;

impl_table_meta!(BaseSysUser, TABLE_NAME, GROUP_NAME);

impl ModelSpec for BaseSysUser {
    fn columns() -> &'static [ColumnDef] {
        COLUMNS
    }
}

impl BaseSysUser {
    pub fn meta() -> TableMeta {
        TableMeta::of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_columns() {
        let meta = BaseSysUser::meta();
        assert_eq!(meta.name, TABLE_NAME);
        assert!(meta.column("password").is_some());
        assert!(meta.column("roleIdList").is_none());
    }
}
