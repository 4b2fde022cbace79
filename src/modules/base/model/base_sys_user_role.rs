// 用户角色关联 / User-role association
use v::service::Association;
use v::{impl_table_meta, ColType, ColumnDef, ModelSpec, TableMeta};

pub const TABLE_NAME: &str = "base_sys_user_role";
pub const GROUP_NAME: &str = "default";

pub const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", ColType::Int64),
    ColumnDef::new("userId", ColType::Int64),
    ColumnDef::new("roleId", ColType::Int64),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BaseSysUserRole;

impl_table_meta!(BaseSysUserRole, TABLE_NAME, GROUP_NAME);

impl ModelSpec for BaseSysUserRole {
    fn columns() -> &'static [ColumnDef] {
        COLUMNS
    }
}

impl BaseSysUserRole {
    pub fn meta() -> TableMeta {
        TableMeta::of::<Self>()
    }

    /// 用户 -> 角色 集合关系 / user -> role set relation
    pub fn association() -> Association {
        Association::new(Self::meta(), "userId", "roleId")
    }
}
