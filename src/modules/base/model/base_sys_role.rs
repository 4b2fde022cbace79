// 角色模型（此模块只读）/ Role model, read-only here
use v::{impl_table_meta, ColType, ColumnDef, ModelSpec, TableMeta};

pub const TABLE_NAME: &str = "base_sys_role";
pub const GROUP_NAME: &str = "default";

pub const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", ColType::Int64),
    ColumnDef::new("createTime", ColType::Timestamp),
    ColumnDef::new("updateTime", ColType::Timestamp),
    ColumnDef::new("name", ColType::Text),
    ColumnDef::new("label", ColType::Text),
    ColumnDef::new("remark", ColType::Text),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BaseSysRole;

impl_table_meta!(BaseSysRole, TABLE_NAME, GROUP_NAME);

impl ModelSpec for BaseSysRole {
    fn columns() -> &'static [ColumnDef] {
        COLUMNS
    }
}

impl BaseSysRole {
    pub fn meta() -> TableMeta {
        TableMeta::of::<Self>()
    }
}
