// 部门模型（被用户引用）/ Department model, referenced by users
use v::{impl_table_meta, ColType, ColumnDef, ModelSpec, TableMeta};

pub const TABLE_NAME: &str = "base_sys_department";
pub const GROUP_NAME: &str = "default";

pub const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", ColType::Int64),
    ColumnDef::new("createTime", ColType::Timestamp),
    ColumnDef::new("updateTime", ColType::Timestamp),
    ColumnDef::new("name", ColType::Text),
    ColumnDef::new("parentId", ColType::Int64),
    ColumnDef::new("orderNum", ColType::Int64),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BaseSysDepartment;

impl_table_meta!(BaseSysDepartment, TABLE_NAME, GROUP_NAME);

impl ModelSpec for BaseSysDepartment {
    fn columns() -> &'static [ColumnDef] {
        COLUMNS
    }
}

impl BaseSysDepartment {
    pub fn meta() -> TableMeta {
        TableMeta::of::<Self>()
    }
}
