//! 多对多关联同步 / many-to-many association sync
//!
//! 关联视为集合：先算差异，无差异不写；有差异则在调用方事务内
//! 删除该 owner 的全部行后批量插入请求集合。
//! The relation is a set: compute the diff first and write nothing when it is
//! empty; otherwise delete every row of the owner and bulk insert the requested
//! set inside the caller's transaction.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::db::error::Result;
use crate::db::model::{value_as_i64, Record, TableMeta};
use crate::db::query::{Col, Field, Predicate, Select};
use crate::db::store::Executor;

/// 成员差异 / member diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDiff {
    pub to_add: Vec<i64>,
    pub to_remove: Vec<i64>,
}

impl MemberDiff {
    pub fn compute(current: &[i64], requested: &[i64]) -> Self {
        let current: BTreeSet<i64> = current.iter().copied().collect();
        let requested: BTreeSet<i64> = requested.iter().copied().collect();
        Self {
            to_add: requested.difference(&current).copied().collect(),
            to_remove: current.difference(&requested).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// 同步结果 / what a sync did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// 未请求变更 / no change requested
    Skipped,
    /// 集合相同，未写入 / same set, nothing written
    Unchanged,
    Replaced { added: Vec<i64>, removed: Vec<i64> },
}

/// 关联表描述 / association table descriptor
#[derive(Debug, Clone, Copy)]
pub struct Association {
    pub table: TableMeta,
    pub owner_col: &'static str,
    pub member_col: &'static str,
}

impl Association {
    pub const fn new(table: TableMeta, owner_col: &'static str, member_col: &'static str) -> Self {
        Self {
            table,
            owner_col,
            member_col,
        }
    }

    /// owner 当前成员（升序去重）/ current members of an owner, sorted and deduplicated
    pub async fn members<E: Executor + ?Sized>(&self, exec: &mut E, owner: i64) -> Result<Vec<i64>> {
        let q = Select::from(self.table)
            .field(Field::Column {
                col: Col::new(self.member_col),
                alias: None,
            })
            .where_eq(self.owner_col, owner);
        let rows = exec.select(&q).await?;
        let set: BTreeSet<i64> = rows
            .iter()
            .filter_map(|r| r.get(self.member_col).and_then(value_as_i64))
            .collect();
        Ok(set.into_iter().collect())
    }

    /// 将 owner 的成员同步为 `requested`；`None` 表示跳过
    /// Reconcile the owner's members to `requested`; `None` skips
    pub async fn sync<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        owner: i64,
        requested: Option<&[i64]>,
    ) -> Result<SyncOutcome> {
        let Some(requested) = requested else {
            return Ok(SyncOutcome::Skipped);
        };
        let current = self.members(exec, owner).await?;
        let diff = MemberDiff::compute(&current, requested);
        if diff.is_empty() {
            tracing::debug!(table = self.table.name, owner, "association unchanged");
            return Ok(SyncOutcome::Unchanged);
        }

        self.remove_owners(exec, &[owner]).await?;
        let wanted: BTreeSet<i64> = requested.iter().copied().collect();
        let rows: Vec<Record> = wanted.iter().map(|m| self.row(owner, *m)).collect();
        exec.insert_many(&self.table, &rows).await?;
        tracing::info!(
            table = self.table.name,
            owner,
            added = ?diff.to_add,
            removed = ?diff.to_remove,
            "association replaced"
        );
        Ok(SyncOutcome::Replaced {
            added: diff.to_add,
            removed: diff.to_remove,
        })
    }

    /// 删除多个 owner 的全部关联行 / delete every row of the given owners
    pub async fn remove_owners<E: Executor + ?Sized>(&self, exec: &mut E, owners: &[i64]) -> Result<u64> {
        if owners.is_empty() {
            return Ok(0);
        }
        exec.delete(
            &self.table,
            &[Predicate::in_ids(Col::new(self.owner_col), owners)],
        )
        .await
    }

    fn row(&self, owner: i64, member: i64) -> Record {
        let mut row = Record::new();
        row.insert(self.owner_col.to_string(), Value::from(owner));
        row.insert(self.member_col.to_string(), Value::from(member));
        row
    }
}
