use serde::{Deserialize, Serialize};

use crate::ctx::RequestCtx;
use crate::db::model::Record;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// 分页参数：`page` 从 1 开始，`size` 默认 20、最大 100
/// Paging params: `page` starts at 1, `size` defaults to 20 and caps at 100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub size: u64,
}

impl PageParams {
    pub fn from_ctx(ctx: &RequestCtx) -> Self {
        let page = ctx.get_i64("page").filter(|p| *p >= 1).unwrap_or(1) as u64;
        let size = ctx
            .get_i64("size")
            .filter(|s| *s >= 1)
            .map(|s| (s as u64).min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, size }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub size: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub list: Vec<Record>,
    pub pagination: Pagination,
}
