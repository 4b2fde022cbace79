/// 模块管理
/// 包含所有业务模块的定义和导出
pub mod base;

use actix_web::web;

/// 配置所有模块的路由 / configure routes of every module
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    base::configure_base_routes(cfg);
}
