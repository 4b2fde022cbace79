use actix_web::web;

use crate::modules::base::controller::admin;

/// base 模块路由 / base module routes
pub fn configure_base_routes(cfg: &mut web::ServiceConfig) {
    admin::base_sys_user::register(cfg, "/admin/base/sys/user");
}
