/// Base 模块：系统用户、角色、部门
/// Base module: system users, roles and departments
pub mod controller;
pub mod model;
pub mod routes;
pub mod seed;
pub mod service;

pub use routes::configure_base_routes;
