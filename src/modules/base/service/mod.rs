pub mod base_sys_user;

pub use base_sys_user::BaseSysUserService;
