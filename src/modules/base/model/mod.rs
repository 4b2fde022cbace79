pub mod base_sys_department;
pub mod base_sys_role;
pub mod base_sys_user;
pub mod base_sys_user_role;

pub use base_sys_department::BaseSysDepartment;
pub use base_sys_role::BaseSysRole;
pub use base_sys_user::BaseSysUser;
pub use base_sys_user_role::BaseSysUserRole;
