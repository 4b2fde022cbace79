pub mod base_sys_user;
