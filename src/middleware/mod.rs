/// 中间件 / middleware
pub mod identity;
