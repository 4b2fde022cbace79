#[cfg(feature = "postgres")]
pub mod connection;
pub mod error;
pub mod memory;
pub mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod query;
pub mod store;
