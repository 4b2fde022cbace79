pub mod conf;
pub mod error;
pub mod middleware;
#[path = "bootstrap/app_bootstrap.rs"]
pub mod app_bootstrap;
#[path = "bootstrap/command_registry.rs"]
pub mod command_registry;

// Modules
pub mod modules;

// Re-export bootstrap modules
pub use app_bootstrap::*;
pub use command_registry::*;
