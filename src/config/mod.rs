pub mod env;
mod loader;

pub use env::{ApiConfig, AppConfig, DirectoryConfig, MarkerConfig, PageConfig};
pub use loader::load_config;
