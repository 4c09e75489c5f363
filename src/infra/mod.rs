pub mod config;
pub mod logging;
pub mod memory_bus;
pub mod postgres_repo;
pub mod reqwest_http;
pub mod system_clock;
