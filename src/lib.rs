pub mod app;
pub mod domain;
pub mod feed;
pub mod infra;
pub mod ports;
