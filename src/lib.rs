pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod shutdown;
pub mod store;
