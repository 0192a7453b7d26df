pub mod app;
pub mod clock;
pub mod config;
pub mod models;
pub mod sanitize;
pub mod store;
pub mod window;
