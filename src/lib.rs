pub mod app;
pub mod config;
pub mod logging;
pub mod ollama;
pub mod session;
pub mod ui;
