pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod events;
pub mod logging;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod toast;
