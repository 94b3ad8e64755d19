pub mod commands;
pub mod config;
pub mod core;
pub mod models;
pub mod utils;
