pub mod adb;
pub mod background;
pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
