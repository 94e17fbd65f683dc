pub mod app;
pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod core;
pub mod detector;
pub mod display;
pub mod document;
pub mod input;
pub mod launcher;
pub mod logging;
pub mod providers;
pub mod session;
