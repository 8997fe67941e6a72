pub mod app;
pub mod browser;
pub mod cli;
pub mod console;
pub mod core;
pub mod extract;
pub mod logger;
pub mod modules;
pub mod utils;
pub mod workflow;
