pub mod cli;
pub mod config;
pub mod core;
pub mod directory;
pub mod drivers;
pub mod engine;
pub mod enumerate;
pub mod health;
pub mod platform;
pub mod stats;
pub mod ui;
