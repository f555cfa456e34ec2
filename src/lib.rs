pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod logging;
pub mod maintenance;
