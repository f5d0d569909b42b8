pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod package;
pub mod render;
pub mod telemetry;
