pub mod cli;
pub mod controller;
pub mod error;
pub mod execution;
pub mod modules;
pub mod telemetry;
pub mod utils;
