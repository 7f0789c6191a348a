pub mod axis;
pub mod backend;
pub mod command_executor;
pub mod communication;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod state_monitor;
pub mod status;
