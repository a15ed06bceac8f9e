pub mod brone;
pub mod devices;
pub mod readings;
pub mod schedule;
pub mod settings;
pub mod tasks;
pub mod ws_handler;
