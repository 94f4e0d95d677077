pub mod config;
pub mod devices;
pub mod history;
pub mod record;
