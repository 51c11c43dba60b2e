pub mod config;
pub mod errors;
pub mod gateway;
pub mod logging;
