pub mod config;
pub mod logging;
pub mod shortcuts;
pub mod ui;
