//! Configuration module
//!
//! Dispatcher settings, display preferences and shortcut overrides, stored
//! as TOML in the user's config directory.

#[allow(clippy::module_inception)]
pub mod config;

pub use config::{Config, CustomShortcut, DispatchConfig, DisplayConfig, ShortcutConfig};
