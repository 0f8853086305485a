use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::shortcuts::{
    DispatchOptions, RegistryError, Scope, ShortcutAction, ShortcutDefinition, ShortcutRegistry,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub display: DisplayConfig,
    pub shortcuts: ShortcutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Process shortcuts at startup
    pub enabled: bool,

    /// How long to wait for the next key of a chord (milliseconds)
    pub sequence_timeout_ms: u64,

    /// Pin the dispatcher to a scope instead of following the active region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_scope: Option<Scope>,

    /// Only dispatch these actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<Vec<ShortcutAction>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show recent key presses in the debugger
    pub show_key_indicator: bool,

    /// Entries kept in the debugger's action and key history
    pub max_history: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    /// Built-in actions whose shortcuts are switched off
    pub disabled: Vec<ShortcutAction>,

    /// Extra shortcuts on top of the built-in catalog
    pub custom: Vec<CustomShortcut>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomShortcut {
    /// Key notation, e.g. "ctrl+shift+d" or "g o"
    pub keys: String,
    pub action: ShortcutAction,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Disable the built-in bindings of this action in the same scope
    #[serde(default)]
    pub replace: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sequence_timeout_ms: 1000,
            initial_scope: None,
            allowed_actions: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_key_indicator: true,
            max_history: 20,
        }
    }
}

impl Config {
    /// Load config from the default location, writing defaults if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            info!(target: "config", "Created default config at {}", config_path.display());
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!(target: "config", "Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("canvapet-keys").join("config.toml"))
    }

    /// Built-in catalog with this config's overrides applied
    pub fn build_registry(&self) -> Result<ShortcutRegistry, RegistryError> {
        let mut definitions = ShortcutRegistry::builtin()?.into_definitions();

        for def in definitions.iter_mut() {
            if self.shortcuts.disabled.contains(&def.action) {
                def.disabled = true;
            }
        }

        for custom in &self.shortcuts.custom {
            if custom.replace {
                for def in definitions
                    .iter_mut()
                    .filter(|d| d.action == custom.action && d.scope == custom.scope)
                {
                    def.disabled = true;
                }
            }

            let description = custom
                .description
                .clone()
                .unwrap_or_else(|| custom.action.to_string());
            definitions.push(ShortcutDefinition::parse(
                &custom.keys,
                custom.action,
                custom.scope,
                &description,
            )?);
        }

        ShortcutRegistry::new(definitions)
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        let mut options = DispatchOptions::default()
            .with_enabled(self.dispatch.enabled)
            .with_sequence_timeout(Duration::from_millis(self.dispatch.sequence_timeout_ms));
        if let Some(scope) = self.dispatch.initial_scope {
            options = options.with_scope(scope);
        }
        if let Some(allowed) = &self.dispatch.allowed_actions {
            options = options.with_allowed_actions(allowed.iter().copied());
        }
        options
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# canvapet-keys configuration
# Location: ~/.config/canvapet-keys/config.toml (Linux)
#           ~/Library/Application Support/canvapet-keys/config.toml (macOS)
#           %APPDATA%\canvapet-keys\config.toml (Windows)

[dispatch]
# Process shortcuts at startup
enabled = true

# How long to wait for the second key of a chord such as "g h" (milliseconds)
sequence_timeout_ms = 1000

# Pin the dispatcher to one scope instead of following the active region
# Scopes: "global", "navigation", "customization", "gallery", "checkout"
# initial_scope = "gallery"

# Only dispatch these actions (everything else is matched but not delivered)
# allowed_actions = ["show-help", "close-dialog"]

[display]
# Show recent key presses in the debugger
show_key_indicator = true

# Entries kept in the debugger's history panels
max_history = 20

[shortcuts]
# Switch off built-in shortcuts by action name
# disabled = ["toggle-theme"]
disabled = []

# Extra shortcuts. Notation: "ctrl+shift+d", "alt+arrowleft", "g o"
# Set replace = true to turn off the built-in bindings of the same action
# in that scope.
#
# [[shortcuts.custom]]
# keys = "ctrl+shift+d"
# action = "download-image"
# scope = "gallery"
# description = "Download the current portrait"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.dispatch.enabled);
        assert_eq!(config.dispatch.sequence_timeout_ms, 1000);
        assert!(config.dispatch.initial_scope.is_none());
        assert!(config.shortcuts.custom.is_empty());
    }

    #[test]
    fn test_commented_default_parses_to_default() {
        let parsed: Config = toml::from_str(&Config::create_default_with_comments()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[dispatch]\nsequence_timeout_ms = 600\n").unwrap();
        assert_eq!(parsed.dispatch.sequence_timeout_ms, 600);
        assert!(parsed.dispatch.enabled);
        assert_eq!(parsed.display.max_history, 20);
    }

    #[test]
    fn test_disabled_actions_applied() {
        let mut config = Config::default();
        config.shortcuts.disabled.push(ShortcutAction::ToggleTheme);
        let registry = config.build_registry().unwrap();
        let defs = registry.for_action(ShortcutAction::ToggleTheme);
        assert!(!defs.is_empty());
        assert!(defs.iter().all(|d| d.disabled));
    }

    #[test]
    fn test_custom_shortcut_added() {
        let config: Config = toml::from_str(
            r#"
[[shortcuts.custom]]
keys = "g o"
action = "navigate-cart"
scope = "navigation"
"#,
        )
        .unwrap();
        let registry = config.build_registry().unwrap();
        let custom = registry
            .all()
            .iter()
            .find(|d| d.notation() == "g o")
            .expect("custom shortcut present");
        assert_eq!(custom.action, ShortcutAction::NavigateCart);
        assert_eq!(custom.description, "navigate-cart");
    }

    #[test]
    fn test_custom_conflict_rejected() {
        let config: Config = toml::from_str(
            r#"
[[shortcuts.custom]]
keys = "ctrl+s"
action = "download-image"
scope = "customization"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(RegistryError::Conflict { .. })
        ));
    }

    #[test]
    fn test_custom_replace_disables_builtin() {
        let config: Config = toml::from_str(
            r#"
[[shortcuts.custom]]
keys = "ctrl+shift+s"
action = "save-pet"
scope = "customization"
replace = true
"#,
        )
        .unwrap();
        let registry = config.build_registry().unwrap();
        let enabled: Vec<_> = registry
            .for_action(ShortcutAction::SavePet)
            .into_iter()
            .filter(|d| d.is_enabled())
            .map(|d| d.notation())
            .collect();
        assert_eq!(enabled, vec!["ctrl+shift+s".to_string()]);
    }

    #[test]
    fn test_bad_notation_reported() {
        let config: Config = toml::from_str(
            r#"
[[shortcuts.custom]]
keys = "hyper+x"
action = "undo"
scope = "customization"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(RegistryError::InvalidNotation { .. })
        ));
    }

    #[test]
    fn test_dispatch_options() {
        let mut config = Config::default();
        config.dispatch.initial_scope = Some(Scope::Gallery);
        config.dispatch.allowed_actions = Some(vec![ShortcutAction::NextImage]);
        config.dispatch.sequence_timeout_ms = 750;

        let options = config.dispatch_options();
        assert_eq!(options.scope, Some(Scope::Gallery));
        assert_eq!(options.sequence_timeout, Duration::from_millis(750));
        assert!(options
            .allowed_actions
            .unwrap()
            .contains(&ShortcutAction::NextImage));
    }
}
