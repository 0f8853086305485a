use thiserror::Error;
use tracing::debug;

use super::action::ShortcutAction;
use super::definition::ShortcutDefinition;
use super::scope::Scope;

/// Configuration errors detected while building a registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{keys}' is bound to both {first} and {second} in scope {scope}")]
    Conflict {
        first: ShortcutAction,
        second: ShortcutAction,
        scope: Scope,
        keys: String,
    },

    #[error("shortcut for {action} has an empty key sequence")]
    EmptySequence { action: ShortcutAction },

    #[error("invalid key notation '{notation}': {reason}")]
    InvalidNotation { notation: String, reason: String },
}

/// The fixed catalog of shortcut definitions.
///
/// Built once at startup and read-only afterwards; every constructor
/// validates that matching is deterministic.
#[derive(Debug, Clone)]
pub struct ShortcutRegistry {
    definitions: Vec<ShortcutDefinition>,
}

impl ShortcutRegistry {
    pub fn new(definitions: Vec<ShortcutDefinition>) -> Result<Self, RegistryError> {
        validate(&definitions)?;
        debug!(target: "shortcuts", "Registry built with {} definitions", definitions.len());
        Ok(Self { definitions })
    }

    /// The catalog shipped with the application
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(builtin_definitions()?)
    }

    /// Every definition, in insertion order
    pub fn all(&self) -> &[ShortcutDefinition] {
        &self.definitions
    }

    /// Definitions declared for exactly `scope`; global ones are not included
    /// unless `scope` is itself global.
    pub fn by_scope(&self, scope: Scope) -> Vec<&ShortcutDefinition> {
        self.definitions
            .iter()
            .filter(|def| def.scope == scope)
            .collect()
    }

    /// Enabled definitions eligible while `scope` is active
    pub fn candidates(&self, scope: Scope) -> impl Iterator<Item = &ShortcutDefinition> {
        self.definitions
            .iter()
            .filter(move |def| def.is_enabled() && (def.scope.is_global() || def.scope == scope))
    }

    /// Definitions bound to `action`, in any scope
    pub fn for_action(&self, action: ShortcutAction) -> Vec<&ShortcutDefinition> {
        self.definitions
            .iter()
            .filter(|def| def.action == action)
            .collect()
    }

    /// Length of the longest enabled key sequence; a pending buffer longer
    /// than this can no longer complete a chord
    pub fn longest_sequence(&self) -> usize {
        self.definitions
            .iter()
            .filter(|def| def.is_enabled())
            .map(|def| def.key_sequence.len())
            .max()
            .unwrap_or(1)
            .max(1)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Consume the registry, returning its definitions for rebuilding
    pub fn into_definitions(self) -> Vec<ShortcutDefinition> {
        self.definitions
    }
}

fn validate(definitions: &[ShortcutDefinition]) -> Result<(), RegistryError> {
    for def in definitions {
        if def.key_sequence.is_empty() {
            return Err(RegistryError::EmptySequence { action: def.action });
        }
    }

    for (i, first) in definitions.iter().enumerate() {
        for second in &definitions[i + 1..] {
            if first.conflicts_with(second) {
                // Report the narrower scope, that is where matching would be ambiguous
                let scope = if first.scope.is_global() {
                    second.scope
                } else {
                    first.scope
                };
                return Err(RegistryError::Conflict {
                    first: first.action,
                    second: second.action,
                    scope,
                    keys: first.notation(),
                });
            }
        }
    }

    Ok(())
}

fn builtin_definitions() -> Result<Vec<ShortcutDefinition>, RegistryError> {
    use ShortcutAction::*;

    let table: &[(&str, ShortcutAction, Scope, &str)] = &[
        // Global
        ("?", ShowHelp, Scope::Global, "Show keyboard shortcuts"),
        ("ctrl+shift+l", ToggleTheme, Scope::Global, "Toggle light/dark theme"),
        ("/", FocusSearch, Scope::Global, "Focus the search box"),
        ("escape", CloseDialog, Scope::Global, "Close the open dialog"),
        // Navigation chords
        ("g h", NavigateHome, Scope::Navigation, "Go to home"),
        ("g g", NavigateGallery, Scope::Navigation, "Go to gallery"),
        ("g c", NavigateCreate, Scope::Navigation, "Go to create portrait"),
        ("g t", NavigateCart, Scope::Navigation, "Go to cart"),
        ("g a", NavigateAccount, Scope::Navigation, "Go to account"),
        ("alt+arrowleft", GoBack, Scope::Navigation, "Go back"),
        // Customization
        ("ctrl+s", SavePet, Scope::Customization, "Save pet portrait"),
        ("ctrl+z", Undo, Scope::Customization, "Undo last change"),
        ("ctrl+shift+z", Redo, Scope::Customization, "Redo last change"),
        ("ctrl+y", Redo, Scope::Customization, "Redo last change"),
        ("ctrl+r", ResetCustomization, Scope::Customization, "Reset all customizations"),
        ("arrowright", NextStyle, Scope::Customization, "Next art style"),
        ("arrowleft", PreviousStyle, Scope::Customization, "Previous art style"),
        ("+", ZoomIn, Scope::Customization, "Zoom in"),
        ("-", ZoomOut, Scope::Customization, "Zoom out"),
        ("b", ToggleBackground, Scope::Customization, "Toggle background"),
        // Gallery
        ("arrowright", NextImage, Scope::Gallery, "Next image"),
        ("arrowleft", PreviousImage, Scope::Gallery, "Previous image"),
        ("j", NextImage, Scope::Gallery, "Next image"),
        ("k", PreviousImage, Scope::Gallery, "Previous image"),
        ("enter", OpenImage, Scope::Gallery, "Open image"),
        ("ctrl+d", DownloadImage, Scope::Gallery, "Download image"),
        ("ctrl+shift+s", ShareImage, Scope::Gallery, "Share image"),
        ("delete", DeleteImage, Scope::Gallery, "Delete image"),
        ("f", ToggleFavorite, Scope::Gallery, "Toggle favorite"),
        // Checkout
        ("ctrl+enter", ProceedToCheckout, Scope::Checkout, "Proceed to checkout"),
        ("backspace", BackToCart, Scope::Checkout, "Back to cart"),
    ];

    table
        .iter()
        .map(|(notation, action, scope, description)| {
            ShortcutDefinition::parse(notation, *action, *scope, description)
        })
        .collect()
}
