use serde::{Deserialize, Serialize};

use super::action::ShortcutAction;
use super::key_event::{normalize_key, Modifiers};
use super::notation::{format_sequence, parse_notation, to_notation};
use super::registry::RegistryError;
use super::scope::Scope;

/// Ordered key identifiers of a shortcut.
///
/// One key is a plain shortcut; two or more form a chord ("g" then "h").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySequence(Vec<String>);

impl KeySequence {
    pub fn new(keys: Vec<String>) -> Self {
        Self(keys.iter().map(|k| normalize_key(k)).collect())
    }

    pub fn single(key: &str) -> Self {
        Self(vec![normalize_key(key)])
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_chord(&self) -> bool {
        self.0.len() > 1
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Whether `pressed` is exactly this sequence
    pub fn matches(&self, pressed: &[String]) -> bool {
        self.0.as_slice() == pressed
    }
}

/// One declarative shortcut rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortcutDefinition {
    pub key_sequence: KeySequence,
    pub modifiers: Modifiers,
    pub action: ShortcutAction,
    pub scope: Scope,
    pub disabled: bool,
    pub description: String,
}

impl ShortcutDefinition {
    pub fn new(
        key_sequence: KeySequence,
        modifiers: Modifiers,
        action: ShortcutAction,
        scope: Scope,
        description: &str,
    ) -> Self {
        Self {
            key_sequence,
            modifiers,
            action,
            scope,
            disabled: false,
            description: description.to_string(),
        }
    }

    /// Build a definition from notation such as `"ctrl+s"` or `"g h"`
    pub fn parse(
        notation: &str,
        action: ShortcutAction,
        scope: Scope,
        description: &str,
    ) -> Result<Self, RegistryError> {
        let (key_sequence, modifiers) = parse_notation(notation)?;
        Ok(Self::new(key_sequence, modifiers, action, scope, description))
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    pub fn is_chord(&self) -> bool {
        self.key_sequence.is_chord()
    }

    pub fn notation(&self) -> String {
        to_notation(&self.key_sequence, &self.modifiers)
    }

    pub fn display_keys(&self) -> String {
        format_sequence(&self.key_sequence, &self.modifiers)
    }

    /// Two enabled definitions collide when they can both be candidates in the
    /// same scope and are triggered by the same keys.
    pub fn conflicts_with(&self, other: &ShortcutDefinition) -> bool {
        if self.disabled || other.disabled {
            return false;
        }

        let shares_scope =
            self.scope == other.scope || self.scope.is_global() || other.scope.is_global();

        // Chords ignore modifiers when matching, so they collide on keys alone
        let same_trigger = if self.is_chord() {
            self.key_sequence == other.key_sequence
        } else {
            self.key_sequence == other.key_sequence && self.modifiers == other.modifiers
        };

        shares_scope && same_trigger
    }
}
