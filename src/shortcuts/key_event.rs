use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::notation::format_key;

/// Modifier state of a key press or a shortcut definition.
///
/// Matching is exact: a flag that is `false` on a definition means the
/// modifier must *not* be held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::NONE
        }
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn meta() -> Self {
        Self {
            meta: true,
            ..Self::NONE
        }
    }

    pub fn ctrl_shift() -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Self::NONE
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// True when ctrl, alt or meta is held. Shift alone does not count,
    /// since shift is part of ordinary typing.
    pub fn has_command_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }

    pub fn from_crossterm(mods: KeyModifiers) -> Self {
        Self {
            ctrl: mods.contains(KeyModifiers::CONTROL),
            alt: mods.contains(KeyModifiers::ALT),
            shift: mods.contains(KeyModifiers::SHIFT),
            meta: mods.intersects(KeyModifiers::SUPER | KeyModifiers::META),
        }
    }
}

/// Description of the element that had focus when a key was pressed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTarget {
    /// Lower-cased element tag, `None` when nothing in particular has focus
    pub tag_name: Option<String>,
    /// Raw value of the `contenteditable` attribute, if present
    pub content_editable: Option<String>,
}

impl EventTarget {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn element(tag: &str) -> Self {
        Self {
            tag_name: Some(tag.to_ascii_lowercase()),
            content_editable: None,
        }
    }

    pub fn with_content_editable(mut self, value: &str) -> Self {
        self.content_editable = Some(value.to_string());
        self
    }

    /// Inputs, textareas, selects and editable content receive plain key
    /// presses as text entry.
    pub fn is_typing_element(&self) -> bool {
        if let Some(tag) = self.tag_name.as_deref() {
            if matches!(tag, "input" | "textarea" | "select") {
                return true;
            }
        }

        match self.content_editable.as_deref() {
            Some(value) => value != "false",
            None => false,
        }
    }
}

/// A single key-down event as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    /// Normalized key identifier (see [`normalize_key`])
    pub key: String,
    pub modifiers: Modifiers,
    pub target: EventTarget,
    default_prevented: bool,
}

impl KeyPress {
    pub fn new(key: &str) -> Self {
        Self {
            key: normalize_key(key),
            modifiers: Modifiers::NONE,
            target: EventTarget::none(),
            default_prevented: false,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.modifiers.meta = true;
        self
    }

    pub fn on(mut self, target: EventTarget) -> Self {
        self.target = target;
        self
    }

    /// Suppress the host's default handling of this key
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Convert a terminal key event.
    ///
    /// Returns `None` for release/repeat events and for keys that have no
    /// shortcut identifier (media keys, modifier-only presses, ...).
    pub fn from_crossterm(event: &KeyEvent, target: EventTarget) -> Option<Self> {
        if event.kind != KeyEventKind::Press {
            return None;
        }

        let mut modifiers = Modifiers::from_crossterm(event.modifiers);
        let key = match event.code {
            KeyCode::Char(c) => {
                // Shift is already baked into symbols like '?' or '!'
                if !c.is_alphabetic() {
                    modifiers.shift = false;
                }
                if c == ' ' {
                    "space".to_string()
                } else {
                    c.to_string()
                }
            }
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Esc => "escape".to_string(),
            KeyCode::Backspace => "backspace".to_string(),
            KeyCode::Tab => "tab".to_string(),
            KeyCode::BackTab => {
                modifiers.shift = true;
                "tab".to_string()
            }
            KeyCode::Delete => "delete".to_string(),
            KeyCode::Insert => "insert".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::PageUp => "pageup".to_string(),
            KeyCode::PageDown => "pagedown".to_string(),
            KeyCode::Up => "arrowup".to_string(),
            KeyCode::Down => "arrowdown".to_string(),
            KeyCode::Left => "arrowleft".to_string(),
            KeyCode::Right => "arrowright".to_string(),
            KeyCode::F(n) => format!("f{}", n),
            _ => return None,
        };

        Some(Self {
            key: normalize_key(&key),
            modifiers,
            target,
            default_prevented: false,
        })
    }
}

impl fmt::Display for KeyPress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_key(&self.key, &self.modifiers))
    }
}

/// Normalize a key identifier so that `"S"`, `"s"` and `"Esc"`/`"Escape"`
/// compare equal.
pub fn normalize_key(raw: &str) -> String {
    if raw == " " {
        return "space".to_string();
    }

    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "esc" => "escape".to_string(),
        "return" => "enter".to_string(),
        "del" => "delete".to_string(),
        "up" => "arrowup".to_string(),
        "down" => "arrowdown".to_string(),
        "left" => "arrowleft".to_string(),
        "right" => "arrowright".to_string(),
        "pgup" => "pageup".to_string(),
        "pgdn" => "pagedown".to_string(),
        "plus" => "+".to_string(),
        _ => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_elements() {
        assert!(EventTarget::element("INPUT").is_typing_element());
        assert!(EventTarget::element("textarea").is_typing_element());
        assert!(EventTarget::element("select").is_typing_element());
        assert!(EventTarget::element("div")
            .with_content_editable("true")
            .is_typing_element());
        assert!(EventTarget::element("div")
            .with_content_editable("")
            .is_typing_element());
        assert!(!EventTarget::element("div")
            .with_content_editable("false")
            .is_typing_element());
        assert!(!EventTarget::element("button").is_typing_element());
        assert!(!EventTarget::none().is_typing_element());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("S"), "s");
        assert_eq!(normalize_key("Esc"), "escape");
        assert_eq!(normalize_key("Escape"), "escape");
        assert_eq!(normalize_key(" "), "space");
        assert_eq!(normalize_key("ArrowUp"), "arrowup");
    }

    #[test]
    fn test_from_crossterm_char_with_ctrl() {
        let event = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        let press = KeyPress::from_crossterm(&event, EventTarget::none()).unwrap();
        assert_eq!(press.key, "s");
        assert_eq!(press.modifiers, Modifiers::ctrl());
    }

    #[test]
    fn test_from_crossterm_symbol_drops_shift() {
        let event = KeyEvent::new(KeyCode::Char('?'), KeyModifiers::SHIFT);
        let press = KeyPress::from_crossterm(&event, EventTarget::none()).unwrap();
        assert_eq!(press.key, "?");
        assert!(press.modifiers.is_empty());
    }

    #[test]
    fn test_from_crossterm_uppercase_letter_keeps_shift() {
        let event = KeyEvent::new(KeyCode::Char('Z'), KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        let press = KeyPress::from_crossterm(&event, EventTarget::none()).unwrap();
        assert_eq!(press.key, "z");
        assert_eq!(press.modifiers, Modifiers::ctrl_shift());
    }

    #[test]
    fn test_from_crossterm_ignores_unmapped_keys() {
        let event = KeyEvent::new(KeyCode::Null, KeyModifiers::NONE);
        assert!(KeyPress::from_crossterm(&event, EventTarget::none()).is_none());
    }

    #[test]
    fn test_prevent_default() {
        let mut press = KeyPress::new("s").with_ctrl();
        assert!(!press.is_default_prevented());
        press.prevent_default();
        assert!(press.is_default_prevented());
        assert_eq!(press.to_string(), "Ctrl+s");
    }
}
