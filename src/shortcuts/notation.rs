//! Textual shortcut notation.
//!
//! A notation is one or more whitespace separated steps. A single step may
//! carry modifiers joined with `+`:
//!
//! * `"s"`, `"?"`, `"escape"`: plain keys
//! * `"ctrl+s"`, `"ctrl+shift+z"`: modifier-qualified keys
//! * `"g h"`: a chord, pressed one after the other
//!
//! Chords are matched without looking at modifiers, so a chord step may not
//! carry any.

use super::definition::KeySequence;
use super::key_event::{normalize_key, Modifiers};
use super::registry::RegistryError;

/// Parse a notation string into a key sequence and its modifiers
pub fn parse_notation(notation: &str) -> Result<(KeySequence, Modifiers), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidNotation {
        notation: notation.to_string(),
        reason: reason.to_string(),
    };

    let steps: Vec<&str> = notation.split_whitespace().collect();
    if steps.is_empty() {
        return Err(invalid("empty key sequence"));
    }

    if steps.len() == 1 {
        let (key, modifiers) = parse_step(steps[0]).map_err(|reason| invalid(&reason))?;
        return Ok((KeySequence::single(&key), modifiers));
    }

    let mut keys = Vec::with_capacity(steps.len());
    for step in steps {
        let (key, modifiers) = parse_step(step).map_err(|reason| invalid(&reason))?;
        if !modifiers.is_empty() {
            return Err(invalid("modifiers are not allowed inside a chord"));
        }
        keys.push(key);
    }

    Ok((KeySequence::new(keys), Modifiers::NONE))
}

fn parse_step(step: &str) -> Result<(String, Modifiers), String> {
    // A lone '+' is the plus key, not a separator
    if step == "+" {
        return Ok(("+".to_string(), Modifiers::NONE));
    }

    let parts: Vec<&str> = step.split('+').collect();
    let (key_part, modifier_parts) = match parts.split_last() {
        Some((key, mods)) => (*key, mods),
        None => return Err("empty step".to_string()),
    };

    if key_part.is_empty() {
        return Err(format!("missing key in '{}'", step));
    }

    let mut modifiers = Modifiers::NONE;
    for part in modifier_parts {
        match part.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifiers.ctrl = true,
            "alt" | "option" => modifiers.alt = true,
            "shift" => modifiers.shift = true,
            "meta" | "cmd" | "super" => modifiers.meta = true,
            other => return Err(format!("unknown modifier '{}'", other)),
        }
    }

    Ok((normalize_key(key_part), modifiers))
}

/// Canonical notation, the inverse of [`parse_notation`]
pub fn to_notation(sequence: &KeySequence, modifiers: &Modifiers) -> String {
    if sequence.is_chord() {
        return sequence.keys().join(" ");
    }

    let mut parts: Vec<&str> = Vec::new();
    if modifiers.ctrl {
        parts.push("ctrl");
    }
    if modifiers.alt {
        parts.push("alt");
    }
    if modifiers.shift {
        parts.push("shift");
    }
    if modifiers.meta {
        parts.push("meta");
    }
    let key = sequence.last().unwrap_or_default();
    let key = if key == "+" { "plus" } else { key };
    parts.push(key);
    parts.join("+")
}

/// Format a key with its modifiers for display, e.g. `Ctrl+Shift+z`
pub fn format_key(key: &str, modifiers: &Modifiers) -> String {
    let mut result = String::new();

    if modifiers.ctrl {
        result.push_str("Ctrl+");
    }
    if modifiers.alt {
        result.push_str("Alt+");
    }
    if modifiers.shift {
        result.push_str("Shift+");
    }
    if modifiers.meta {
        result.push_str("Meta+");
    }

    result.push_str(&display_key_name(key));
    result
}

/// Format a whole sequence for help surfaces; chords read `g → h`
pub fn format_sequence(sequence: &KeySequence, modifiers: &Modifiers) -> String {
    if sequence.is_chord() {
        sequence
            .keys()
            .iter()
            .map(|k| display_key_name(k))
            .collect::<Vec<_>>()
            .join(" → ")
    } else {
        format_key(sequence.last().unwrap_or_default(), modifiers)
    }
}

fn display_key_name(key: &str) -> String {
    match key {
        "enter" => "Enter".to_string(),
        "escape" => "Esc".to_string(),
        "backspace" => "Bksp".to_string(),
        "tab" => "Tab".to_string(),
        "delete" => "Del".to_string(),
        "insert" => "Ins".to_string(),
        "space" => "Space".to_string(),
        "home" => "Home".to_string(),
        "end" => "End".to_string(),
        "pageup" => "PgUp".to_string(),
        "pagedown" => "PgDn".to_string(),
        "arrowup" => "↑".to_string(),
        "arrowdown" => "↓".to_string(),
        "arrowleft" => "←".to_string(),
        "arrowright" => "→".to_string(),
        k if k.len() > 1 && k.starts_with('f') && k[1..].chars().all(|c| c.is_ascii_digit()) => {
            k.to_uppercase()
        }
        k => k.to_string(),
    }
}
