// Help surfaces: shortcut listings grouped by scope, and fuzzy search over them

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use super::definition::ShortcutDefinition;
use super::registry::ShortcutRegistry;
use super::scope::Scope;

/// One row in a help listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    pub keys: String,
    pub description: String,
    pub action: String,
    pub scope: Scope,
}

impl HelpEntry {
    fn from_definition(def: &ShortcutDefinition) -> Self {
        Self {
            keys: def.display_keys(),
            description: def.description.clone(),
            action: def.action.to_string(),
            scope: def.scope,
        }
    }
}

/// All enabled shortcuts of one scope
#[derive(Debug, Clone)]
pub struct HelpSection {
    pub scope: Scope,
    pub entries: Vec<HelpEntry>,
}

/// Sections in scope declaration order; scopes with nothing enabled are left out
pub fn help_sections(registry: &ShortcutRegistry) -> Vec<HelpSection> {
    Scope::ALL
        .iter()
        .map(|scope| HelpSection {
            scope: *scope,
            entries: registry
                .by_scope(*scope)
                .into_iter()
                .filter(|def| def.is_enabled())
                .map(HelpEntry::from_definition)
                .collect(),
        })
        .filter(|section| !section.entries.is_empty())
        .collect()
}

/// Plain-text help, as shown by the help overlay
pub fn render_help_text(registry: &ShortcutRegistry) -> String {
    let sections = help_sections(registry);
    let width = sections
        .iter()
        .flat_map(|s| s.entries.iter())
        .map(|e| e.keys.chars().count())
        .max()
        .unwrap_or(0);

    let mut output = String::new();
    for section in sections {
        output.push_str(&format!("{}\n", capitalize(section.scope.as_str())));
        for entry in section.entries {
            let padding = width.saturating_sub(entry.keys.chars().count());
            output.push_str(&format!(
                "  {}{}  {}\n",
                entry.keys,
                " ".repeat(padding),
                entry.description
            ));
        }
        output.push('\n');
    }
    output
}

/// Fuzzy-match `query` against descriptions and action names, best first
pub fn search(registry: &ShortcutRegistry, query: &str) -> Vec<HelpEntry> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, HelpEntry)> = registry
        .all()
        .iter()
        .filter(|def| def.is_enabled())
        .filter_map(|def| {
            let by_description = matcher.fuzzy_match(&def.description, query);
            let by_action = matcher.fuzzy_match(def.action.as_str(), query);
            by_description
                .max(by_action)
                .map(|score| (score, HelpEntry::from_definition(def)))
        })
        .collect();

    // Stable sort keeps catalog order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, entry)| entry).collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcuts::action::ShortcutAction;

    #[test]
    fn test_sections_follow_scope_order() {
        let registry = ShortcutRegistry::builtin().unwrap();
        let sections = help_sections(&registry);
        let scopes: Vec<_> = sections.iter().map(|s| s.scope).collect();
        assert_eq!(scopes, Scope::ALL.to_vec());
    }

    #[test]
    fn test_disabled_definitions_hidden() {
        let defs = vec![
            ShortcutDefinition::parse("ctrl+s", ShortcutAction::SavePet, Scope::Customization, "Save")
                .unwrap()
                .disabled(),
            ShortcutDefinition::parse("?", ShortcutAction::ShowHelp, Scope::Global, "Help").unwrap(),
        ];
        let registry = ShortcutRegistry::new(defs).unwrap();
        let sections = help_sections(&registry);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].scope, Scope::Global);
    }

    #[test]
    fn test_render_help_text() {
        let registry = ShortcutRegistry::builtin().unwrap();
        let text = render_help_text(&registry);
        assert!(text.contains("Customization\n"));
        assert!(text.contains("Ctrl+s"));
        assert!(text.contains("g → h"));
        assert!(text.contains("Save pet portrait"));
    }

    #[test]
    fn test_search_finds_by_description() {
        let registry = ShortcutRegistry::builtin().unwrap();
        let results = search(&registry, "download");
        assert!(!results.is_empty());
        assert_eq!(results[0].action, "download-image");
    }

    #[test]
    fn test_search_blank_query() {
        let registry = ShortcutRegistry::builtin().unwrap();
        assert!(search(&registry, "  ").is_empty());
    }
}
