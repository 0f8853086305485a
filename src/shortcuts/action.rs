// Semantic action identifiers delivered by the dispatcher.
// The dispatcher never interprets these; host regions register handlers for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// All actions that a shortcut can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortcutAction {
    // Available everywhere
    ShowHelp,
    ToggleTheme,
    FocusSearch,
    CloseDialog,

    // Page navigation chords
    NavigateHome,
    NavigateGallery,
    NavigateCreate,
    NavigateCart,
    NavigateAccount,
    GoBack,

    // Portrait customization
    SavePet,
    Undo,
    Redo,
    ResetCustomization,
    NextStyle,
    PreviousStyle,
    ZoomIn,
    ZoomOut,
    ToggleBackground,

    // Gallery browsing
    NextImage,
    PreviousImage,
    OpenImage,
    DownloadImage,
    ShareImage,
    DeleteImage,
    ToggleFavorite,

    // Checkout
    ProceedToCheckout,
    BackToCart,
}

impl ShortcutAction {
    pub const ALL: [ShortcutAction; 28] = [
        ShortcutAction::ShowHelp,
        ShortcutAction::ToggleTheme,
        ShortcutAction::FocusSearch,
        ShortcutAction::CloseDialog,
        ShortcutAction::NavigateHome,
        ShortcutAction::NavigateGallery,
        ShortcutAction::NavigateCreate,
        ShortcutAction::NavigateCart,
        ShortcutAction::NavigateAccount,
        ShortcutAction::GoBack,
        ShortcutAction::SavePet,
        ShortcutAction::Undo,
        ShortcutAction::Redo,
        ShortcutAction::ResetCustomization,
        ShortcutAction::NextStyle,
        ShortcutAction::PreviousStyle,
        ShortcutAction::ZoomIn,
        ShortcutAction::ZoomOut,
        ShortcutAction::ToggleBackground,
        ShortcutAction::NextImage,
        ShortcutAction::PreviousImage,
        ShortcutAction::OpenImage,
        ShortcutAction::DownloadImage,
        ShortcutAction::ShareImage,
        ShortcutAction::DeleteImage,
        ShortcutAction::ToggleFavorite,
        ShortcutAction::ProceedToCheckout,
        ShortcutAction::BackToCart,
    ];

    /// The kebab-case identifier used in config files and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortcutAction::ShowHelp => "show-help",
            ShortcutAction::ToggleTheme => "toggle-theme",
            ShortcutAction::FocusSearch => "focus-search",
            ShortcutAction::CloseDialog => "close-dialog",
            ShortcutAction::NavigateHome => "navigate-home",
            ShortcutAction::NavigateGallery => "navigate-gallery",
            ShortcutAction::NavigateCreate => "navigate-create",
            ShortcutAction::NavigateCart => "navigate-cart",
            ShortcutAction::NavigateAccount => "navigate-account",
            ShortcutAction::GoBack => "go-back",
            ShortcutAction::SavePet => "save-pet",
            ShortcutAction::Undo => "undo",
            ShortcutAction::Redo => "redo",
            ShortcutAction::ResetCustomization => "reset-customization",
            ShortcutAction::NextStyle => "next-style",
            ShortcutAction::PreviousStyle => "previous-style",
            ShortcutAction::ZoomIn => "zoom-in",
            ShortcutAction::ZoomOut => "zoom-out",
            ShortcutAction::ToggleBackground => "toggle-background",
            ShortcutAction::NextImage => "next-image",
            ShortcutAction::PreviousImage => "previous-image",
            ShortcutAction::OpenImage => "open-image",
            ShortcutAction::DownloadImage => "download-image",
            ShortcutAction::ShareImage => "share-image",
            ShortcutAction::DeleteImage => "delete-image",
            ShortcutAction::ToggleFavorite => "toggle-favorite",
            ShortcutAction::ProceedToCheckout => "proceed-to-checkout",
            ShortcutAction::BackToCart => "back-to-cart",
        }
    }
}

impl fmt::Display for ShortcutAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShortcutAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow::anyhow!("Unknown shortcut action: '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        for action in ShortcutAction::ALL {
            let parsed: ShortcutAction = action.to_string().parse().unwrap();
            assert_eq!(parsed, action);
        }
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ShortcutAction::NavigateHome).unwrap();
        assert_eq!(json, "\"navigate-home\"");
        let back: ShortcutAction = serde_json::from_str("\"save-pet\"").unwrap();
        assert_eq!(back, ShortcutAction::SavePet);
    }

    #[test]
    fn test_unknown_action_is_error() {
        assert!("launch-rocket".parse::<ShortcutAction>().is_err());
    }
}
