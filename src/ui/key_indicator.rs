use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::shortcuts::{DispatchOutcome, KeyPress};

#[derive(Debug, Clone)]
struct RecordedKey {
    label: String,
    at: Instant,
    outcome: DispatchOutcome,
}

/// Recent key presses with a fade effect, coloured by what the dispatcher
/// did with them
pub struct KeyPressIndicator {
    keys: VecDeque<RecordedKey>,
    max_keys: usize,
    /// How long before a key starts fading
    fade_start: Duration,
    /// How long the fade takes
    fade_duration: Duration,
    pub enabled: bool,
}

impl KeyPressIndicator {
    pub fn new() -> Self {
        Self {
            keys: VecDeque::with_capacity(10),
            max_keys: 10,
            fade_start: Duration::from_millis(500),
            fade_duration: Duration::from_millis(1500),
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.keys.clear();
        }
    }

    pub fn record(&mut self, press: &KeyPress, outcome: DispatchOutcome, now: Instant) {
        if !self.enabled {
            return;
        }

        self.keys.push_back(RecordedKey {
            label: press.to_string(),
            at: now,
            outcome,
        });
        while self.keys.len() > self.max_keys {
            self.keys.pop_front();
        }
        self.prune(now);
    }

    /// Forget keys that have completely faded
    pub fn prune(&mut self, now: Instant) {
        let fade_complete = self.fade_start + self.fade_duration;
        self.keys
            .retain(|key| now.saturating_duration_since(key.at) < fade_complete);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Labels joined with arrows, oldest first
    pub fn summary(&self) -> String {
        self.keys
            .iter()
            .map(|key| key.label.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }

    fn opacity(&self, elapsed: Duration) -> f32 {
        if elapsed < self.fade_start {
            1.0
        } else if elapsed < self.fade_start + self.fade_duration {
            let progress =
                (elapsed - self.fade_start).as_secs_f32() / self.fade_duration.as_secs_f32();
            1.0 - progress
        } else {
            0.0
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, now: Instant) {
        if !self.enabled || self.keys.is_empty() {
            return;
        }

        let mut spans = Vec::new();
        for key in &self.keys {
            let opacity = self.opacity(now.saturating_duration_since(key.at));
            if opacity <= 0.0 {
                continue;
            }

            if !spans.is_empty() {
                spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
            }
            spans.push(Span::styled(
                key.label.clone(),
                Style::default()
                    .fg(key_color(key.outcome, opacity))
                    .add_modifier(Modifier::ITALIC),
            ));
        }

        if !spans.is_empty() {
            frame.render_widget(Paragraph::new(Line::from(spans)), area);
        }
    }
}

impl Default for KeyPressIndicator {
    fn default() -> Self {
        Self::new()
    }
}

fn key_color(outcome: DispatchOutcome, opacity: f32) -> Color {
    if opacity <= 0.4 {
        return Color::DarkGray;
    }
    match outcome {
        DispatchOutcome::Dispatched(_) => Color::Green,
        DispatchOutcome::HandlerFailed(_) => Color::Red,
        DispatchOutcome::Suppressed(_) => Color::Yellow,
        _ if opacity > 0.7 => Color::Cyan,
        _ => Color::Gray,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcuts::ShortcutAction;

    #[test]
    fn test_records_and_summarizes() {
        let now = Instant::now();
        let mut indicator = KeyPressIndicator::new();
        indicator.record(&KeyPress::new("g"), DispatchOutcome::Unmatched, now);
        indicator.record(
            &KeyPress::new("h"),
            DispatchOutcome::Dispatched(ShortcutAction::NavigateHome),
            now,
        );
        assert_eq!(indicator.len(), 2);
        assert_eq!(indicator.summary(), "g → h");
    }

    #[test]
    fn test_faded_keys_pruned() {
        let now = Instant::now();
        let mut indicator = KeyPressIndicator::new();
        indicator.record(&KeyPress::new("x"), DispatchOutcome::Unmatched, now);
        indicator.prune(now + Duration::from_millis(1999));
        assert_eq!(indicator.len(), 1);
        indicator.prune(now + Duration::from_millis(2000));
        assert!(indicator.is_empty());
    }

    #[test]
    fn test_capacity_and_disable() {
        let now = Instant::now();
        let mut indicator = KeyPressIndicator::new();
        for _ in 0..15 {
            indicator.record(&KeyPress::new("j"), DispatchOutcome::Unmatched, now);
        }
        assert_eq!(indicator.len(), 10);

        indicator.set_enabled(false);
        assert!(indicator.is_empty());
        indicator.record(&KeyPress::new("j"), DispatchOutcome::Unmatched, now);
        assert!(indicator.is_empty());
    }
}
