use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::debug;

/// Named UI regions that restrict which shortcuts are eligible
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    #[default]
    Global,
    Navigation,
    Customization,
    Gallery,
    Checkout,
}

impl Scope {
    pub const ALL: [Scope; 5] = [
        Scope::Global,
        Scope::Navigation,
        Scope::Customization,
        Scope::Gallery,
        Scope::Checkout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Navigation => "navigation",
            Scope::Customization => "customization",
            Scope::Gallery => "gallery",
            Scope::Checkout => "checkout",
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Next scope in declaration order, wrapping around
    pub fn next(&self) -> Scope {
        let index = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow::anyhow!("Unknown scope: '{}'", s))
    }
}

#[derive(Debug, Default)]
struct ScopeStack {
    base: Scope,
    /// Entries pushed by guards, tagged so out-of-order drops remove the right one
    entries: Vec<(u64, Scope)>,
    next_token: u64,
}

impl ScopeStack {
    fn current(&self) -> Scope {
        self.entries
            .last()
            .map(|(_, scope)| *scope)
            .unwrap_or(self.base)
    }
}

/// Shared record of which scope is active.
///
/// Cloning yields another handle onto the same state. Regions either
/// overwrite the active scope with [`set_scope`](Self::set_scope) or, when
/// they nest, enter it with [`push_scope`](Self::push_scope) and let the
/// returned guard restore the previous scope on drop.
#[derive(Debug, Clone, Default)]
pub struct ScopeController {
    state: Rc<RefCell<ScopeStack>>,
}

impl ScopeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_scope(&self) -> Scope {
        self.state.borrow().current()
    }

    /// Overwrite the active scope (top of the stack, or the base if empty)
    pub fn set_scope(&self, scope: Scope) {
        let mut state = self.state.borrow_mut();
        let previous = state.current();
        match state.entries.last_mut() {
            Some((_, top)) => *top = scope,
            None => state.base = scope,
        }
        debug!(target: "scope", "Scope set: {} -> {}", previous, scope);
    }

    /// Enter `scope` until the returned guard is dropped
    #[must_use = "the scope is left as soon as the guard is dropped"]
    pub fn push_scope(&self, scope: Scope) -> ScopeGuard {
        let mut state = self.state.borrow_mut();
        let token = state.next_token;
        state.next_token += 1;
        state.entries.push((token, scope));
        debug!(target: "scope", "Entered scope {} (depth {})", scope, state.entries.len());

        ScopeGuard {
            state: Rc::clone(&self.state),
            token,
        }
    }

    /// Number of scopes entered through guards that are still alive
    pub fn depth(&self) -> usize {
        self.state.borrow().entries.len()
    }
}

/// Restores the previous scope when dropped
#[derive(Debug)]
pub struct ScopeGuard {
    state: Rc<RefCell<ScopeStack>>,
    token: u64,
}

impl ScopeGuard {
    pub fn scope(&self) -> Option<Scope> {
        self.state
            .borrow()
            .entries
            .iter()
            .find(|(token, _)| *token == self.token)
            .map(|(_, scope)| *scope)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state
            .entries
            .iter()
            .position(|(token, _)| *token == self.token)
        {
            let (_, left) = state.entries.remove(index);
            debug!(target: "scope", "Left scope {}, now {}", left, state.current());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scope_is_global() {
        let controller = ScopeController::new();
        assert_eq!(controller.get_scope(), Scope::Global);
        assert_eq!(controller.depth(), 0);
    }

    #[test]
    fn test_set_scope_overwrites() {
        let controller = ScopeController::new();
        controller.set_scope(Scope::Gallery);
        assert_eq!(controller.get_scope(), Scope::Gallery);
        controller.set_scope(Scope::Customization);
        assert_eq!(controller.get_scope(), Scope::Customization);
    }

    #[test]
    fn test_guard_restores_previous_scope() {
        let controller = ScopeController::new();
        {
            let _gallery = controller.push_scope(Scope::Gallery);
            assert_eq!(controller.get_scope(), Scope::Gallery);
            {
                let _dialog = controller.push_scope(Scope::Checkout);
                assert_eq!(controller.get_scope(), Scope::Checkout);
            }
            assert_eq!(controller.get_scope(), Scope::Gallery);
        }
        assert_eq!(controller.get_scope(), Scope::Global);
    }

    #[test]
    fn test_out_of_order_drop_keeps_newest_scope() {
        let controller = ScopeController::new();
        let outer = controller.push_scope(Scope::Gallery);
        let inner = controller.push_scope(Scope::Customization);

        drop(outer);
        assert_eq!(controller.get_scope(), Scope::Customization);
        assert_eq!(controller.depth(), 1);

        drop(inner);
        assert_eq!(controller.get_scope(), Scope::Global);
    }

    #[test]
    fn test_set_scope_inside_guard_is_undone_on_drop() {
        let controller = ScopeController::new();
        let guard = controller.push_scope(Scope::Gallery);
        controller.set_scope(Scope::Navigation);
        assert_eq!(guard.scope(), Some(Scope::Navigation));
        drop(guard);
        assert_eq!(controller.get_scope(), Scope::Global);
    }

    #[test]
    fn test_clones_share_state() {
        let controller = ScopeController::new();
        let other = controller.clone();
        other.set_scope(Scope::Checkout);
        assert_eq!(controller.get_scope(), Scope::Checkout);
    }

    #[test]
    fn test_scope_parse_and_cycle() {
        assert_eq!("Gallery".parse::<Scope>().unwrap(), Scope::Gallery);
        assert!("kitchen".parse::<Scope>().is_err());
        assert_eq!(Scope::Checkout.next(), Scope::Global);
        assert_eq!(Scope::Global.next(), Scope::Navigation);
    }
}
