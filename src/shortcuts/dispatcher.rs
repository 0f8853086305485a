use anyhow::{bail, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::action::ShortcutAction;
use super::definition::ShortcutDefinition;
use super::hub::{KeyEventHub, KeyListener, ListenerId};
use super::key_event::{KeyPress, Modifiers};
use super::registry::ShortcutRegistry;
use super::scope::{Scope, ScopeController};
use super::sequence::{SequenceBuffer, DEFAULT_SEQUENCE_TIMEOUT};

/// Callback that receives resolved actions
pub type ActionCallback = Box<dyn FnMut(ShortcutAction) -> Result<()>>;

/// Options accepted by [`ShortcutDispatcher::start`]
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Pinned scope; `None` follows the shared scope controller
    pub scope: Option<Scope>,
    pub enabled: bool,
    /// When set, only these actions are dispatched
    pub allowed_actions: Option<HashSet<ShortcutAction>>,
    pub sequence_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            scope: None,
            enabled: true,
            allowed_actions: None,
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
        }
    }
}

impl DispatchOptions {
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_allowed_actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = ShortcutAction>,
    {
        self.allowed_actions = Some(actions.into_iter().collect());
        self
    }

    pub fn with_sequence_timeout(mut self, timeout: Duration) -> Self {
        self.sequence_timeout = timeout;
        self
    }
}

/// What happened to a single key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Dispatcher not started, or stopped
    Inactive,
    /// Dispatcher disabled; the event passed through untouched
    Disabled,
    /// Plain typing into a text field
    Ignored,
    /// Nothing matched; the key stays in the sequence buffer
    Unmatched,
    /// Matched an action that is not in the allow-list
    Suppressed(ShortcutAction),
    /// Callback invoked and default prevented
    Dispatched(ShortcutAction),
    /// Callback returned an error or panicked
    HandlerFailed(ShortcutAction),
}

impl DispatchOutcome {
    pub fn action(&self) -> Option<ShortcutAction> {
        match self {
            DispatchOutcome::Suppressed(action)
            | DispatchOutcome::Dispatched(action)
            | DispatchOutcome::HandlerFailed(action) => Some(*action),
            _ => None,
        }
    }
}

struct DispatcherCore {
    registry: Arc<ShortcutRegistry>,
    scopes: ScopeController,
    buffer: SequenceBuffer,
    pinned_scope: Option<Scope>,
    enabled: bool,
    allowed_actions: Option<HashSet<ShortcutAction>>,
    running: bool,
    last_outcome: Option<DispatchOutcome>,
}

impl DispatcherCore {
    fn current_scope(&self) -> Scope {
        self.pinned_scope
            .unwrap_or_else(|| self.scopes.get_scope())
    }

    /// Steps 1-7 of key handling, minus the callback. Returns the action to
    /// deliver, or the final outcome when there is nothing to deliver.
    fn resolve(&mut self, press: &KeyPress, now: Instant) -> std::result::Result<ShortcutAction, DispatchOutcome> {
        if !self.running {
            return Err(DispatchOutcome::Inactive);
        }
        if !self.enabled {
            return Err(DispatchOutcome::Disabled);
        }

        if press.target.is_typing_element() && !press.modifiers.has_command_modifier() {
            trace!(target: "input", "Ignoring {} typed into a text field", press);
            return Err(DispatchOutcome::Ignored);
        }

        self.buffer.push(&press.key, now);
        let scope = self.current_scope();

        let matched = match resolve_match(
            &self.registry,
            scope,
            self.buffer.keys(),
            &press.modifiers,
        ) {
            Some(def) => def,
            None => {
                trace!(
                    target: "shortcuts",
                    "No match for {:?} in scope {}",
                    self.buffer.keys(),
                    scope
                );
                return Err(DispatchOutcome::Unmatched);
            }
        };

        let action = matched.action;
        if matched.is_chord() {
            self.buffer.clear();
        }

        if let Some(allowed) = &self.allowed_actions {
            if !allowed.contains(&action) {
                debug!(target: "shortcuts", "Suppressed {} (not in allow-list)", action);
                return Err(DispatchOutcome::Suppressed(action));
            }
        }

        debug!(
            target: "shortcuts",
            "Resolved {} -> {} in scope {}",
            matched.display_keys(),
            action,
            scope
        );
        Ok(action)
    }
}

/// Find the definition a key press resolves to.
///
/// `pressed` is the whole sequence buffer, most recent key last. A chord
/// must equal the buffer exactly and ignores modifiers; otherwise the most
/// recent key is matched against single-key definitions with exactly the
/// same modifiers.
pub fn resolve_match<'a>(
    registry: &'a ShortcutRegistry,
    scope: Scope,
    pressed: &[String],
    modifiers: &Modifiers,
) -> Option<&'a ShortcutDefinition> {
    let last = pressed.last()?;

    let chord = registry
        .candidates(scope)
        .filter(|def| def.is_chord())
        .find(|def| def.key_sequence.matches(pressed));
    if chord.is_some() {
        return chord;
    }

    registry.candidates(scope).find(|def| {
        !def.is_chord()
            && def.key_sequence.last() == Some(last.as_str())
            && def.modifiers == *modifiers
    })
}

/// Shared pieces of a running dispatcher: its state and the callback.
///
/// Kept separate so the callback can be invoked without holding a borrow on
/// the state, which lets handlers flip scope or enabled state.
#[derive(Clone)]
struct Shared {
    core: Rc<RefCell<DispatcherCore>>,
    callback: Rc<RefCell<Option<ActionCallback>>>,
}

impl Shared {
    fn handle(&self, press: &mut KeyPress, now: Instant) -> DispatchOutcome {
        trace!(target: "input", "Key: {}", press);

        let resolved = self.core.borrow_mut().resolve(press, now);
        let outcome = match resolved {
            Err(outcome) => outcome,
            Ok(action) => {
                press.prevent_default();
                self.invoke(action)
            }
        };

        self.core.borrow_mut().last_outcome = Some(outcome);
        outcome
    }

    fn invoke(&self, action: ShortcutAction) -> DispatchOutcome {
        let mut slot = match self.callback.try_borrow_mut() {
            Ok(slot) => slot,
            Err(_) => {
                warn!(target: "shortcuts", "Dropping {}: action callback is already running", action);
                return DispatchOutcome::HandlerFailed(action);
            }
        };
        let callback = match slot.as_mut() {
            Some(callback) => callback,
            None => return DispatchOutcome::Inactive,
        };

        match panic::catch_unwind(AssertUnwindSafe(|| callback(action))) {
            Ok(Ok(())) => DispatchOutcome::Dispatched(action),
            Ok(Err(e)) => {
                warn!(target: "shortcuts", "Handler for {} failed: {:#}", action, e);
                DispatchOutcome::HandlerFailed(action)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(target: "shortcuts", "Handler for {} panicked: {}", action, message);
                DispatchOutcome::HandlerFailed(action)
            }
        }
    }
}

struct DispatchListener {
    shared: Shared,
}

impl KeyListener for DispatchListener {
    fn on_key(&mut self, press: &mut KeyPress, now: Instant) {
        self.shared.handle(press, now);
    }

    fn on_tick(&mut self, now: Instant) {
        let mut core = self.shared.core.borrow_mut();
        if core.buffer.expire(now) {
            trace!(target: "shortcuts", "Sequence buffer timed out");
        }
    }
}

/// Cheap handle for changing a dispatcher's settings from inside callbacks
/// or other regions.
#[derive(Clone)]
pub struct DispatcherHandle {
    core: Rc<RefCell<DispatcherCore>>,
}

impl DispatcherHandle {
    pub fn set_enabled(&self, enabled: bool) {
        let mut core = self.core.borrow_mut();
        if core.enabled != enabled {
            debug!(target: "shortcuts", "Dispatcher {}", if enabled { "enabled" } else { "disabled" });
        }
        core.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.core.borrow().enabled
    }

    /// Pin the scope this dispatcher matches against
    pub fn set_scope(&self, scope: Scope) {
        debug!(target: "scope", "Dispatcher scope pinned to {}", scope);
        self.core.borrow_mut().pinned_scope = Some(scope);
    }

    /// Go back to reading the scope from the shared controller
    pub fn follow_scope_controller(&self) {
        self.core.borrow_mut().pinned_scope = None;
    }

    pub fn current_scope(&self) -> Scope {
        self.core.borrow().current_scope()
    }

    /// The locally pinned scope, `None` while following the controller
    pub fn pinned_scope(&self) -> Option<Scope> {
        self.core.borrow().pinned_scope
    }

    pub fn pending_sequence(&self) -> Vec<String> {
        self.core.borrow().buffer.keys().to_vec()
    }

    pub fn last_outcome(&self) -> Option<DispatchOutcome> {
        self.core.borrow().last_outcome
    }

    pub fn is_running(&self) -> bool {
        self.core.borrow().running
    }
}

/// Turns key presses into at most one action each.
///
/// A dispatcher is idle until [`start`](Self::start) attaches it to a
/// [`KeyEventHub`]; [`stop`](Self::stop), or dropping it, detaches it again.
pub struct ShortcutDispatcher {
    shared: Shared,
    subscription: Option<(KeyEventHub, ListenerId)>,
}

impl ShortcutDispatcher {
    pub fn new(registry: Arc<ShortcutRegistry>, scopes: ScopeController) -> Self {
        let core = DispatcherCore {
            registry,
            scopes,
            buffer: SequenceBuffer::default(),
            pinned_scope: None,
            enabled: true,
            allowed_actions: None,
            running: false,
            last_outcome: None,
        };

        Self {
            shared: Shared {
                core: Rc::new(RefCell::new(core)),
                callback: Rc::new(RefCell::new(None)),
            },
            subscription: None,
        }
    }

    /// Begin listening on `hub`, delivering actions to `callback`
    pub fn start<F>(&mut self, hub: &KeyEventHub, callback: F, options: DispatchOptions) -> Result<()>
    where
        F: FnMut(ShortcutAction) -> Result<()> + 'static,
    {
        if self.subscription.is_some() {
            bail!("Shortcut dispatcher is already started");
        }

        {
            let mut core = self.shared.core.borrow_mut();
            let longest = core.registry.longest_sequence();
            core.buffer = SequenceBuffer::new(options.sequence_timeout).with_max_len(longest);
            core.pinned_scope = options.scope;
            core.enabled = options.enabled;
            core.allowed_actions = options.allowed_actions;
            core.running = true;
            core.last_outcome = None;
        }
        *self.shared.callback.borrow_mut() = Some(Box::new(callback));

        let listener = Rc::new(RefCell::new(DispatchListener {
            shared: self.shared.clone(),
        }));
        let id = hub.subscribe(listener);
        self.subscription = Some((hub.clone(), id));

        debug!(target: "shortcuts", "Dispatcher started ({} listeners on hub)", hub.listener_count());
        Ok(())
    }

    /// Detach from the hub and drop any pending sequence. No callback runs
    /// after this returns.
    pub fn stop(&mut self) {
        if let Some((hub, id)) = self.subscription.take() {
            hub.unsubscribe(id);
            debug!(target: "shortcuts", "Dispatcher stopped");
        }

        {
            let mut core = self.shared.core.borrow_mut();
            core.running = false;
            core.buffer.clear();
        }

        // The callback may be the one calling stop; it is released on the
        // next start or when the dispatcher is dropped
        if let Ok(mut callback) = self.shared.callback.try_borrow_mut() {
            *callback = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            core: Rc::clone(&self.shared.core),
        }
    }

    pub fn handle_key(&self, press: &mut KeyPress) -> DispatchOutcome {
        self.handle_key_at(press, Instant::now())
    }

    /// Process one key press as if it arrived at `now`
    pub fn handle_key_at(&self, press: &mut KeyPress, now: Instant) -> DispatchOutcome {
        self.shared.handle(press, now)
    }

    /// Let the sequence deadline fire if it has passed
    pub fn tick(&self, now: Instant) {
        self.shared.core.borrow_mut().buffer.expire(now);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.handle().set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.handle().is_enabled()
    }

    pub fn set_scope(&self, scope: Scope) {
        self.handle().set_scope(scope);
    }

    pub fn follow_scope_controller(&self) {
        self.handle().follow_scope_controller();
    }

    pub fn current_scope(&self) -> Scope {
        self.handle().current_scope()
    }

    pub fn pending_sequence(&self) -> Vec<String> {
        self.handle().pending_sequence()
    }

    pub fn sequence_time_remaining(&self, now: Instant) -> Option<Duration> {
        self.shared.core.borrow().buffer.time_remaining(now)
    }
}

impl Drop for ShortcutDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcuts::key_event::EventTarget;

    fn registry() -> Arc<ShortcutRegistry> {
        let defs = vec![
            ShortcutDefinition::parse("?", ShortcutAction::ShowHelp, Scope::Global, "").unwrap(),
            ShortcutDefinition::parse("s", ShortcutAction::NextStyle, Scope::Customization, "")
                .unwrap(),
            ShortcutDefinition::parse("ctrl+s", ShortcutAction::SavePet, Scope::Customization, "")
                .unwrap(),
            ShortcutDefinition::parse("g h", ShortcutAction::NavigateHome, Scope::Navigation, "")
                .unwrap(),
        ];
        Arc::new(ShortcutRegistry::new(defs).unwrap())
    }

    fn started(options: DispatchOptions) -> (ShortcutDispatcher, Rc<RefCell<Vec<ShortcutAction>>>) {
        let hub = KeyEventHub::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut dispatcher = ShortcutDispatcher::new(registry(), ScopeController::new());
        dispatcher
            .start(
                &hub,
                move |action| {
                    sink.borrow_mut().push(action);
                    Ok(())
                },
                options,
            )
            .unwrap();
        (dispatcher, seen)
    }

    #[test]
    fn test_resolve_prefers_exact_modifiers() {
        let registry = registry();
        let pressed = vec!["s".to_string()];
        let plain = resolve_match(&registry, Scope::Customization, &pressed, &Modifiers::NONE);
        assert_eq!(plain.map(|d| d.action), Some(ShortcutAction::NextStyle));
        let ctrl = resolve_match(&registry, Scope::Customization, &pressed, &Modifiers::ctrl());
        assert_eq!(ctrl.map(|d| d.action), Some(ShortcutAction::SavePet));
        let alt = resolve_match(&registry, Scope::Customization, &pressed, &Modifiers::alt());
        assert!(alt.is_none());
    }

    #[test]
    fn test_resolve_empty_buffer() {
        let registry = registry();
        assert!(resolve_match(&registry, Scope::Global, &[], &Modifiers::NONE).is_none());
    }

    #[test]
    fn test_unstarted_dispatcher_is_inactive() {
        let dispatcher = ShortcutDispatcher::new(registry(), ScopeController::new());
        let mut press = KeyPress::new("?");
        assert_eq!(dispatcher.handle_key(&mut press), DispatchOutcome::Inactive);
        assert!(!press.is_default_prevented());
    }

    #[test]
    fn test_start_twice_fails() {
        let (mut dispatcher, _) = started(DispatchOptions::default());
        let hub = KeyEventHub::new();
        assert!(dispatcher.start(&hub, |_| Ok(()), DispatchOptions::default()).is_err());
    }

    #[test]
    fn test_chord_modifiers_ignored() {
        let (dispatcher, seen) = started(DispatchOptions::default().with_scope(Scope::Navigation));
        let now = Instant::now();
        dispatcher.handle_key_at(&mut KeyPress::new("g").with_ctrl(), now);
        let outcome = dispatcher.handle_key_at(
            &mut KeyPress::new("h").with_ctrl(),
            now + Duration::from_millis(10),
        );
        assert_eq!(outcome, DispatchOutcome::Dispatched(ShortcutAction::NavigateHome));
        assert_eq!(*seen.borrow(), vec![ShortcutAction::NavigateHome]);
    }

    #[test]
    fn test_single_key_match_keeps_buffer() {
        let (dispatcher, _) = started(DispatchOptions::default());
        let now = Instant::now();
        let outcome = dispatcher.handle_key_at(&mut KeyPress::new("?"), now);
        assert_eq!(outcome, DispatchOutcome::Dispatched(ShortcutAction::ShowHelp));
        assert_eq!(dispatcher.pending_sequence(), vec!["?".to_string()]);
    }

    #[test]
    fn test_tick_expires_buffer() {
        let (dispatcher, _) = started(DispatchOptions::default().with_scope(Scope::Navigation));
        let now = Instant::now();
        dispatcher.handle_key_at(&mut KeyPress::new("g"), now);
        assert_eq!(
            dispatcher.sequence_time_remaining(now),
            Some(DEFAULT_SEQUENCE_TIMEOUT)
        );
        dispatcher.tick(now + Duration::from_millis(500));
        assert_eq!(dispatcher.pending_sequence(), vec!["g".to_string()]);
        dispatcher.tick(now + Duration::from_millis(1000));
        assert!(dispatcher.pending_sequence().is_empty());
    }

    #[test]
    fn test_contenteditable_false_is_not_typing() {
        let (dispatcher, seen) = started(DispatchOptions::default());
        let mut press = KeyPress::new("?")
            .on(EventTarget::element("div").with_content_editable("false"));
        dispatcher.handle_key(&mut press);
        assert_eq!(*seen.borrow(), vec![ShortcutAction::ShowHelp]);
    }

    #[test]
    fn test_meta_in_typing_element_dispatches() {
        let defs = vec![
            ShortcutDefinition::parse("meta+s", ShortcutAction::SavePet, Scope::Global, "").unwrap(),
        ];
        let hub = KeyEventHub::new();
        let mut dispatcher =
            ShortcutDispatcher::new(Arc::new(ShortcutRegistry::new(defs).unwrap()), ScopeController::new());
        dispatcher
            .start(&hub, |_| Ok(()), DispatchOptions::default())
            .unwrap();

        let mut press = KeyPress::new("s")
            .with_meta()
            .on(EventTarget::element("textarea"));
        assert_eq!(
            dispatcher.handle_key(&mut press),
            DispatchOutcome::Dispatched(ShortcutAction::SavePet)
        );
    }

    #[test]
    fn test_handler_error_is_isolated() {
        let hub = KeyEventHub::new();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let mut dispatcher = ShortcutDispatcher::new(registry(), ScopeController::new());
        dispatcher
            .start(
                &hub,
                move |_| {
                    *counter.borrow_mut() += 1;
                    anyhow::bail!("handler exploded")
                },
                DispatchOptions::default(),
            )
            .unwrap();

        let mut first = KeyPress::new("?");
        hub.emit(&mut first);
        assert!(first.is_default_prevented());
        assert_eq!(
            dispatcher.handle().last_outcome(),
            Some(DispatchOutcome::HandlerFailed(ShortcutAction::ShowHelp))
        );

        // Still listening
        hub.emit(&mut KeyPress::new("?"));
        assert_eq!(*calls.borrow(), 2);
        assert_eq!(hub.listener_count(), 1);
    }

    #[test]
    fn test_handler_panic_is_isolated() {
        let hub = KeyEventHub::new();
        let mut dispatcher = ShortcutDispatcher::new(registry(), ScopeController::new());
        dispatcher
            .start(&hub, |_| panic!("boom"), DispatchOptions::default())
            .unwrap();

        let outcome = dispatcher.handle_key(&mut KeyPress::new("?"));
        assert_eq!(outcome, DispatchOutcome::HandlerFailed(ShortcutAction::ShowHelp));
        assert!(dispatcher.is_running());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = KeyEventHub::new();
        {
            let mut dispatcher = ShortcutDispatcher::new(registry(), ScopeController::new());
            dispatcher
                .start(&hub, |_| Ok(()), DispatchOptions::default())
                .unwrap();
            assert_eq!(hub.listener_count(), 1);
        }
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_callback_can_change_scope_through_handle() {
        let hub = KeyEventHub::new();
        let mut dispatcher = ShortcutDispatcher::new(registry(), ScopeController::new());
        let handle = dispatcher.handle();
        dispatcher
            .start(
                &hub,
                move |action| {
                    if action == ShortcutAction::ShowHelp {
                        handle.set_scope(Scope::Customization);
                    }
                    Ok(())
                },
                DispatchOptions::default(),
            )
            .unwrap();

        hub.emit(&mut KeyPress::new("?"));
        assert_eq!(dispatcher.current_scope(), Scope::Customization);
    }
}
