use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::action::ShortcutAction;
use super::dispatcher::DispatcherHandle;
use super::scope::{Scope, ScopeController};

/// Effect registered by a UI region for one action
pub type ActionHandlerFn = Box<dyn FnMut() -> Result<()>>;

/// Where the table reads the active scope from
enum ScopeSource {
    Controller(ScopeController),
    /// The scope the dispatcher matched against, pinned or not
    Dispatcher(DispatcherHandle),
}

impl ScopeSource {
    fn current(&self) -> Scope {
        match self {
            ScopeSource::Controller(scopes) => scopes.get_scope(),
            ScopeSource::Dispatcher(handle) => handle.current_scope(),
        }
    }
}

/// Per-scope handler registrations.
///
/// Different regions supply different effects for the same action. When an
/// action arrives the table looks in the active scope first, then falls back
/// to the global handlers.
pub struct HandlerTable {
    source: ScopeSource,
    handlers: HashMap<Scope, HashMap<ShortcutAction, ActionHandlerFn>>,
}

impl HandlerTable {
    /// Table that follows the shared scope controller
    pub fn new(scopes: ScopeController) -> Self {
        Self {
            source: ScopeSource::Controller(scopes),
            handlers: HashMap::new(),
        }
    }

    /// Table that resolves handlers in whatever scope `handle`'s dispatcher
    /// matched against, including a pinned scope. Use this when the table is
    /// the dispatcher's callback.
    pub fn for_dispatcher(handle: DispatcherHandle) -> Self {
        Self {
            source: ScopeSource::Dispatcher(handle),
            handlers: HashMap::new(),
        }
    }

    pub fn current_scope(&self) -> Scope {
        self.source.current()
    }

    /// Register (or replace) the handler for `action` while `scope` is active
    pub fn register<F>(&mut self, scope: Scope, action: ShortcutAction, handler: F)
    where
        F: FnMut() -> Result<()> + 'static,
    {
        self.handlers
            .entry(scope)
            .or_default()
            .insert(action, Box::new(handler));
    }

    /// Remove every handler a region registered, typically on unmount
    pub fn unregister_scope(&mut self, scope: Scope) {
        self.handlers.remove(&scope);
    }

    pub fn has_handler(&self, scope: Scope, action: ShortcutAction) -> bool {
        self.handlers
            .get(&scope)
            .is_some_and(|actions| actions.contains_key(&action))
    }

    /// Run the handler for `action` in the current scope.
    ///
    /// Returns `Ok(false)` when no region handles the action.
    pub fn handle(&mut self, action: ShortcutAction) -> Result<bool> {
        let scope = self.source.current();
        self.handle_in(scope, action)
    }

    /// Run the handler for `action` as if `scope` were active
    pub fn handle_in(&mut self, scope: Scope, action: ShortcutAction) -> Result<bool> {
        let lookup_order = if scope.is_global() {
            vec![Scope::Global]
        } else {
            vec![scope, Scope::Global]
        };

        for candidate in lookup_order {
            if let Some(handler) = self
                .handlers
                .get_mut(&candidate)
                .and_then(|actions| actions.get_mut(&action))
            {
                debug!(target: "shortcuts", "Running {} handler for {}", candidate, action);
                handler()?;
                return Ok(true);
            }
        }

        debug!(target: "shortcuts", "No handler for {} in scope {}", action, scope);
        Ok(false)
    }

    /// Wrap the table as a dispatcher callback. An action no region
    /// handles is an error, so the dispatcher reports it as failed.
    pub fn into_callback(mut self) -> impl FnMut(ShortcutAction) -> Result<()> {
        move |action| {
            if self.handle(action)? {
                return Ok(());
            }
            let scope = self.source.current();
            warn!(target: "shortcuts", "{} matched in scope {} but no handler is registered", action, scope);
            Err(anyhow!("no handler for {} in scope {}", action, scope))
        }
    }
}
