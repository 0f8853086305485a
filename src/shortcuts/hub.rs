use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tracing::{trace, warn};

use super::key_event::KeyPress;

/// Something that wants to see every key press delivered to a hub
pub trait KeyListener {
    fn on_key(&mut self, press: &mut KeyPress, now: Instant);

    /// Called periodically by the host loop so deadlines can fire
    fn on_tick(&mut self, _now: Instant) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct HubState {
    listeners: Vec<(ListenerId, Rc<RefCell<dyn KeyListener>>)>,
    next_id: u64,
}

/// The process-wide key event source.
///
/// The host's input loop feeds every key-down into [`emit`](Self::emit);
/// listeners are called in the order they subscribed. Cloning gives another
/// handle onto the same listener list.
#[derive(Clone, Default)]
pub struct KeyEventHub {
    state: Rc<RefCell<HubState>>,
}

impl KeyEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Rc<RefCell<dyn KeyListener>>) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.push((id, listener));
        trace!(target: "input", "Listener {:?} subscribed ({} total)", id, state.listeners.len());
        id
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = state.listeners.len() != before;
        if removed {
            trace!(target: "input", "Listener {:?} unsubscribed", id);
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn emit(&self, press: &mut KeyPress) {
        self.emit_at(press, Instant::now());
    }

    /// Deliver `press` to every listener as if it arrived at `now`
    pub fn emit_at(&self, press: &mut KeyPress, now: Instant) {
        for listener in self.snapshot() {
            match listener.try_borrow_mut() {
                Ok(mut listener) => listener.on_key(press, now),
                Err(_) => {
                    warn!(target: "input", "Skipping re-entrant delivery of {}", press);
                }
            }
        }
    }

    pub fn tick(&self, now: Instant) {
        for listener in self.snapshot() {
            if let Ok(mut listener) = listener.try_borrow_mut() {
                listener.on_tick(now);
            }
        }
    }

    // Listeners may subscribe or unsubscribe while being called, so deliver
    // to a copy of the list rather than holding the borrow
    fn snapshot(&self) -> Vec<Rc<RefCell<dyn KeyListener>>> {
        self.state
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }
}
