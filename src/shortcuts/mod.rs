//! Keyboard shortcut engine
//!
//! A static [`ShortcutRegistry`] describes every shortcut, a
//! [`ScopeController`] records which UI region is active, and a
//! [`ShortcutDispatcher`] attached to a [`KeyEventHub`] turns key presses
//! into [`ShortcutAction`]s.

pub mod action;
pub mod definition;
pub mod dispatcher;
pub mod handlers;
pub mod help;
pub mod hub;
pub mod key_event;
pub mod notation;
pub mod registry;
pub mod scope;
pub mod sequence;

pub use action::ShortcutAction;
pub use definition::{KeySequence, ShortcutDefinition};
pub use dispatcher::{
    resolve_match, ActionCallback, DispatchOptions, DispatchOutcome, DispatcherHandle,
    ShortcutDispatcher,
};
pub use handlers::HandlerTable;
pub use hub::{KeyEventHub, KeyListener, ListenerId};
pub use key_event::{EventTarget, KeyPress, Modifiers};
pub use notation::{format_key, format_sequence, parse_notation, to_notation};
pub use registry::{RegistryError, ShortcutRegistry};
pub use scope::{Scope, ScopeController, ScopeGuard};
pub use sequence::{SequenceBuffer, DEFAULT_SEQUENCE_TIMEOUT};
