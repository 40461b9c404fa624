//! Reconciliation, surface lifecycle and dispatch for vaultlab.
//!
//! A [`LabPlugin`] keeps what a remote script server offers in sync with what
//! the user configured: each pass fetches the catalog, tears down every
//! surface from the previous pass, and installs one surface per active
//! operation. Invocations post the editing context to the remote and route
//! the reply to the document or to the operation's panel.
//!
//! The editing application is reached only through the traits in [`host`].

pub mod dispatcher;
pub mod host;
pub mod lifecycle;
pub mod plugin;
pub mod surface;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use host::{Editor, FocusEvent, Host, HostError, Notifier, SlotHost, Vault};
pub use lifecycle::{LifecycleError, LifecycleManager, SlotState};
pub use plugin::{
    LabCommand, LabPlugin, OperationUpdate, PluginError, SettingsEntry, SettingsView, UNREACHABLE_NOTICE,
};
pub use surface::{
    ClickOutcome, ConversationPanel, LabView, ListPanel, RenderedItem, RenderedView, Surface, SurfaceFactory,
    SurfaceHandle, TextMutator, ViewBody,
};
