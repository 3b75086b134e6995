//! Action enum: what a key press asks the App to do.

use radiobar_core::Intent;

/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Forward to the radio service.
    Send(Intent),
    OpenMenu,
    OpenSettings,
    CloseOverlay,
    Quit,
}
