pub mod settings;
pub mod station_list;
pub mod status_menu;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Poked by a view whenever the service changed something it shows.
pub type Redraw = Arc<Notify>;

/// Views are shared between the service task (as sinks) and the draw loop.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
