//! Component trait: the interface every UI panel implements.
//!
//! Components own their view state and render themselves.  They never call
//! into the service; key handling returns `Vec<Action>` and the App
//! dispatches those.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};

use crate::action::Action;

pub trait Component {
    /// Handle a key event. Only called when this component has focus.
    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action>;

    /// Render the component into `area`.
    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool);
}
