use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::layout::Rect;

use crate::{
    action::Action,
    app::Wizard,
    tui::{Event, EventResponse, Frame},
};

pub mod popups;
pub mod registration;

/// A visual and interactive element of the terminal UI.
///
/// Components read the wizard but never mutate it: everything they want to
/// change is expressed as an [`Action`] that the app applies.
pub trait Component {
    fn init(&mut self, _wizard: &Wizard) -> Result<()> {
        Ok(())
    }

    fn handle_events(
        &mut self,
        event: Event,
        wizard: &Wizard,
    ) -> Result<Option<EventResponse<Action>>> {
        let r = match event {
            Event::Key(key_event) => self.handle_key_events(key_event, wizard)?,
            Event::Paste(text) => self.handle_paste(text, wizard)?,
            _ => None,
        };
        Ok(r)
    }

    fn handle_key_events(
        &mut self,
        _key: KeyEvent,
        _wizard: &Wizard,
    ) -> Result<Option<EventResponse<Action>>> {
        Ok(None)
    }

    fn handle_paste(
        &mut self,
        _text: String,
        _wizard: &Wizard,
    ) -> Result<Option<EventResponse<Action>>> {
        Ok(None)
    }

    fn update(&mut self, _action: &Action, _wizard: &Wizard) -> Result<Option<Action>> {
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, area: Rect, wizard: &Wizard) -> Result<()>;
}
