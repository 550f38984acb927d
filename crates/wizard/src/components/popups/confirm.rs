use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Color, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Paragraph, Wrap},
};

use crate::{
    action::{Action, PopupResult},
    app::Wizard,
    components::Component,
    tui::{EventResponse, Frame},
};

use super::{centered_rect_fixed, draw_popup_frame, render_backdrop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Ok,
    Cancel,
}

/// Modal yes/no dialog.
///
/// Left/Right/Tab switch the selected button, Enter answers with the
/// selection, Esc always answers `Cancelled`. The answer comes back as
/// `Action::PopupResult`, which the popup itself turns into `ClosePopup`.
pub struct ConfirmPopup {
    title: String,
    question: String,
    ok_label: String,
    cancel_label: String,
    selected: Choice,
    min_width: u16,
    min_height: u16,
}

impl ConfirmPopup {
    pub fn new<T: Into<String>, Q: Into<String>>(title: T, question: Q) -> Self {
        Self {
            title: title.into(),
            question: question.into(),
            ok_label: "OK".into(),
            cancel_label: "Cancel".into(),
            // the safe answer is preselected
            selected: Choice::Cancel,
            min_width: 56,
            min_height: 9,
        }
    }

    pub fn ok_label<S: Into<String>>(mut self, label: S) -> Self {
        self.ok_label = label.into();
        self
    }

    pub fn cancel_label<S: Into<String>>(mut self, label: S) -> Self {
        self.cancel_label = label.into();
        self
    }

    fn confirm_action(&self) -> Action {
        match self.selected {
            Choice::Ok => Action::PopupResult(PopupResult::Confirmed),
            Choice::Cancel => Action::PopupResult(PopupResult::Cancelled),
        }
    }

    fn toggle_selection(&mut self) {
        self.selected = match self.selected {
            Choice::Ok => Choice::Cancel,
            Choice::Cancel => Choice::Ok,
        };
    }

    fn button(&self, choice: Choice) -> Span<'static> {
        let label = match choice {
            Choice::Ok => &self.ok_label,
            Choice::Cancel => &self.cancel_label,
        };
        let style = if self.selected == choice {
            Style::default().fg(Color::Black).bg(Color::White).bold()
        } else {
            Style::default().fg(Color::White).bg(Color::Black)
        };
        Span::styled(format!("[ {label} ]"), style)
    }
}

impl Component for ConfirmPopup {
    fn handle_key_events(
        &mut self,
        key: KeyEvent,
        _wizard: &Wizard,
    ) -> Result<Option<EventResponse<Action>>> {
        let action = match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                self.toggle_selection();
                Action::Update
            }
            KeyCode::Enter => self.confirm_action(),
            KeyCode::Esc => Action::PopupResult(PopupResult::Cancelled),
            _ => Action::Update,
        };
        // modal: nothing behind the popup sees the key
        Ok(Some(EventResponse::Stop(action)))
    }

    fn update(&mut self, action: &Action, _wizard: &Wizard) -> Result<Option<Action>> {
        match action {
            Action::PopupResult(_) => Ok(Some(Action::ClosePopup)),
            _ => Ok(None),
        }
    }

    fn draw(&mut self, f: &mut Frame<'_>, area: Rect, _wizard: &Wizard) -> Result<()> {
        if area.width < 5 || area.height < 5 {
            return Ok(());
        }
        render_backdrop(f, area);

        let dialog = centered_rect_fixed(area, self.min_width, self.min_height);
        draw_popup_frame(f, dialog, &self.title);
        let inner = Rect {
            x: dialog.x.saturating_add(1),
            y: dialog.y.saturating_add(1),
            width: dialog.width.saturating_sub(2),
            height: dialog.height.saturating_sub(2),
        };

        let mut lines: Vec<Line> = self
            .question
            .lines()
            .map(|l| Line::from(Span::raw(l.to_string())))
            .collect();
        if inner.height >= 3 {
            lines.push(Line::raw(""));
        }

        let spacing = "   ";
        let buttons_len = (4 + self.ok_label.len()) + spacing.len() + (4 + self.cancel_label.len());
        let pad = (inner.width as usize).saturating_sub(buttons_len) / 2;
        lines.push(Line::from(vec![
            Span::raw(" ".repeat(pad)),
            self.button(Choice::Ok),
            Span::raw(spacing),
            self.button(Choice::Cancel),
        ]));

        if inner.height >= 4 {
            lines.push(Line::raw(""));
            lines.push(
                Line::from(vec![
                    Span::styled("←/→/Tab", Style::default().fg(Color::White)),
                    Span::raw(": Select   "),
                    Span::styled("Enter", Style::default().fg(Color::White)),
                    Span::raw(": Confirm   "),
                    Span::styled("Esc", Style::default().fg(Color::White)),
                    Span::raw(": Back"),
                ])
                .fg(Color::DarkGray),
            );
        }

        f.render_widget(Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true }), inner);
        Ok(())
    }
}
