use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Block, Borders, Clear},
};

use crate::tui::Frame;

pub mod confirm;

pub use confirm::ConfirmPopup;

/// Dim the page behind a modal dialog.
pub fn render_backdrop(frame: &mut Frame<'_>, area: Rect) {
    let backdrop = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(backdrop, area);
}

/// A `width` x `height` rectangle centered in `area`, clamped to it.
pub fn centered_rect_fixed(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);

    let x = area.x.saturating_add((area.width.saturating_sub(w)) / 2);
    let y = area.y.saturating_add((area.height.saturating_sub(h)) / 2);

    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

/// Clear `area` and draw a rounded, titled border around it.
pub fn draw_popup_frame(frame: &mut Frame<'_>, area: Rect, title: impl Into<String>) -> Rect {
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" {} ", title.into()))
        .borders(Borders::ALL)
        .border_set(symbols::border::ROUNDED)
        .style(Style::default().fg(Color::White).bg(Color::Black));

    frame.render_widget(block, area);
    area
}
