use std::path::PathBuf;

use color_eyre::Result;
use crossterm::event::{Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use registration::{field::FieldKind, Control, FieldId, NotificationKind, Phase, RawInput, Step};
use strum::IntoEnumIterator;
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::{
    action::Action,
    app::Wizard,
    components::Component,
    tui::{EventResponse, Frame},
};

/// Width of the marker plus label column in front of every value.
const LABEL_WIDTH: usize = 32;

/// Something on the current step that can hold keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Field(FieldId),
    SendCode,
    VerifyCode,
    Back,
    Next,
    Submit,
}

/// Status line text while `control` waits for the backend.
fn busy_label(control: Control) -> &'static str {
    match control {
        Control::SendCode => "Sending verification code",
        Control::VerifyCode => "Verifying code",
        Control::Submit => "Submitting registration",
        Control::Departments => "Loading departments",
    }
}

/// Focus order for the wizard's current step.
pub fn focus_order(wizard: &Wizard) -> Vec<Focus> {
    let step = wizard.step();
    let mut order = Vec::new();
    for &field in step.fields() {
        order.push(Focus::Field(field));
        match field {
            FieldId::EmailId => order.push(Focus::SendCode),
            FieldId::OtpCode => order.push(Focus::VerifyCode),
            _ => {}
        }
    }
    if step.previous().is_some() {
        order.push(Focus::Back);
    }
    order.push(if step.is_last() { Focus::Submit } else { Focus::Next });
    order
}

/// The registration form: one page per wizard step.
///
/// Keeps only presentation state (focus, the line editor of the focused
/// field, the typed photo path). Field values live in the wizard.
#[derive(Default)]
pub struct RegistrationForm {
    step: Option<Step>,
    focus: usize,
    input: Input,
    photo_path: String,
    pending: Option<&'static str>,
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `label` in the status line while local work runs.
    pub fn set_pending(&mut self, label: Option<&'static str>) {
        self.pending = label;
    }

    pub fn focused(&self, wizard: &Wizard) -> Focus {
        let order = focus_order(wizard);
        order[self.focus.min(order.len() - 1)]
    }

    fn reload(&mut self, wizard: &Wizard) {
        if self.step != Some(wizard.step()) {
            self.step = Some(wizard.step());
            self.focus = 0;
        }
        self.focus = self.focus.min(focus_order(wizard).len() - 1);
        self.input = match self.focused(wizard) {
            Focus::Field(FieldId::Photo) => Input::new(self.photo_path.clone()),
            Focus::Field(field) if is_line_edited(field) => {
                Input::new(wizard.form().get(field).as_text().to_string())
            }
            _ => Input::default(),
        };
    }

    /// Move focus by `delta` (wrapping). Leaving a field reports a blur.
    fn move_focus(&mut self, delta: isize, wizard: &Wizard) -> Option<Action> {
        let leaving = self.focused(wizard);
        let len = focus_order(wizard).len() as isize;
        self.focus = (self.focus as isize + delta).rem_euclid(len) as usize;
        self.reload(wizard);
        match leaving {
            Focus::Field(field) => Some(Action::Blur(field)),
            _ => Some(Action::Update),
        }
    }

    fn choices(field: FieldId, wizard: &Wizard) -> Vec<String> {
        if field == FieldId::Department {
            wizard.departments().into_iter().map(str::to_string).collect()
        } else {
            field.options().iter().map(|s| s.to_string()).collect()
        }
    }

    fn cycle_choice(field: FieldId, delta: isize, wizard: &Wizard) -> Option<Action> {
        let options = Self::choices(field, wizard);
        if options.is_empty() {
            return None;
        }
        let len = options.len() as isize;
        let current = wizard.form().get(field).as_text();
        let next = match options.iter().position(|o| o == current) {
            Some(i) => (i as isize + delta).rem_euclid(len),
            None if delta > 0 => 0,
            None => len - 1,
        };
        Some(Action::Edit(
            field,
            RawInput::Text(options[next as usize].clone()),
        ))
    }

    fn edit_field(&mut self, field: FieldId, key: KeyEvent, wizard: &Wizard) -> Option<Action> {
        match field.kind() {
            FieldKind::Checkbox => match key.code {
                KeyCode::Char(' ') | KeyCode::Enter => Some(Action::Edit(
                    field,
                    RawInput::Checked(!wizard.form().get(field).is_truthy()),
                )),
                _ => None,
            },
            FieldKind::Choice => match key.code {
                KeyCode::Left => Self::cycle_choice(field, -1, wizard),
                KeyCode::Right | KeyCode::Char(' ') => Self::cycle_choice(field, 1, wizard),
                KeyCode::Enter => self.move_focus(1, wizard),
                _ => None,
            },
            FieldKind::Photo => match key.code {
                KeyCode::Enter => {
                    let path = self.input.value().trim();
                    (!path.is_empty()).then(|| Action::LoadPhoto(PathBuf::from(path)))
                }
                _ => {
                    self.input.handle_event(&CrosstermEvent::Key(key));
                    self.photo_path = self.input.value().to_string();
                    Some(Action::Update)
                }
            },
            FieldKind::Text | FieldKind::Secret | FieldKind::Date => match key.code {
                KeyCode::Enter => match field {
                    FieldId::EmailId => Some(Action::SendCode),
                    FieldId::OtpCode => Some(Action::VerifyCode),
                    _ => self.move_focus(1, wizard),
                },
                _ => {
                    let before = self.input.value().to_string();
                    self.input.handle_event(&CrosstermEvent::Key(key));
                    (self.input.value() != before).then(|| {
                        Action::Edit(field, RawInput::Text(self.input.value().to_string()))
                    })
                }
            },
        }
    }

    fn field_line(&self, field: FieldId, focused: bool, wizard: &Wizard) -> (Line<'static>, Option<usize>) {
        let marker = if focused { "▸ " } else { "  " };
        let label_style = if focused {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default()
        };

        if field.kind() == FieldKind::Checkbox {
            let mark = if wizard.form().get(field).is_truthy() { "[x]" } else { "[ ]" };
            let line = Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{mark} {}", field.label()), label_style),
            ]);
            return (line, None);
        }

        let label = Span::styled(
            format!("{marker}{:<width$}", field.label(), width = LABEL_WIDTH - 2),
            label_style,
        );
        let stored = wizard.form().get(field).as_text();
        let mut cursor = None;
        let value = match field.kind() {
            FieldKind::Choice => {
                let shown = if stored.is_empty() { "select" } else { stored };
                Span::raw(format!("◂ {shown} ▸"))
            }
            FieldKind::Secret => {
                let len = if focused { self.input.value().chars().count() } else { stored.chars().count() };
                if focused {
                    cursor = Some(LABEL_WIDTH + self.input.visual_cursor());
                }
                Span::raw("•".repeat(len))
            }
            FieldKind::Photo => {
                let path = if focused { self.input.value() } else { self.photo_path.as_str() };
                if focused {
                    cursor = Some(LABEL_WIDTH + self.input.visual_cursor());
                }
                if path.is_empty() && !focused {
                    Span::styled("path to a PNG or JPEG file", Style::default().fg(Color::DarkGray))
                } else {
                    Span::raw(path.to_string())
                }
            }
            _ => {
                if focused {
                    cursor = Some(LABEL_WIDTH + self.input.visual_cursor());
                    Span::raw(self.input.value().to_string())
                } else if stored.is_empty() && field == FieldId::Dob {
                    Span::styled("YYYY-MM-DD", Style::default().fg(Color::DarkGray))
                } else {
                    Span::raw(stored.to_string())
                }
            }
        };

        let mut spans = vec![label, value];
        if field == FieldId::EmailId && wizard.is_verified() {
            spans.push(Span::styled("  ✓ verified", Style::default().fg(Color::Green)));
        }
        (Line::from(spans), cursor)
    }

    fn button_line(&self, target: Focus, focused: bool, wizard: &Wizard) -> Line<'static> {
        let otp = wizard.otp();
        let busy = wizard.busy();
        let (label, enabled) = match target {
            Focus::SendCode if busy == Some(Control::SendCode) => ("Sending…".to_string(), false),
            Focus::VerifyCode if busy == Some(Control::VerifyCode) => ("Verifying…".to_string(), false),
            Focus::SendCode if wizard.is_verified() => ("Email verified".to_string(), false),
            Focus::SendCode if otp.resend_countdown_seconds() > 0 => (
                format!("Resend code in {}s", otp.resend_countdown_seconds()),
                false,
            ),
            Focus::SendCode if otp.sent => ("Resend code".to_string(), true),
            Focus::SendCode => ("Send code".to_string(), true),
            Focus::VerifyCode => ("Verify code".to_string(), otp.sent && !otp.verified),
            Focus::Back => ("Back".to_string(), true),
            Focus::Next => ("Next".to_string(), true),
            Focus::Submit => ("Submit registration".to_string(), wizard.can_submit()),
            Focus::Field(_) => (String::new(), false),
        };
        let style = match (focused, enabled) {
            (true, _) => Style::default().fg(Color::Black).bg(Color::Cyan).bold(),
            (false, true) => Style::default().fg(Color::White),
            (false, false) => Style::default().fg(Color::DarkGray),
        };
        let style = if enabled { style } else { style.add_modifier(Modifier::DIM) };
        Line::from(vec![
            Span::raw(" ".repeat(LABEL_WIDTH)),
            Span::styled(format!("[ {label} ]"), style),
        ])
    }

    fn draw_header(&self, f: &mut Frame<'_>, area: Rect, wizard: &Wizard) {
        let current = wizard.step();
        let mut spans: Vec<Span> = Step::iter()
            .map(|s| {
                if s <= current {
                    Span::styled("● ", Style::default().fg(Color::Cyan))
                } else {
                    Span::styled("○ ", Style::default().fg(Color::DarkGray))
                }
            })
            .collect();
        spans.push(Span::raw(format!(
            "  Step {}/{} · {}",
            current.number(),
            registration::gate::STEP_COUNT,
            current
        )));
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Hostel Registration ".bold());
        f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn draw_body(&self, f: &mut Frame<'_>, area: Rect, wizard: &Wizard) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", wizard.step()));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let order = focus_order(wizard);
        let focused = self.focus.min(order.len() - 1);
        let mut lines: Vec<Line> = Vec::new();
        let mut focus_line = 0;
        let mut cursor = None;

        for (i, target) in order.iter().enumerate() {
            let is_focused = i == focused;
            if is_focused {
                focus_line = lines.len();
            }
            match *target {
                Focus::Field(field) => {
                    let (line, col) = self.field_line(field, is_focused, wizard);
                    if let Some(col) = col {
                        cursor = Some((lines.len(), col));
                    }
                    lines.push(line);
                    if let Some(err) = wizard.visible_error(field) {
                        lines.push(Line::from(Span::styled(
                            format!("{}✗ {err}", " ".repeat(LABEL_WIDTH)),
                            Style::default().fg(Color::Red),
                        )));
                    } else if field == FieldId::Photo && !wizard.form().photo.is_empty() {
                        lines.push(Line::from(Span::styled(
                            format!("{}✓ photo attached", " ".repeat(LABEL_WIDTH)),
                            Style::default().fg(Color::Green),
                        )));
                    }
                }
                button => lines.push(self.button_line(button, is_focused, wizard)),
            }
        }

        if wizard.step() == Step::EmailVerification {
            let otp = wizard.otp();
            lines.push(Line::raw(""));
            let status = if otp.verified {
                Span::styled("Email verified. Continue with Ctrl-N.", Style::default().fg(Color::Green))
            } else if otp.sent {
                Span::raw(format!("{} Enter the 6-digit code.", otp.last_sent_message))
            } else {
                Span::styled(
                    "Verify your email to unlock the remaining steps.",
                    Style::default().fg(Color::DarkGray),
                )
            };
            lines.push(Line::from(status));
        }

        let height = inner.height as usize;
        let offset = focus_line.saturating_sub(height.saturating_sub(2));
        f.render_widget(
            Paragraph::new(Text::from(lines)).scroll((offset as u16, 0)),
            inner,
        );

        if let Some((line, col)) = cursor {
            if line >= offset && line - offset < height && col < inner.width as usize {
                f.set_cursor_position((inner.x + col as u16, inner.y + (line - offset) as u16));
            }
        }
    }

    fn draw_status(&self, f: &mut Frame<'_>, area: Rect, wizard: &Wizard) {
        let pending = self.pending.or_else(|| wizard.busy().map(busy_label));
        let line = if let Some(label) = pending {
            Line::from(Span::styled(format!("… {label}"), Style::default().fg(Color::Yellow)))
        } else if let Some(note) = wizard.notification() {
            let color = match note.kind {
                NotificationKind::Success => Color::Green,
                NotificationKind::Error => Color::Red,
                NotificationKind::Info => Color::Blue,
            };
            Line::from(Span::styled(note.message.clone(), Style::default().fg(color)))
        } else {
            Line::raw("")
        };
        f.render_widget(Paragraph::new(line), area);
    }

    fn draw_footer(&self, f: &mut Frame<'_>, area: Rect) {
        let hints = Line::from(vec![
            Span::styled("Tab", Style::default().fg(Color::White)),
            Span::raw(" move  "),
            Span::styled("Enter", Style::default().fg(Color::White)),
            Span::raw(" act  "),
            Span::styled("Space", Style::default().fg(Color::White)),
            Span::raw(" toggle  "),
            Span::styled("←/→", Style::default().fg(Color::White)),
            Span::raw(" choose  "),
            Span::styled("Ctrl-N/B", Style::default().fg(Color::White)),
            Span::raw(" next/back  "),
            Span::styled("Esc", Style::default().fg(Color::White)),
            Span::raw(" cancel"),
        ])
        .fg(Color::DarkGray);
        f.render_widget(Paragraph::new(hints), area);
    }

    fn draw_submitted(&self, f: &mut Frame<'_>, area: Rect, wizard: &Wizard) {
        let message = wizard
            .notification()
            .map(|n| n.message.clone())
            .unwrap_or_else(|| "Registration successful".to_string());
        let text = Text::from(vec![
            Line::from(Span::styled("✓ Registration submitted", Style::default().fg(Color::Green).bold())),
            Line::raw(""),
            Line::raw(message),
            Line::raw("Your application is pending approval by the hostel admin."),
            Line::raw(""),
            Line::from(Span::styled("Press any key to exit.", Style::default().fg(Color::DarkGray))),
        ]);
        let block = Block::default().borders(Borders::ALL).title(" Hostel Registration ");
        f.render_widget(
            Paragraph::new(text)
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            area,
        );
    }
}

fn is_line_edited(field: FieldId) -> bool {
    matches!(
        field.kind(),
        FieldKind::Text | FieldKind::Secret | FieldKind::Date
    )
}

impl Component for RegistrationForm {
    fn init(&mut self, wizard: &Wizard) -> Result<()> {
        self.reload(wizard);
        Ok(())
    }

    fn handle_key_events(
        &mut self,
        key: KeyEvent,
        wizard: &Wizard,
    ) -> Result<Option<EventResponse<Action>>> {
        if wizard.phase() == Phase::Submitted {
            return Ok(Some(EventResponse::Stop(Action::Quit)));
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let action = match key.code {
            KeyCode::Char('n') if ctrl => Some(Action::Next),
            KeyCode::Char('b') if ctrl => Some(Action::Back),
            KeyCode::Esc => Some(Action::RequestCancel),
            KeyCode::Tab | KeyCode::Down => self.move_focus(1, wizard),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(-1, wizard),
            _ => {
                let pressed = matches!(key.code, KeyCode::Enter | KeyCode::Char(' '));
                match self.focused(wizard) {
                    Focus::Field(field) => self.edit_field(field, key, wizard),
                    Focus::SendCode => pressed.then_some(Action::SendCode),
                    Focus::VerifyCode => pressed.then_some(Action::VerifyCode),
                    Focus::Back => pressed.then_some(Action::Back),
                    Focus::Next => pressed.then_some(Action::Next),
                    Focus::Submit => pressed.then_some(Action::Submit),
                }
            }
        };
        Ok(action.map(EventResponse::Stop))
    }

    fn handle_paste(
        &mut self,
        text: String,
        wizard: &Wizard,
    ) -> Result<Option<EventResponse<Action>>> {
        let text = text.trim_end_matches(['\r', '\n']);
        let action = match self.focused(wizard) {
            Focus::Field(FieldId::Photo) => {
                self.photo_path = format!("{}{}", self.input.value(), text);
                self.input = Input::new(self.photo_path.clone());
                Some(Action::Update)
            }
            Focus::Field(field) if is_line_edited(field) => {
                let value = format!("{}{}", self.input.value(), text);
                self.input = Input::new(value.clone());
                Some(Action::Edit(field, RawInput::Text(value)))
            }
            _ => None,
        };
        Ok(action.map(EventResponse::Stop))
    }

    fn update(&mut self, action: &Action, wizard: &Wizard) -> Result<Option<Action>> {
        if *action == Action::Refresh {
            self.reload(wizard);
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, area: Rect, wizard: &Wizard) -> Result<()> {
        if wizard.phase() == Phase::Submitted {
            self.draw_submitted(f, area, wizard);
            return Ok(());
        }
        let [header, body, status, footer] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);
        self.draw_header(f, header, wizard);
        self.draw_body(f, body, wizard);
        self.draw_status(f, status, wizard);
        self.draw_footer(f, footer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::offline_wizard;
    use pretty_assertions::assert_eq;
    use ratatui::{backend::TestBackend, Terminal};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn send(form: &mut RegistrationForm, k: KeyEvent, wizard: &Wizard) -> Option<Action> {
        match form.handle_key_events(k, wizard).unwrap() {
            Some(EventResponse::Stop(a)) | Some(EventResponse::Continue(a)) => Some(a),
            None => None,
        }
    }

    #[test]
    fn first_step_focus_order() {
        let wizard = offline_wizard();
        assert_eq!(
            focus_order(&wizard),
            vec![
                Focus::Field(FieldId::EmailId),
                Focus::SendCode,
                Focus::Field(FieldId::OtpCode),
                Focus::VerifyCode,
                Focus::Next,
            ]
        );
    }

    #[test]
    fn typing_edits_the_focused_field() {
        let mut wizard = offline_wizard();
        let mut form = RegistrationForm::new();
        form.init(&wizard).unwrap();

        assert_eq!(
            send(&mut form, key(KeyCode::Char('a')), &wizard),
            Some(Action::Edit(FieldId::EmailId, RawInput::Text("a".into())))
        );
        wizard.update_field(FieldId::EmailId, "a").unwrap();
        assert_eq!(
            send(&mut form, key(KeyCode::Backspace), &wizard),
            Some(Action::Edit(FieldId::EmailId, RawInput::Text(String::new())))
        );
        assert_eq!(send(&mut form, key(KeyCode::Enter), &wizard), Some(Action::SendCode));
    }

    #[test]
    fn tab_blurs_and_buttons_fire() {
        let wizard = offline_wizard();
        let mut form = RegistrationForm::new();
        form.init(&wizard).unwrap();

        assert_eq!(
            send(&mut form, key(KeyCode::Tab), &wizard),
            Some(Action::Blur(FieldId::EmailId))
        );
        assert_eq!(form.focused(&wizard), Focus::SendCode);
        assert_eq!(send(&mut form, key(KeyCode::Enter), &wizard), Some(Action::SendCode));
        assert_eq!(send(&mut form, key(KeyCode::Char('x')), &wizard), None);

        send(&mut form, key(KeyCode::BackTab), &wizard);
        send(&mut form, key(KeyCode::BackTab), &wizard);
        assert_eq!(form.focused(&wizard), Focus::Next);
    }

    #[test]
    fn global_keys() {
        let wizard = offline_wizard();
        let mut form = RegistrationForm::new();
        form.init(&wizard).unwrap();
        let ctrl = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        assert_eq!(send(&mut form, ctrl('n'), &wizard), Some(Action::Next));
        assert_eq!(send(&mut form, ctrl('b'), &wizard), Some(Action::Back));
        assert_eq!(send(&mut form, key(KeyCode::Esc), &wizard), Some(Action::RequestCancel));
    }

    #[test]
    fn busy_send_shows_progress() {
        let mut wizard = offline_wizard();
        wizard.update_field(FieldId::EmailId, "asha@college.edu").unwrap();
        assert!(matches!(
            wizard.start_send_code().unwrap(),
            registration::Dispatch::Remote(_)
        ));
        let mut form = RegistrationForm::new();
        form.init(&wizard).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(90, 20)).unwrap();
        terminal
            .draw(|f| form.draw(f, f.area(), &wizard).unwrap())
            .unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(screen.contains("[ Sending… ]"));
        assert!(screen.contains("Sending verification code"));

        // Other fields still take input.
        send(&mut form, key(KeyCode::Tab), &wizard);
        send(&mut form, key(KeyCode::Tab), &wizard);
        assert_eq!(
            send(&mut form, key(KeyCode::Char('1')), &wizard),
            Some(Action::Edit(FieldId::OtpCode, RawInput::Text("1".into())))
        );
    }

    #[test]
    fn draws_first_step() {
        let mut wizard = offline_wizard();
        wizard.update_field(FieldId::EmailId, "not-an-email").unwrap();
        let mut form = RegistrationForm::new();
        form.init(&wizard).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(90, 20)).unwrap();
        terminal
            .draw(|f| form.draw(f, f.area(), &wizard).unwrap())
            .unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(screen.contains("Step 1/5"));
        assert!(screen.contains("Email & OTP"));
        assert!(screen.contains("Enter a valid email address"));
        assert!(screen.contains("[ Send code ]"));
    }
}
