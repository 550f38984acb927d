use color_eyre::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::Rect;
use registration::{
    CountdownTick, Dispatch, FileStorage, HttpApi, RegistrationWizard, Reply, WizardError,
    WizardResult,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

mod task_manager;

use task_manager::TaskManager;

use crate::{
    action::{Action, PopupResult},
    components::{popups::ConfirmPopup, registration::RegistrationForm, Component},
    config::Config,
    tui::{Event, EventResponse, Tui},
};

pub type Wizard = RegistrationWizard<HttpApi, FileStorage>;

pub struct App {
    frame_rate: f64,
    wizard: Wizard,
    form: RegistrationForm,
    popup: Option<ConfirmPopup>,
    should_quit: bool,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    countdown_rx: mpsc::UnboundedReceiver<CountdownTick>,
    tasks: TaskManager,
    reply_rx: mpsc::UnboundedReceiver<Reply>,
}

impl App {
    pub fn new(config: Config, frame_rate: f64) -> Result<Self> {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (tick_tx, countdown_rx) = mpsc::unbounded_channel();

        info!(base_url = %config.backend.base_url, "starting registration wizard");
        let api = HttpApi::new(config.backend.clone())?;
        let (tasks, reply_rx) = TaskManager::new(api.clone());
        let storage = FileStorage::open(config.session_path())?;
        let mut wizard = RegistrationWizard::new(api, storage);
        wizard.attach_ticks(tick_tx);

        Ok(Self {
            frame_rate,
            wizard,
            form: RegistrationForm::new(),
            popup: None,
            should_quit: false,
            action_tx,
            action_rx,
            countdown_rx,
            tasks,
            reply_rx,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?.frame_rate(self.frame_rate);
        tui.enter()?;

        self.form.init(&self.wizard)?;
        self.action_tx.send(Action::ClearScreen)?;
        let started = self.wizard.start_departments();
        self.dispatch(started)?;

        loop {
            self.handle_events(&mut tui).await?;
            self.handle_actions(&mut tui).await?;
            if self.should_quit {
                tui.stop()?;
                break;
            }
        }
        self.tasks.shutdown();
        self.wizard.dispose();
        tui.exit()?;
        Ok(())
    }

    async fn handle_events(&mut self, tui: &mut Tui) -> Result<()> {
        let event = tokio::select! {
            event = tui.next_event() => match event {
                Some(event) => event,
                None => {
                    self.should_quit = true;
                    return Ok(());
                }
            },
            Some(tick) = self.countdown_rx.recv() => {
                self.action_tx.send(Action::Countdown(tick))?;
                return Ok(());
            }
            Some(reply) = self.reply_rx.recv() => {
                self.tasks.finished(reply.control());
                let finished = self.wizard.finish(reply);
                self.settle(finished);
                self.action_tx.send(Action::Refresh)?;
                return Ok(());
            }
        };

        match &event {
            Event::Render => self.action_tx.send(Action::Render)?,
            Event::Resize(x, y) => self.action_tx.send(Action::Resize(*x, *y))?,
            Event::Key(key)
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c') =>
            {
                self.action_tx.send(Action::Quit)?;
                return Ok(());
            }
            _ => {}
        }

        let response = match self.popup.as_mut() {
            Some(popup) => popup.handle_events(event, &self.wizard)?,
            None => self.form.handle_events(event, &self.wizard)?,
        };
        if let Some(EventResponse::Continue(action) | EventResponse::Stop(action)) = response {
            self.action_tx.send(action)?;
        }
        Ok(())
    }

    async fn handle_actions(&mut self, tui: &mut Tui) -> Result<()> {
        while let Ok(action) = self.action_rx.try_recv() {
            if !matches!(action, Action::Render | Action::Countdown(_)) {
                debug!("{action:?}");
            }
            match &action {
                Action::Quit => {
                    self.tasks.shutdown();
                    self.should_quit = true;
                }
                Action::ClearScreen => tui.terminal.clear()?,
                Action::Resize(w, h) => {
                    tui.resize(Rect::new(0, 0, *w, *h))?;
                    self.render(tui)?;
                }
                Action::Render => self.render(tui)?,
                Action::Error(message) => error!("{message}"),
                Action::Edit(field, raw) => {
                    let accepted = self.wizard.update_field(*field, raw.clone());
                    if self.settle(accepted) == Some(false) {
                        self.action_tx.send(Action::Refresh)?;
                    }
                }
                Action::Blur(field) => {
                    let blurred = self.wizard.blur_field(*field);
                    self.settle(blurred);
                }
                Action::LoadPhoto(path) => {
                    self.show_pending(tui, "Reading photo")?;
                    let loaded = self.wizard.load_photo(path).await;
                    self.finish_pending(loaded)?;
                }
                Action::SendCode => {
                    let started = self.wizard.start_send_code();
                    self.dispatch(started)?;
                }
                Action::VerifyCode => {
                    let started = self.wizard.start_verify_code();
                    self.dispatch(started)?;
                }
                Action::Submit => {
                    let started = self.wizard.start_submit();
                    self.dispatch(started)?;
                }
                Action::Next => {
                    let moved = self.wizard.next();
                    if self.settle(moved) == Some(true) {
                        self.wizard.take_notification();
                    }
                    self.action_tx.send(Action::Refresh)?;
                }
                Action::Back => {
                    let moved = self.wizard.back();
                    self.settle(moved);
                    self.action_tx.send(Action::Refresh)?;
                }
                Action::RequestCancel => {
                    let requested = self.wizard.request_cancel();
                    if self.settle(requested).is_some() {
                        self.action_tx.send(Action::OpenPopup)?;
                    }
                }
                Action::OpenPopup => {
                    self.popup = Some(
                        ConfirmPopup::new(
                            "Cancel registration",
                            "Discard everything entered so far?",
                        )
                        .ok_label("Discard")
                        .cancel_label("Keep editing"),
                    );
                }
                Action::PopupResult(PopupResult::Confirmed) => {
                    let cancelled = self.wizard.confirm_cancel();
                    if self.settle(cancelled) == Some(true) {
                        self.action_tx.send(Action::Quit)?;
                    }
                }
                Action::PopupResult(PopupResult::Cancelled) => {
                    let dismissed = self.wizard.dismiss_cancel();
                    self.settle(dismissed);
                }
                Action::ClosePopup => self.popup = None,
                Action::Countdown(tick) => {
                    let applied = self.wizard.apply_tick(*tick);
                    self.settle(applied);
                }
                Action::Refresh | Action::Update => {}
            }

            if let Some(popup) = self.popup.as_mut() {
                if let Some(follow_up) = popup.update(&action, &self.wizard)? {
                    self.action_tx.send(follow_up)?;
                }
            }
            if let Some(follow_up) = self.form.update(&action, &self.wizard)? {
                self.action_tx.send(follow_up)?;
            }
        }
        Ok(())
    }

    /// Unwrap a wizard result. Misuse is logged, not fatal: the request is
    /// simply ignored.
    fn settle<T>(&self, result: WizardResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(WizardError::Busy(control)) => {
                debug!(control, "ignored while busy");
                None
            }
            Err(WizardError::Closed) => {
                debug!("ignored: wizard is closed");
                None
            }
            Err(WizardError::CancelPending) => {
                debug!("ignored: cancel awaits confirmation");
                None
            }
        }
    }

    /// Hand a started remote operation to the task manager. Local outcomes
    /// are already applied to the wizard.
    fn dispatch(&mut self, started: WizardResult<Dispatch>) -> Result<()> {
        if let Some(Dispatch::Remote(request)) = self.settle(started) {
            self.tasks.spawn(request);
        }
        self.action_tx.send(Action::Refresh)?;
        Ok(())
    }

    fn show_pending(&mut self, tui: &mut Tui, label: &'static str) -> Result<()> {
        self.form.set_pending(Some(label));
        self.render(tui)
    }

    fn finish_pending<T>(&mut self, result: WizardResult<T>) -> Result<()> {
        self.form.set_pending(None);
        self.settle(result);
        self.action_tx.send(Action::Refresh)?;
        Ok(())
    }

    fn render(&mut self, tui: &mut Tui) -> Result<()> {
        let action_tx = self.action_tx.clone();
        tui.draw(|frame| {
            let area = frame.area();
            if let Err(err) = self.form.draw(frame, area, &self.wizard) {
                let _ = action_tx.send(Action::Error(format!("Failed to draw: {err:?}")));
            }
            if let Some(popup) = self.popup.as_mut() {
                if let Err(err) = popup.draw(frame, area, &self.wizard) {
                    let _ = action_tx.send(Action::Error(format!("Failed to draw: {err:?}")));
                }
            }
        })?;
        Ok(())
    }
}
