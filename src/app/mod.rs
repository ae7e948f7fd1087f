use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::gateway::NoteGateway;
use crate::note::{today_label, ModalMode};
use crate::ui;

pub mod actions;
pub mod notifications;
pub mod state;

pub use actions::Mutation;
pub use state::{AppState, ControllerError, FormField, NoteForm};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    NewNote,
    EditNote,
    Reload,
    DismissNotification,
}

pub struct App<G: NoteGateway> {
    gateway: G,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
    tick: usize,
    today: String,
}

impl<G: NoteGateway> App<G> {
    pub fn new(config: Arc<AppConfig>, gateway: G) -> Self {
        let mut state = AppState::new(&config.notifications);
        if let Err(err) = state.queue(Mutation::Reload) {
            tracing::error!(?err, "failed to queue initial load");
        }
        Self {
            tick_rate: config.ui.tick_rate(),
            gateway,
            state,
            list_state: ListState::default(),
            should_quit: false,
            tick: 0,
            today: today_label(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if !self.state.is_empty() && !self.state.selected_note().is_placeholder() {
                        self.list_state.select(Some(self.state.cursor));
                    } else {
                        self.list_state.select(None);
                    }
                    let chrome = ui::Chrome {
                        today: &self.today,
                        tick: self.tick,
                        now: Instant::now(),
                    };
                    ui::draw_app(frame, &self.state, &mut self.list_state, &chrome);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            // The frame above shows the spinner; now block on the request.
            if self.state.pending().is_some() {
                self.run_pending();
                continue;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // next draw adapts to the new size
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    pub fn run_pending(&mut self) {
        match self.state.run_pending(&self.gateway) {
            Some(Err(err)) => tracing::error!(%err, "note request failed"),
            Some(Ok(())) => {
                if self.state.selected_note().is_placeholder() {
                    self.state.cursor = 0;
                } else if let Some(idx) = self
                    .state
                    .notes
                    .iter()
                    .position(|note| note.id() == self.state.selected_note().id())
                {
                    self.state.cursor = idx;
                }
            }
            None => {}
        }
    }

    fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        let expired = self.state.notifications.expire(Instant::now());
        if expired > 0 {
            tracing::trace!(expired, "notifications expired");
        }
        self.today = today_label();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.state.loading {
            return;
        }

        if self.state.delete_confirm_pending {
            self.handle_confirm_key(key);
            return;
        }
        if self.state.modal_open {
            self.handle_form_key(key);
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('a') | KeyCode::Char('+') if plain => Some(Action::NewNote),
            KeyCode::Char('e') | KeyCode::Enter if plain => Some(Action::EditNote),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Reload)
            }
            KeyCode::Char('x') if plain => Some(Action::DismissNotification),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_cursor(1),
            Action::SelectPrevious => self.state.move_cursor(-1),
            Action::NewNote => {
                if self.state.open_modal(ModalMode::Create) {
                    self.state.set_status_message(Some("Fill in title and description"));
                }
            }
            Action::EditNote => {
                if self.state.selected_note().is_placeholder() && !self.state.is_empty() {
                    self.state.move_cursor(0);
                }
                if self.state.open_modal(ModalMode::Edit) {
                    self.state.clear_status_message();
                }
            }
            Action::Reload => self.queue(Mutation::Reload),
            Action::DismissNotification => {
                self.state.notifications.dismiss_latest();
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('x') if ctrl => {
                self.state.notifications.dismiss_latest();
            }
            KeyCode::Esc => {
                if self.state.close_modal() {
                    self.state.set_status_message(Some("Canceled"));
                }
            }
            KeyCode::Char('s') if ctrl => self.submit_form(),
            KeyCode::Char('d') if ctrl => {
                self.state.request_delete();
            }
            KeyCode::Tab | KeyCode::BackTab => self.state.form_toggle_focus(),
            KeyCode::Enter => self.state.form_newline(),
            KeyCode::Backspace => {
                self.state.form_backspace();
            }
            KeyCode::Char(ch)
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                self.state.form_insert_char(ch);
            }
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state.notifications.dismiss_latest();
            }
            KeyCode::Char('y') | KeyCode::Enter => self.submit_form(),
            KeyCode::Char('n') | KeyCode::Esc => {
                self.state.cancel_delete();
            }
            _ => {}
        }
    }

    fn submit_form(&mut self) {
        if let Err(err) = self.state.submit_form() {
            tracing::warn!(%err, "form submission rejected");
            self.state.set_status_message(Some(err.to_string()));
        }
    }

    fn queue(&mut self, mutation: Mutation) {
        if let Err(err) = self.state.queue(mutation) {
            tracing::warn!(%err, "request rejected");
            self.state.set_status_message(Some(err.to_string()));
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_text<G: NoteGateway>(app: &mut App<G>, text: &str) {
        for ch in text.chars() {
            app.handle_key(press(KeyCode::Char(ch)));
        }
    }

    fn started_app() -> App<MemoryGateway> {
        let gateway = MemoryGateway::with_notes(vec![
            MemoryGateway::persisted("1", "A", "a"),
            MemoryGateway::persisted("2", "B", "b"),
        ]);
        let mut app = App::new(Arc::new(AppConfig::default()), gateway);
        app.run_pending();
        app
    }

    #[test]
    fn startup_loads_notes_through_pending_queue() {
        let gateway = MemoryGateway::with_notes(vec![MemoryGateway::persisted("1", "A", "a")]);
        let mut app = App::new(Arc::new(AppConfig::default()), gateway);
        assert!(app.state().loading);
        assert!(app.state().is_empty());

        app.run_pending();

        assert!(!app.state().loading);
        assert_eq!(app.state().len(), 1);
    }

    #[test]
    fn keyboard_create_flow() {
        let mut app = started_app();

        app.handle_key(press(KeyCode::Char('a')));
        assert!(app.state().modal_open);
        type_text(&mut app, "Plan");
        app.handle_key(press(KeyCode::Tab));
        type_text(&mut app, "quarterly goals");
        app.handle_key(ctrl('s'));
        assert!(app.state().loading);

        app.run_pending();

        assert!(!app.state().modal_open);
        assert!(app.state().notes.iter().any(|note| note.title() == "Plan"
            && note.description() == "quarterly goals"));
    }

    #[test]
    fn add_key_is_ignored_while_modal_open() {
        let mut app = started_app();
        app.handle_key(press(KeyCode::Char('a')));
        app.handle_key(press(KeyCode::Char('a')));

        assert_eq!(app.state().form.title, "a");
        assert_eq!(app.state().modal_mode, ModalMode::Create);
    }

    #[test]
    fn keyboard_delete_with_confirmation() {
        let mut app = started_app();
        app.handle_key(press(KeyCode::Char('j')));
        app.handle_key(press(KeyCode::Char('j')));
        app.handle_key(press(KeyCode::Char('e')));
        assert_eq!(app.state().modal_mode, ModalMode::Edit);

        app.handle_key(ctrl('d'));
        assert!(app.state().delete_confirm_pending);
        app.handle_key(press(KeyCode::Char('n')));
        assert_eq!(app.state().modal_mode, ModalMode::Edit);
        assert!(app.state().modal_open);

        app.handle_key(ctrl('d'));
        app.handle_key(press(KeyCode::Char('y')));
        app.run_pending();

        assert_eq!(app.state().len(), 1);
        assert!(app.state().notes.iter().all(|note| note.id() != Some("2")));
        assert!(app.state().selected_note().is_placeholder());
        assert!(!app.state().modal_open);
    }

    #[test]
    fn escape_cancels_edit_without_request() {
        let mut app = started_app();
        app.handle_key(press(KeyCode::Char('e')));
        app.handle_key(press(KeyCode::Backspace));
        app.handle_key(press(KeyCode::Esc));

        assert!(!app.state().modal_open);
        assert_eq!(app.state().notes[0].title(), "A");
        assert!(app.state().pending().is_none());
    }

    #[test]
    fn failed_reload_is_reported_and_dismissable() {
        let mut app = started_app();
        app.gateway.fail_next(None, "network error");

        app.handle_key(ctrl('r'));
        app.run_pending();

        assert_eq!(app.state().len(), 2);
        let toast = app.state().notifications.latest().expect("toast");
        assert_eq!(toast.message, "network error");

        app.handle_key(press(KeyCode::Char('x')));
        assert!(app.state().notifications.is_empty());
    }

    #[test]
    fn edit_keeps_cursor_on_edited_note() {
        let mut app = started_app();
        app.handle_key(press(KeyCode::Down));
        app.handle_key(press(KeyCode::Down));
        app.handle_key(press(KeyCode::Enter));
        app.handle_key(press(KeyCode::Char('!')));
        app.handle_key(ctrl('s'));
        app.run_pending();

        assert_eq!(app.state().cursor, 1);
        assert_eq!(app.state().selected_note().title(), "B!");
    }

    #[test]
    fn first_down_selects_first_note() {
        let mut app = started_app();
        app.handle_key(press(KeyCode::Char('j')));

        assert_eq!(app.state().selected_note().id(), Some("1"));
        assert_eq!(app.state().cursor, 0);
    }

    #[test]
    fn failure_toast_is_dismissable_with_form_open() {
        let mut app = started_app();
        app.gateway.fail_next(Some(ModalMode::Create), "network error");

        app.handle_key(press(KeyCode::Char('a')));
        type_text(&mut app, "T");
        app.handle_key(press(KeyCode::Tab));
        type_text(&mut app, "D");
        app.handle_key(ctrl('s'));
        app.run_pending();
        assert!(app.state().modal_open);
        assert_eq!(app.state().notifications.len(), 1);

        app.handle_key(ctrl('x'));

        assert!(app.state().notifications.is_empty());
        assert_eq!(app.state().form.description, "D");
        assert!(app.state().modal_open);
    }
}
