use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::NotificationOptions;
use crate::gateway::{GatewayError, NoteGateway};
use crate::note::{ModalMode, Note};

use super::actions::{submission_for, Mutation};
use super::notifications::NotificationCenter;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("another note operation is still in progress")]
    Busy,
    #[error("cannot {mode} a note without an id")]
    MissingId { mode: ModalMode },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Title,
    Description,
}

/// Draft bound to the edit view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteForm {
    pub title: String,
    pub description: String,
    pub focus: FormField,
}

impl NoteForm {
    pub fn from_note(note: &Note) -> Self {
        Self {
            title: note.title().to_string(),
            description: note.description().to_string(),
            focus: FormField::Title,
        }
    }

    /// Both fields are required.
    pub fn can_submit(&self) -> bool {
        !self.title.is_empty() && !self.description.is_empty()
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Title,
        };
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' || ch == '\r' {
            self.insert_newline();
            return;
        }
        self.focused_mut().push(ch);
    }

    /// Titles are single-line; Enter there moves on to the description.
    pub fn insert_newline(&mut self) {
        match self.focus {
            FormField::Title => self.focus = FormField::Description,
            FormField::Description => self.description.push('\n'),
        }
    }

    pub fn backspace(&mut self) -> bool {
        let field = self.focused_mut();
        let Some((idx, _)) = field.grapheme_indices(true).next_back() else {
            return false;
        };
        field.truncate(idx);
        true
    }

    pub fn focused_value(&self) -> &str {
        match self.focus {
            FormField::Title => &self.title,
            FormField::Description => &self.description,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Title => &mut self.title,
            FormField::Description => &mut self.description,
        }
    }
}

/// View state of the notes screen and the only code allowed to change it.
#[derive(Debug, Clone)]
pub struct AppState {
    pub notes: Vec<Note>,
    pub selected_note: Note,
    pub modal_mode: ModalMode,
    pub modal_open: bool,
    pub loading: bool,
    pub delete_confirm_pending: bool,
    pub form: NoteForm,
    pub cursor: usize,
    pub status_message: Option<String>,
    pub notifications: NotificationCenter,
    pending: Option<Mutation>,
}

impl AppState {
    pub fn new(options: &NotificationOptions) -> Self {
        Self {
            notes: Vec::new(),
            selected_note: Note::default(),
            modal_mode: ModalMode::Create,
            modal_open: false,
            loading: false,
            delete_confirm_pending: false,
            form: NoteForm::default(),
            cursor: 0,
            status_message: None,
            notifications: NotificationCenter::new(options.ttl(), options.max_visible),
            pending: None,
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn selected_note(&self) -> &Note {
        &self.selected_note
    }

    pub fn pending(&self) -> Option<&Mutation> {
        self.pending.as_ref()
    }

    pub fn select_note(&mut self, note: Note) {
        self.selected_note = note;
    }

    /// Keyboard stand-in for clicking a row: moves the cursor and selects.
    /// With nothing selected the first move lands on the row under the cursor.
    pub fn move_cursor(&mut self, delta: isize) {
        if self.notes.is_empty() {
            return;
        }
        let last = self.notes.len() as isize - 1;
        let step = if self.selected_note.is_placeholder() {
            0
        } else {
            delta
        };
        let next = (self.cursor as isize + step).clamp(0, last) as usize;
        self.cursor = next;
        let note = self.notes[next].clone();
        self.select_note(note);
    }

    pub fn open_modal(&mut self, mode: ModalMode) -> bool {
        if self.modal_open || self.loading {
            return false;
        }
        match mode {
            ModalMode::Create => self.form = NoteForm::default(),
            ModalMode::Edit | ModalMode::Delete => {
                if self.selected_note.id().is_none() {
                    self.set_status_message(Some("Select a note first"));
                    return false;
                }
                self.form = NoteForm::from_note(&self.selected_note);
            }
        }
        self.modal_open = true;
        self.modal_mode = mode;
        self.delete_confirm_pending = mode == ModalMode::Delete;
        true
    }

    pub fn close_modal(&mut self) -> bool {
        if !self.modal_open || self.loading {
            return false;
        }
        self.modal_open = false;
        self.delete_confirm_pending = false;
        self.form = NoteForm::default();
        true
    }

    pub fn request_delete(&mut self) -> bool {
        if !self.modal_open || self.loading || self.modal_mode != ModalMode::Edit {
            return false;
        }
        self.delete_confirm_pending = true;
        self.modal_mode = ModalMode::Delete;
        true
    }

    pub fn cancel_delete(&mut self) -> bool {
        if !self.delete_confirm_pending {
            return false;
        }
        self.delete_confirm_pending = false;
        self.modal_mode = ModalMode::Edit;
        true
    }

    fn form_editable(&self) -> bool {
        self.modal_open && !self.loading && !self.delete_confirm_pending
    }

    pub fn form_insert_char(&mut self, ch: char) {
        if self.form_editable() {
            self.form.insert_char(ch);
        }
    }

    pub fn form_newline(&mut self) {
        if self.form_editable() {
            self.form.insert_newline();
        }
    }

    pub fn form_backspace(&mut self) -> bool {
        self.form_editable() && self.form.backspace()
    }

    pub fn form_toggle_focus(&mut self) {
        if self.form_editable() {
            self.form.toggle_focus();
        }
    }

    pub fn reload<G>(&mut self, gateway: &G) -> Result<(), ControllerError>
    where
        G: NoteGateway + ?Sized,
    {
        self.submit(gateway, Mutation::Reload)
    }

    pub fn create<G>(&mut self, gateway: &G, draft: Note) -> Result<(), ControllerError>
    where
        G: NoteGateway + ?Sized,
    {
        self.submit(gateway, Mutation::Create(draft))
    }

    pub fn edit<G>(&mut self, gateway: &G, note: Note) -> Result<(), ControllerError>
    where
        G: NoteGateway + ?Sized,
    {
        self.submit(gateway, Mutation::Edit(note))
    }

    pub fn confirm_delete<G>(&mut self, gateway: &G, note: Note) -> Result<(), ControllerError>
    where
        G: NoteGateway + ?Sized,
    {
        self.submit(gateway, Mutation::Delete(note))
    }

    /// Runs a mutation to completion.
    pub fn submit<G>(&mut self, gateway: &G, mutation: Mutation) -> Result<(), ControllerError>
    where
        G: NoteGateway + ?Sized,
    {
        self.admit(&mutation)?;
        self.loading = true;
        let result = self.perform(gateway, mutation);
        self.loading = false;
        result
    }

    /// Parks a mutation so a frame with the loading state can be drawn
    /// before the blocking call runs in `run_pending`.
    pub fn queue(&mut self, mutation: Mutation) -> Result<(), ControllerError> {
        self.admit(&mutation)?;
        self.loading = true;
        self.pending = Some(mutation);
        Ok(())
    }

    pub fn run_pending<G>(&mut self, gateway: &G) -> Option<Result<(), ControllerError>>
    where
        G: NoteGateway + ?Sized,
    {
        let mutation = self.pending.take()?;
        let result = self.perform(gateway, mutation);
        self.loading = false;
        Some(result)
    }

    /// Edit view submit: picks the operation from the current mode and queues it.
    pub fn submit_form(&mut self) -> Result<bool, ControllerError> {
        if !self.modal_open {
            return Ok(false);
        }
        if self.modal_mode == ModalMode::Delete && !self.delete_confirm_pending {
            return Ok(false);
        }
        let Some(mutation) = submission_for(self.modal_mode, &self.form, &self.selected_note)
        else {
            self.set_status_message(Some("Title and description are required"));
            return Ok(false);
        };
        self.queue(mutation)?;
        Ok(true)
    }

    fn admit(&self, mutation: &Mutation) -> Result<(), ControllerError> {
        if self.loading {
            return Err(ControllerError::Busy);
        }
        match mutation {
            Mutation::Edit(note) | Mutation::Delete(note) if note.id().is_none() => {
                Err(ControllerError::MissingId {
                    mode: mutation.mode().unwrap_or(ModalMode::Edit),
                })
            }
            _ => Ok(()),
        }
    }

    fn perform<G>(&mut self, gateway: &G, mutation: Mutation) -> Result<(), ControllerError>
    where
        G: NoteGateway + ?Sized,
    {
        let selection_before = self.selected_note.clone();
        if let Err(err) = self.apply(gateway, &mutation) {
            tracing::warn!(operation = mutation.label(), error = %err, "note operation failed");
            self.selected_note = selection_before;
            self.notifications.push_error(err.to_string());
            return Err(err.into());
        }
        Ok(())
    }

    /// Mutate, then reload the whole collection. The mutation's own response
    /// is discarded; the reload is authoritative.
    fn apply<G>(&mut self, gateway: &G, mutation: &Mutation) -> Result<(), GatewayError>
    where
        G: NoteGateway + ?Sized,
    {
        if let Mutation::Edit(_) = mutation {
            self.selected_note = Note::default();
        }
        if *mutation != Mutation::Reload {
            mutation.send(gateway)?;
        }
        self.fetch_all(gateway)?;

        match mutation {
            Mutation::Reload => {}
            Mutation::Create(_) => {
                tracing::info!(notes = self.notes.len(), "note created");
                self.finish_modal();
                self.set_status_message(Some("Note created"));
            }
            Mutation::Edit(note) => {
                tracing::info!(id = note.id().unwrap_or_default(), "note updated");
                self.selected_note = note.clone();
                self.finish_modal();
                self.set_status_message(Some("Note updated"));
            }
            Mutation::Delete(note) => {
                tracing::info!(id = note.id().unwrap_or_default(), "note deleted");
                self.selected_note = Note::default();
                self.delete_confirm_pending = false;
                self.finish_modal();
                self.set_status_message(Some("Note deleted"));
            }
        }
        Ok(())
    }

    fn fetch_all<G>(&mut self, gateway: &G) -> Result<(), GatewayError>
    where
        G: NoteGateway + ?Sized,
    {
        let notes = gateway.list()?;
        tracing::debug!(count = notes.len(), "notes reloaded");
        self.notes = notes;
        self.normalize_cursor();
        Ok(())
    }

    fn finish_modal(&mut self) {
        self.modal_open = false;
        self.form = NoteForm::default();
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    fn normalize_cursor(&mut self) {
        if self.notes.is_empty() {
            self.cursor = 0;
        } else if self.cursor >= self.notes.len() {
            self.cursor = self.notes.len() - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::gateway::memory::MemoryGateway;

    type TestResult<T = ()> = anyhow::Result<T>;

    fn loaded_state(gateway: &MemoryGateway) -> TestResult<AppState> {
        let mut state = AppState::new(&NotificationOptions::default());
        state.reload(gateway)?;
        Ok(state)
    }

    fn seeded_gateway() -> MemoryGateway {
        MemoryGateway::with_notes(vec![
            MemoryGateway::persisted("1", "A", "a"),
            MemoryGateway::persisted("2", "Groceries", "milk, eggs"),
        ])
    }

    #[test]
    fn initial_state_is_closed_create_mode() {
        let state = AppState::new(&NotificationOptions::default());
        assert!(!state.modal_open);
        assert_eq!(state.modal_mode, ModalMode::Create);
        assert!(state.selected_note().is_placeholder());
        assert!(!state.loading);
    }

    #[test]
    fn create_appends_after_reload_and_closes_modal() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        assert!(state.open_modal(ModalMode::Create));

        state.create(&gateway, Note::draft("Ideas", "ship it"))?;

        assert_eq!(state.len(), 3);
        let created = state
            .notes
            .iter()
            .find(|note| note.title() == "Ideas")
            .expect("created note listed");
        assert!(created.is_persisted());
        assert!(!state.modal_open);
        assert!(!state.loading);
        assert_eq!(gateway.calls(), vec![None, Some(ModalMode::Create), None]);
        Ok(())
    }

    #[test]
    fn edit_replaces_title_and_description_for_that_id_only() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        state.select_note(state.notes[0].clone());
        assert!(state.open_modal(ModalMode::Edit));

        state.edit(&gateway, Note::edited("1", "B", "b"))?;

        let edited = &state.notes[0];
        assert_eq!(edited.id(), Some("1"));
        assert_eq!(edited.title(), "B");
        assert_eq!(edited.description(), "b");
        assert_eq!(state.notes[1], MemoryGateway::persisted("2", "Groceries", "milk, eggs"));
        assert_eq!(state.selected_note(), &Note::edited("1", "B", "b"));
        assert!(!state.modal_open);
        Ok(())
    }

    #[test]
    fn edit_scenario_from_single_note() -> TestResult {
        let gateway = MemoryGateway::with_notes(vec![MemoryGateway::persisted("1", "A", "a")]);
        let mut state = loaded_state(&gateway)?;

        state.edit(&gateway, Note::edited("1", "B", "b"))?;

        assert_eq!(state.len(), 1);
        assert_eq!(state.notes[0].id(), Some("1"));
        assert_eq!(state.notes[0].title(), "B");
        assert_eq!(state.notes[0].description(), "b");
        Ok(())
    }

    #[test]
    fn confirm_delete_removes_note_and_resets_selection() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        state.select_note(state.notes[1].clone());
        assert!(state.open_modal(ModalMode::Edit));
        assert!(state.request_delete());

        state.confirm_delete(&gateway, Note::reference("2"))?;

        assert!(state.notes.iter().all(|note| note.id() != Some("2")));
        assert!(state.selected_note().is_placeholder());
        assert!(!state.delete_confirm_pending);
        assert!(!state.modal_open);
        Ok(())
    }

    #[test]
    fn cancel_delete_returns_to_edit_without_gateway_call() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        state.select_note(state.notes[0].clone());
        assert!(state.open_modal(ModalMode::Edit));
        let notes_before = state.notes.clone();
        let calls_before = gateway.calls().len();

        assert!(state.request_delete());
        assert_eq!(state.modal_mode, ModalMode::Delete);
        assert!(state.delete_confirm_pending);
        assert!(state.cancel_delete());

        assert_eq!(state.modal_mode, ModalMode::Edit);
        assert!(!state.delete_confirm_pending);
        assert!(state.modal_open);
        assert_eq!(state.notes, notes_before);
        assert_eq!(gateway.calls().len(), calls_before);
        Ok(())
    }

    #[test]
    fn failed_create_keeps_notes_and_raises_notification() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        assert!(state.open_modal(ModalMode::Create));
        let notes_before = state.notes.clone();
        gateway.fail_next(Some(ModalMode::Create), "network error");

        let err = state
            .create(&gateway, Note::draft("Lost", "never saved"))
            .expect_err("create fails");

        assert_matches!(err, ControllerError::Gateway(GatewayError::Status { .. }));
        assert_eq!(state.notes, notes_before);
        assert!(state.modal_open);
        assert!(!state.loading);
        let toast = state.notifications.latest().expect("notification raised");
        assert!(toast.message.contains("network error"));
        Ok(())
    }

    #[test]
    fn failed_reload_after_edit_restores_selection() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        let original = state.notes[0].clone();
        state.select_note(original.clone());
        gateway.fail_next(None, "gateway timeout");

        state
            .edit(&gateway, Note::edited("1", "B", "b"))
            .expect_err("reload fails");

        assert_eq!(state.selected_note(), &original);
        assert_eq!(state.notes[0], original);
        Ok(())
    }

    #[test]
    fn select_note_is_idempotent() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        let note = state.notes[1].clone();

        state.select_note(note.clone());
        let first = format!("{state:?}");
        state.select_note(note);
        let second = format!("{state:?}");

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn open_modal_is_rejected_while_open() {
        let mut state = AppState::new(&NotificationOptions::default());
        assert!(state.open_modal(ModalMode::Create));
        assert!(!state.open_modal(ModalMode::Create));
    }

    #[test]
    fn edit_modal_requires_selected_note() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;

        assert!(!state.open_modal(ModalMode::Edit));
        assert_eq!(state.status_message.as_deref(), Some("Select a note first"));

        state.move_cursor(1);
        assert_eq!(state.selected_note().id(), Some("1"));
        state.move_cursor(1);
        assert!(state.open_modal(ModalMode::Edit));
        assert_eq!(state.form.title, "Groceries");
        assert_eq!(state.form.description, "milk, eggs");
        Ok(())
    }

    #[test]
    fn request_delete_only_from_edit_mode() {
        let mut state = AppState::new(&NotificationOptions::default());
        assert!(!state.request_delete());
        assert!(state.open_modal(ModalMode::Create));
        assert!(!state.request_delete());
        assert_eq!(state.modal_mode, ModalMode::Create);
    }

    #[test]
    fn queued_operation_blocks_new_mutations_until_run() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        assert!(state.open_modal(ModalMode::Create));
        state.form.title = "Queued".into();
        state.form.description = "body".into();

        assert!(state.submit_form()?);
        assert!(state.loading);
        assert_matches!(
            state.create(&gateway, Note::draft("Other", "x")),
            Err(ControllerError::Busy)
        );
        assert!(!state.close_modal());

        let outcome = state.run_pending(&gateway).expect("pending mutation");
        outcome?;

        assert!(!state.loading);
        assert!(state.pending().is_none());
        assert!(state.notes.iter().any(|note| note.title() == "Queued"));
        assert!(state.notes.iter().all(|note| note.title() != "Other"));
        Ok(())
    }

    #[test]
    fn submit_form_refuses_empty_fields() -> TestResult {
        let mut state = AppState::new(&NotificationOptions::default());
        assert!(state.open_modal(ModalMode::Create));
        state.form.title = "Only title".into();

        assert!(!state.submit_form()?);
        assert!(state.pending().is_none());
        assert!(!state.loading);
        Ok(())
    }

    #[test]
    fn delete_submission_waits_for_confirmation() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        state.move_cursor(0);
        assert!(state.open_modal(ModalMode::Edit));
        assert!(state.request_delete());

        assert!(state.submit_form()?);
        state.run_pending(&gateway).expect("pending")?;

        assert_eq!(state.len(), 1);
        assert!(state.selected_note().is_placeholder());
        Ok(())
    }

    #[test]
    fn edit_without_id_is_rejected_before_gateway() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        let calls_before = gateway.calls().len();

        let err = state
            .edit(&gateway, Note::draft("no", "id"))
            .expect_err("missing id");

        assert_matches!(err, ControllerError::MissingId { mode: ModalMode::Edit });
        assert_eq!(gateway.calls().len(), calls_before);
        Ok(())
    }

    #[test]
    fn reload_keeps_cursor_in_bounds() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;
        state.move_cursor(0);
        state.move_cursor(5);
        assert_eq!(state.cursor, 1);

        state.confirm_delete(&gateway, Note::reference("2"))?;

        assert_eq!(state.cursor, 0);
        Ok(())
    }

    #[test]
    fn first_move_selects_row_under_cursor() -> TestResult {
        let gateway = seeded_gateway();
        let mut state = loaded_state(&gateway)?;

        state.move_cursor(1);
        assert_eq!(state.selected_note().id(), Some("1"));
        assert_eq!(state.cursor, 0);

        state.move_cursor(1);
        assert_eq!(state.selected_note().id(), Some("2"));

        state.confirm_delete(&gateway, Note::reference("2"))?;
        state.move_cursor(-1);
        assert_eq!(state.selected_note().id(), Some("1"));
        Ok(())
    }

    #[test]
    fn form_backspace_removes_whole_graphemes() {
        let mut form = NoteForm::default();
        for ch in "cafe\u{301}".chars() {
            form.insert_char(ch);
        }
        assert!(form.backspace());
        assert_eq!(form.title, "caf");

        form.insert_newline();
        assert_eq!(form.focus, FormField::Description);
        form.insert_char('x');
        form.insert_newline();
        assert_eq!(form.description, "x\n");
        assert!(form.can_submit());
    }
}
