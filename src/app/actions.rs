use crate::gateway::{GatewayError, NoteGateway};
use crate::note::{ModalMode, Note};

use super::state::NoteForm;

/// A unit of work the controller hands to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Reload,
    Create(Note),
    Edit(Note),
    Delete(Note),
}

impl Mutation {
    pub fn mode(&self) -> Option<ModalMode> {
        match self {
            Mutation::Reload => None,
            Mutation::Create(_) => Some(ModalMode::Create),
            Mutation::Edit(_) => Some(ModalMode::Edit),
            Mutation::Delete(_) => Some(ModalMode::Delete),
        }
    }

    pub fn payload(&self) -> Option<&Note> {
        match self {
            Mutation::Reload => None,
            Mutation::Create(note) | Mutation::Edit(note) | Mutation::Delete(note) => Some(note),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Reload => "reload",
            Mutation::Create(_) => "create",
            Mutation::Edit(_) => "edit",
            Mutation::Delete(_) => "delete",
        }
    }

    pub fn send<G>(&self, gateway: &G) -> Result<Vec<Note>, GatewayError>
    where
        G: NoteGateway + ?Sized,
    {
        gateway.execute(self.mode(), self.payload())
    }
}

/// What a form submission does in the current mode.
///
/// Create sends only title and description. Edit carries the selected id.
/// Delete sends just the id. Returns `None` when the form cannot be submitted.
pub fn submission_for(mode: ModalMode, form: &NoteForm, selected: &Note) -> Option<Mutation> {
    match mode {
        ModalMode::Create => form
            .can_submit()
            .then(|| Mutation::Create(Note::draft(form.title.clone(), form.description.clone()))),
        ModalMode::Edit => {
            let id = selected.id()?;
            form.can_submit().then(|| {
                Mutation::Edit(Note::edited(
                    id,
                    form.title.clone(),
                    form.description.clone(),
                ))
            })
        }
        ModalMode::Delete => selected.id().map(|id| Mutation::Delete(Note::reference(id))),
    }
}
