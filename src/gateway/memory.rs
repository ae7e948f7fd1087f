use std::cell::{Cell, RefCell};

use super::{route_for, GatewayError, NoteGateway};
use crate::note::{ModalMode, Note};

const FIXED_TIMESTAMP: &str = "2024-05-01T12:00:00Z";

/// In-process stand-in for the notes API, with scripted failures.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    notes: RefCell<Vec<Note>>,
    next_id: Cell<u64>,
    calls: RefCell<Vec<Option<ModalMode>>>,
    failures: RefCell<Vec<(Option<ModalMode>, String)>>,
}

impl MemoryGateway {
    pub fn with_notes(notes: Vec<Note>) -> Self {
        let gateway = Self::default();
        gateway.next_id.set(notes.len() as u64 + 1);
        *gateway.notes.borrow_mut() = notes;
        gateway
    }

    pub fn persisted(id: &str, title: &str, description: &str) -> Note {
        Note {
            id: Some(id.into()),
            title: Some(title.into()),
            description: Some(description.into()),
            created_at: Some(FIXED_TIMESTAMP.into()),
            updated_at: Some(FIXED_TIMESTAMP.into()),
            owner_id: Some("owner-1".into()),
        }
    }

    /// The next call made with `mode` fails with `message`.
    pub fn fail_next(&self, mode: Option<ModalMode>, message: &str) {
        self.failures.borrow_mut().push((mode, message.to_string()));
    }

    pub fn calls(&self) -> Vec<Option<ModalMode>> {
        self.calls.borrow().clone()
    }

    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.borrow().clone()
    }
}

impl NoteGateway for MemoryGateway {
    fn execute(
        &self,
        mode: Option<ModalMode>,
        payload: Option<&Note>,
    ) -> Result<Vec<Note>, GatewayError> {
        self.calls.borrow_mut().push(mode);
        route_for("memory", mode, payload)?;

        let scripted = {
            let mut failures = self.failures.borrow_mut();
            failures
                .iter()
                .position(|(failing, _)| *failing == mode)
                .map(|idx| failures.remove(idx).1)
        };
        if let Some(message) = scripted {
            return Err(GatewayError::Status {
                status: 503,
                message,
            });
        }

        let mut notes = self.notes.borrow_mut();
        match mode {
            None => {}
            Some(ModalMode::Create) => {
                let id = self.next_id.get();
                self.next_id.set(id + 1);
                let mut created = payload.cloned().unwrap_or_default();
                created.id = Some(id.to_string());
                created.created_at = Some(FIXED_TIMESTAMP.into());
                created.updated_at = Some(FIXED_TIMESTAMP.into());
                created.owner_id = Some("owner-1".into());
                notes.push(created);
            }
            Some(ModalMode::Edit) => {
                let Some(patch) = payload else {
                    return Ok(notes.clone());
                };
                if let Some(existing) = notes.iter_mut().find(|note| note.id() == patch.id()) {
                    if patch.title.is_some() {
                        existing.title = patch.title.clone();
                    }
                    if patch.description.is_some() {
                        existing.description = patch.description.clone();
                    }
                    existing.updated_at = Some("2024-05-02T08:30:00Z".into());
                } else {
                    return Err(GatewayError::Status {
                        status: 404,
                        message: "Request failed with status code 404".into(),
                    });
                }
            }
            Some(ModalMode::Delete) => {
                let id = payload.and_then(Note::id).map(str::to_string);
                notes.retain(|note| note.id().map(str::to_string) != id);
            }
        }
        Ok(notes.clone())
    }
}
