use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::app::{App, AppState};
use crate::config::NotificationOptions;
use crate::gateway::NoteGateway;
use crate::note::Note;

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note
    #[arg()]
    pub title: String,
    /// Provide the description inline. If omitted, reads from stdin.
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Note identifier
    pub id: String,
    /// Replacement title
    #[arg(long)]
    pub title: Option<String>,
    /// Replacement description
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Note identifier
    pub id: String,
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

pub fn run_tui<G: NoteGateway>(app: &mut App<G>) -> Result<()> {
    app.run()
}

pub fn list_notes<G: NoteGateway + ?Sized>(gateway: &G) -> Result<()> {
    let state = loaded_state(gateway)?;
    print!("{}", format_note_list(&state.notes));
    Ok(())
}

pub fn new_note<G: NoteGateway + ?Sized>(gateway: &G, args: NewArgs) -> Result<()> {
    let description = match args.description {
        Some(description) => description,
        None => read_stdin()?.unwrap_or_default(),
    };
    let output = create_note(gateway, &args.title, &description)?;
    print!("{output}");
    Ok(())
}

pub fn edit_note<G: NoteGateway + ?Sized>(gateway: &G, args: EditArgs) -> Result<()> {
    let output = apply_edit(gateway, args)?;
    print!("{output}");
    Ok(())
}

pub fn delete_note<G: NoteGateway + ?Sized>(gateway: &G, args: DeleteArgs) -> Result<()> {
    let output = apply_delete(gateway, args)?;
    print!("{output}");
    Ok(())
}

fn loaded_state<G: NoteGateway + ?Sized>(gateway: &G) -> Result<AppState> {
    let mut state = AppState::new(&NotificationOptions::default());
    state.reload(gateway).context("loading notes")?;
    Ok(state)
}

fn create_note<G: NoteGateway + ?Sized>(
    gateway: &G,
    title: &str,
    description: &str,
) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        bail!("note title cannot be empty");
    }
    let description = description.trim_end();
    if description.is_empty() {
        bail!("note description cannot be empty");
    }

    let mut state = loaded_state(gateway)?;
    let known: HashSet<String> = state
        .notes
        .iter()
        .filter_map(|note| note.id().map(str::to_string))
        .collect();
    state
        .create(gateway, Note::draft(title, description))
        .context("creating note")?;

    let created = state
        .notes
        .iter()
        .find(|note| note.id().is_some_and(|id| !known.contains(id)));
    Ok(match created.and_then(Note::id) {
        Some(id) => format!("Created note #{id}  {title}\n"),
        None => format!("Created note  {title}\n"),
    })
}

fn apply_edit<G: NoteGateway + ?Sized>(gateway: &G, args: EditArgs) -> Result<String> {
    if args.title.is_none() && args.description.is_none() {
        bail!("nothing to change; pass --title and/or --description");
    }
    let mut state = loaded_state(gateway)?;
    let current = find_note(&state, &args.id)?;

    let title = args
        .title
        .map(|t| t.trim().to_owned())
        .unwrap_or_else(|| current.title().to_owned());
    let description = args
        .description
        .map(|d| d.trim_end().to_owned())
        .unwrap_or_else(|| current.description().to_owned());
    if title.is_empty() || description.is_empty() {
        bail!("title and description cannot be empty");
    }

    state.select_note(current);
    state
        .edit(gateway, Note::edited(args.id.as_str(), title, description))
        .with_context(|| format!("updating note #{}", args.id))?;

    let updated = find_note(&state, &args.id)?;
    let mut out = format!("Updated note #{}  {}\n", args.id, updated.title());
    if let Some(label) = updated.updated_label() {
        let _ = writeln!(&mut out, "    updated {label}");
    }
    Ok(out)
}

fn apply_delete<G: NoteGateway + ?Sized>(gateway: &G, args: DeleteArgs) -> Result<String> {
    if !args.yes {
        bail!("refusing to delete note #{} without --yes", args.id);
    }
    let mut state = loaded_state(gateway)?;
    let target = find_note(&state, &args.id)?;

    state.select_note(target.clone());
    state
        .confirm_delete(gateway, Note::reference(args.id.as_str()))
        .with_context(|| format!("deleting note #{}", args.id))?;
    Ok(format!("Deleted note #{}  {}\n", args.id, target.title()))
}

fn find_note(state: &AppState, id: &str) -> Result<Note> {
    match state.notes.iter().find(|note| note.id() == Some(id)) {
        Some(note) => Ok(note.clone()),
        None => bail!("note #{id} not found"),
    }
}

fn format_note_list(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No notes yet.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let _ = writeln!(
            &mut out,
            "#{}  {}",
            note.id().unwrap_or("?"),
            note.title()
        );
        match (note.created_label(), note.updated_label()) {
            (Some(created), Some(updated)) => {
                let _ = writeln!(&mut out, "    created {created}   updated {updated}");
            }
            (Some(created), None) => {
                let _ = writeln!(&mut out, "    created {created}");
            }
            (None, Some(updated)) => {
                let _ = writeln!(&mut out, "    updated {updated}");
            }
            (None, None) => {}
        }
        if let Some(first_line) = note.description().lines().find(|l| !l.trim().is_empty()) {
            let _ = writeln!(&mut out, "    {}", first_line.trim());
        }
        out.push('\n');
    }
    out
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading description from stdin")?;
    Ok(Some(buf))
}
