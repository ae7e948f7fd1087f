use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

/// A note as exchanged with the notes API.
///
/// Every field is optional so the same type can carry half-filled drafts,
/// delete payloads that only hold an id, and fully persisted notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(
        default,
        rename = "userId",
        alias = "ownerId",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_id: Option<String>,
}

impl Note {
    pub fn draft(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Payload for an edit: id plus the new title and description.
    pub fn edited(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            title: Some(title.into()),
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn reference(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Server ids are never empty; an empty string counts as absent.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    pub fn is_persisted(&self) -> bool {
        self.id().is_some() && self.created_at.is_some() && self.updated_at.is_some()
    }

    pub fn is_placeholder(&self) -> bool {
        self.id().is_none() && self.title().is_empty() && self.description().is_empty()
    }

    pub fn created_label(&self) -> Option<String> {
        self.created_at.as_deref().map(format_short_date_time)
    }

    pub fn updated_label(&self) -> Option<String> {
        self.updated_at.as_deref().map(format_short_date_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum ModalMode {
    #[default]
    Create,
    Edit,
    Delete,
}

impl ModalMode {
    pub fn heading(self) -> String {
        format!("{self} Note")
    }
}

/// `10/17/2026, 3:04 PM`. Unparseable input is shown as-is.
pub fn format_short_date_time(raw: &str) -> String {
    let format = format_description!(
        "[month padding:none]/[day padding:none]/[year], [hour repr:12 padding:none]:[minute] [period]"
    );
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .and_then(|dt| dt.format(&format).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// `Saturday, October 17, 2026`
pub fn format_long_date(dt: OffsetDateTime) -> String {
    let format = format_description!("[weekday], [month repr:long] [day padding:none], [year]");
    dt.format(&format).unwrap_or_else(|_| dt.date().to_string())
}

pub fn today_label() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_long_date(now)
}
