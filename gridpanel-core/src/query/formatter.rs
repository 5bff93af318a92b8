//! Row formatting: turning raw rows into presentation records.
//!
//! The calling plugin supplies a [`RowFormatter`] per entity. The helpers
//! here cover the common fragments: escaped text, status badges and the
//! per-row action controls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::entity::EntityDefinition;
use super::store::RawRow;
use super::types::{PresentationRecord, RowIdentity};

/// Turns one raw row into a presentation record.
///
/// Called once per row by the query engine, before the row-output
/// extensions run.
pub trait RowFormatter: Send + Sync {
    fn format(&self, row: &RawRow, entity: &EntityDefinition) -> PresentationRecord;
}

impl<F> RowFormatter for F
where
    F: Fn(&RawRow, &EntityDefinition) -> PresentationRecord + Send + Sync,
{
    fn format(&self, row: &RawRow, entity: &EntityDefinition) -> PresentationRecord {
        self(row, entity)
    }
}

/// Default formatter: every column HTML-escaped, identity taken from the key.
#[derive(Debug, Clone, Default)]
pub struct EscapingFormatter;

impl RowFormatter for EscapingFormatter {
    fn format(&self, row: &RawRow, entity: &EntityDefinition) -> PresentationRecord {
        let mut record = match identity_from_row(row, entity) {
            Some(identity) => PresentationRecord::new().with_identity(identity),
            None => PresentationRecord::new(),
        };
        for (name, value) in row.iter() {
            let rendered = match value {
                Value::String(s) => Value::String(escape_html(s)),
                other => other.clone(),
            };
            record.set(name, rendered);
        }
        record
    }
}

/// Read the row identity from the entity's key column.
///
/// A row without a usable key is a configuration error: logged, and the
/// record is emitted without identity.
pub fn identity_from_row(row: &RawRow, entity: &EntityDefinition) -> Option<RowIdentity> {
    let key = entity.key_output_name();
    match row.get_i64(key) {
        Some(id) => Some(RowIdentity::new(entity.name.clone(), id)),
        None => {
            warn!(entity = %entity.name, key, "Row has no usable primary key; identity omitted");
            None
        }
    }
}

/// Escape text for inclusion in HTML content or attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Visual tone of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Neutral,
    Success,
    Warning,
    Danger,
    Info,
}

impl BadgeTone {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Neutral => "gp-badge--neutral",
            Self::Success => "gp-badge--success",
            Self::Warning => "gp-badge--warning",
            Self::Danger => "gp-badge--danger",
            Self::Info => "gp-badge--info",
        }
    }
}

/// Status indicator fragment.
pub fn status_badge(label: &str, tone: BadgeTone) -> String {
    format!(
        "<span class=\"gp-badge {}\">{}</span>",
        tone.css_class(),
        escape_html(label)
    )
}

/// An action control rendered in a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAction {
    /// Action key, e.g. `view`, `edit`, `delete`
    pub action: String,
    /// Visible label
    pub label: String,
    /// Optional icon class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl RowAction {
    pub fn new(action: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            label: label.into(),
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Action controls for one row.
///
/// Without an identity (or with an empty entity) the fragment is empty and
/// the omission is logged; the row itself still renders.
pub fn row_actions(identity: Option<&RowIdentity>, actions: &[RowAction]) -> String {
    let Some(identity) = identity.filter(|i| !i.entity.is_empty()) else {
        warn!("Row actions requested without entity/id; rendering none");
        return String::new();
    };
    if actions.is_empty() {
        return String::new();
    }

    let mut out = String::from("<div class=\"gp-row-actions\">");
    for action in actions {
        out.push_str(&format!(
            "<button type=\"button\" class=\"gp-row-action\" data-action=\"{}\" data-entity=\"{}\" data-id=\"{}\">",
            escape_html(&action.action),
            escape_html(&identity.entity),
            identity.id
        ));
        if let Some(icon) = &action.icon {
            out.push_str(&format!("<span class=\"{}\"></span>", escape_html(icon)));
        }
        out.push_str(&escape_html(&action.label));
        out.push_str("</button>");
    }
    out.push_str("</div>");
    out
}
