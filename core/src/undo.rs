use std::collections::HashMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{PreferenceItem, PreferenceSnapshot, Section};

/// How long an edit stays undoable.
pub const UNDO_WINDOW_MS: i64 = 10_000;
const ACTION_ID_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoKind {
    Add,
    Remove,
    Update,
}

/// The write that reverses an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOp {
    /// Drop the entry that was added.
    Discard { section: Section, id: String },
    /// Put a removed entry back at the end of its list.
    Restore(PreferenceItem),
    /// Put the previous value back in place of the updated entry.
    Revert(PreferenceItem),
}

impl UndoOp {
    #[must_use]
    pub fn kind(&self) -> UndoKind {
        match self {
            Self::Discard { .. } => UndoKind::Add,
            Self::Restore(_) => UndoKind::Remove,
            Self::Revert(_) => UndoKind::Update,
        }
    }

    #[must_use]
    pub fn section(&self) -> Section {
        match self {
            Self::Discard { section, .. } => *section,
            Self::Restore(item) | Self::Revert(item) => item.section(),
        }
    }

    /// Applies the reversal to `snapshot`, returning whether anything changed.
    pub fn apply(&self, snapshot: &mut PreferenceSnapshot) -> bool {
        match self {
            Self::Discard { section, id } => snapshot.remove_item(*section, id).is_some(),
            Self::Restore(item) => {
                if snapshot.find_item(item.section(), item.id()).is_some() {
                    return false;
                }
                snapshot.insert_item(item.clone());
                true
            }
            Self::Revert(item) => snapshot.replace_item(item.clone()).is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoAction {
    pub profile_id: String,
    pub item_name: String,
    pub op: UndoOp,
    pub expires_at: DateTime<Utc>,
}

impl UndoAction {
    #[must_use]
    pub fn kind(&self) -> UndoKind {
        self.op.kind()
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.op.section()
    }

    /// Message shown when the edit is made.
    #[must_use]
    pub fn message(&self) -> String {
        let section = self.section().display_name();
        match self.kind() {
            UndoKind::Add => format!("Added \"{}\" to {section}", self.item_name),
            UndoKind::Remove => format!("Removed \"{}\" from {section}", self.item_name),
            UndoKind::Update => format!("Updated \"{}\" in {section}", self.item_name),
        }
    }

    /// Message shown once the edit has been undone.
    #[must_use]
    pub fn undo_message(&self) -> String {
        let section = self.section().display_name();
        match self.kind() {
            UndoKind::Add => format!("Removed \"{}\" from {section}", self.item_name),
            UndoKind::Remove => format!("Restored \"{}\" to {section}", self.item_name),
            UndoKind::Update => format!("Reverted changes to {section}"),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Handle returned to the caller for a registered undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoTicket {
    pub id: String,
    pub kind: UndoKind,
    pub section: Section,
    pub message: String,
    pub expires_at: String,
}

/// Pending undo actions keyed by short random ids.
///
/// Owned by whoever drives edits (a CLI invocation, or one per storage scope
/// in the server) and passed into each edit.
#[derive(Debug)]
pub struct UndoRegistry {
    actions: HashMap<String, UndoAction>,
    window: Duration,
}

impl Default for UndoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Duration::milliseconds(UNDO_WINDOW_MS))
    }

    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            actions: HashMap::new(),
            window,
        }
    }

    fn fresh_id(&self) -> String {
        loop {
            let id: String = Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(ACTION_ID_LEN)
                .collect();
            if !self.actions.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn register(
        &mut self,
        profile_id: &str,
        item_name: &str,
        op: UndoOp,
        now: DateTime<Utc>,
    ) -> UndoTicket {
        self.purge_expired(now);
        let action = UndoAction {
            profile_id: profile_id.to_string(),
            item_name: item_name.to_string(),
            op,
            expires_at: now + self.window,
        };
        let id = self.fresh_id();
        let ticket = UndoTicket {
            id: id.clone(),
            kind: action.kind(),
            section: action.section(),
            message: action.message(),
            expires_at: action
                .expires_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.actions.insert(id, action);
        ticket
    }

    /// Removes and returns the action if it is still live. Each id can be taken once.
    pub fn take(&mut self, id: &str, now: DateTime<Utc>) -> Option<UndoAction> {
        self.purge_expired(now);
        self.actions.remove(id)
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.actions.len();
        self.actions.retain(|_, a| !a.is_expired(now));
        before - self.actions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
