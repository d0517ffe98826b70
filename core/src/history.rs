//! Linear undo/redo log of whole-surface snapshots.
//!
//! Capturing while the cursor is behind the newest entry discards every
//! entry after the cursor: a new edit loses the redo branch. Undo and redo
//! at the ends of the log are silent no-ops.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Opaque serialized state of the whole drawing surface. Immutable once
/// captured; cloning shares the payload.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Arc<str>);

impl Snapshot {
    pub fn new(data: impl Into<Arc<str>>) -> Self {
        Self(data.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}

impl From<String> for Snapshot {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Snapshot {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A mutation of the [`History`] log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    Capture(Snapshot),
    Undo,
    Redo,
    Clear,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<Snapshot>,
    /// Index of the active entry; `None` iff `entries` is empty.
    cursor: Option<usize>,
    limit: Option<NonZeroUsize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that keeps at most `limit` snapshots, dropping the oldest.
    pub fn with_limit(limit: Option<NonZeroUsize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Active position, or `-1` for an empty log.
    pub fn step(&self) -> i64 {
        self.cursor
            .and_then(|cursor| i64::try_from(cursor).ok())
            .unwrap_or(-1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor + 1 < self.entries.len())
    }

    pub fn capture(&mut self, snapshot: Snapshot) {
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.truncate(keep);
        self.entries.push(snapshot);

        if let Some(limit) = self.limit {
            let overflow = self.entries.len().saturating_sub(limit.get());
            if overflow > 0 {
                self.entries.drain(..overflow);
            }
        }
        self.cursor = self.entries.len().checked_sub(1);
    }

    /// Steps back one entry and returns the snapshot to apply.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        let cursor = self.cursor? - 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    /// Steps forward one entry and returns the snapshot to apply.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        let cursor = self.cursor? + 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Applies `action` and returns the snapshot the surface should load,
    /// if the action moved the cursor onto an existing entry.
    pub fn apply(&mut self, action: HistoryAction) -> Option<Snapshot> {
        match action {
            HistoryAction::Capture(snapshot) => {
                self.capture(snapshot);
                None
            }
            HistoryAction::Undo => self.undo().cloned(),
            HistoryAction::Redo => self.redo().cloned(),
            HistoryAction::Clear => {
                self.clear();
                None
            }
        }
    }
}
