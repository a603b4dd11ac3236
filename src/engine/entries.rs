//! Entry mutation operations.
//!
//! All mutations are optimistic: in-memory state changes synchronously, then
//! the operation suspends on the network attempt (or queues the entry when
//! offline). The single-entry-per-day invariant for morning/evening types
//! lives in [`SyncEngine::add_entry`]: a second submission on the same local
//! calendar day updates the existing entry instead of duplicating it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::{EntryError, Notification, SyncEngine};
use crate::entry::{Entry, EntryType, FieldValue, Notes, SyncStatus};
use crate::validation::{
    normalize_display_scores, sanitize_entry, sanitize_notes, validate_entry, validate_new_entry,
    EntryDraft,
};

/// Partial update merged onto an existing entry. Score values are
/// display-scale (normalized on the way in); unset values delete the field.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub scores: BTreeMap<String, FieldValue>,
    pub notes: Option<Notes>,
}

impl EntryUpdate {
    #[must_use]
    pub fn score(mut self, item_id: &str, value: FieldValue) -> Self {
        self.scores.insert(item_id.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Notes) -> Self {
        self.notes = Some(notes);
        self
    }
}

impl From<EntryDraft> for EntryUpdate {
    fn from(draft: EntryDraft) -> Self {
        Self {
            scores: draft.scores,
            notes: draft.notes,
        }
    }
}

impl SyncEngine {
    /// Record a new observation set.
    ///
    /// For `morning`/`evening` drafts, an existing non-deleted entry of the
    /// same type on today's local calendar day absorbs the call as an
    /// update; `quick` drafts always create a new entry. The entry lands in
    /// memory immediately; sync happens inline when online, otherwise the
    /// entry joins the offline queue.
    pub async fn add_entry(&self, draft: EntryDraft) -> Result<Entry, EntryError> {
        let now = self.now();
        let entry_type = draft.entry_type.unwrap_or(EntryType::Quick);

        if matches!(entry_type, EntryType::Morning | EntryType::Evening) {
            let today = now.with_timezone(&self.zone()).date_naive();
            let existing = self.read_state(|state| {
                state
                    .entries
                    .iter()
                    .filter(|e| {
                        e.entry_type == entry_type
                            && !e.is_deleted
                            && e.local_day(self.zone()) == today
                    })
                    .max_by_key(|e| e.timestamp)
                    .cloned()
            });

            if let Some(existing) = existing {
                debug!(id = %existing.id, %entry_type, "collapsing onto today's entry");
                return self.update_entry(&existing.id, EntryUpdate::from(draft)).await;
            }
        }

        let entry = sanitize_entry(draft, self.zone().name(), now);
        if let Err(errors) = validate_new_entry(&entry, now) {
            self.notify(Notification::error(
                "Entry not saved",
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ));
            return Err(EntryError::Validation(errors));
        }

        // Optimistic: visible in memory before any network suspension.
        self.push_entry(entry.clone());
        let online = self.is_online();
        if !online {
            self.queue_offline(entry.clone());
        }
        self.persist().await;
        self.notify(Notification::success("Entry saved", format!("{entry_type} entry recorded")));
        info!(id = %entry.id, %entry_type, online, "entry added");

        if online {
            self.sync_entry(&entry.id).await?;
        }

        Ok(self.entry(&entry.id).unwrap_or(entry))
    }

    /// Merge updates onto an existing entry, bump `updated_at`, reset sync
    /// status to pending and attempt an immediate sync when online.
    pub async fn update_entry(&self, id: &str, update: EntryUpdate) -> Result<Entry, EntryError> {
        let now = self.now();
        let mut entry = self
            .entry(id)
            .ok_or_else(|| EntryError::NotFound(id.to_string()))?;

        let mut incoming = update.scores;
        normalize_display_scores(&mut incoming);
        for (key, value) in incoming {
            if value.is_unset() {
                entry.scores.remove(&key);
            } else {
                entry.scores.insert(key, value);
            }
        }
        if update.notes.is_some() {
            entry.notes = sanitize_notes(update.notes);
        }
        entry.updated_at = now;
        entry.sync_status = SyncStatus::Pending;

        if let Err(errors) = validate_entry(&entry) {
            self.notify(Notification::error(
                "Entry not updated",
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ));
            return Err(EntryError::Validation(errors));
        }

        self.replace_entry(entry.clone());
        self.after_mutation(entry.clone(), "Entry updated").await?;
        Ok(self.entry(id).unwrap_or(entry))
    }

    /// Soft-delete: the entry is flagged, filtered from views, restorable.
    pub async fn delete_entry(&self, id: &str) -> Result<Entry, EntryError> {
        self.set_deleted(id, true, "Entry deleted").await
    }

    /// Undo a soft delete.
    pub async fn restore_entry(&self, id: &str) -> Result<Entry, EntryError> {
        self.set_deleted(id, false, "Entry restored").await
    }

    async fn set_deleted(
        &self,
        id: &str,
        deleted: bool,
        title: &str,
    ) -> Result<Entry, EntryError> {
        let now = self.now();
        let mut entry = self
            .entry(id)
            .ok_or_else(|| EntryError::NotFound(id.to_string()))?;

        entry.is_deleted = deleted;
        entry.updated_at = now;
        entry.sync_status = SyncStatus::Pending;

        self.replace_entry(entry.clone());
        self.after_mutation(entry.clone(), title).await?;
        Ok(self.entry(id).unwrap_or(entry))
    }

    /// Shared post-mutation flow: queue or sync, persist, notify.
    async fn after_mutation(&self, entry: Entry, title: &str) -> Result<(), EntryError> {
        let online = self.is_online();
        if !online {
            self.queue_offline(entry.clone());
        }
        self.persist().await;
        self.notify(Notification::success(title, format!("{} entry", entry.entry_type)));

        if online {
            self.sync_entry(&entry.id).await?;
        }
        Ok(())
    }

    // --- Queries ---

    /// One entry by id, deleted or not.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<Entry> {
        self.read_state(|state| state.entries.iter().find(|e| e.id == id).cloned())
    }

    /// Non-deleted entries, the default view set.
    #[must_use]
    pub fn visible_entries(&self) -> Vec<Entry> {
        self.read_state(|state| {
            state
                .entries
                .iter()
                .filter(|e| !e.is_deleted)
                .cloned()
                .collect()
        })
    }

    /// Every entry including soft-deleted ones (restore views, exports).
    #[must_use]
    pub fn all_entries(&self) -> Vec<Entry> {
        self.read_state(|state| (*state.entries).clone())
    }

    /// Non-deleted entries on a local calendar day.
    #[must_use]
    pub fn entries_for_day(&self, day: NaiveDate) -> Vec<Entry> {
        self.read_state(|state| {
            state
                .entries
                .iter()
                .filter(|e| !e.is_deleted && e.local_day(self.zone()) == day)
                .cloned()
                .collect()
        })
    }
}
