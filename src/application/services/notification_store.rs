//! Notification Store
//!
//! Ordered, most-recent-first collection of notification records with an
//! unread counter. The counter always equals the number of records whose
//! read flag is false.

use std::collections::{HashSet, VecDeque};

use crate::domain::events::NotificationPayload;
use crate::domain::{NotificationId, NotificationKind, NotificationRecord};
use crate::shared::snowflake::ReceiptIdGenerator;

/// Result of an ingest call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted(NotificationId),
    /// A record with the same server id is already stored
    Duplicate(NotificationId),
}

/// In-memory notification store
#[derive(Debug, Default)]
pub struct NotificationStore {
    records: VecDeque<NotificationRecord>,
    index: HashSet<NotificationId>,
    unread: usize,
    ids: ReceiptIdGenerator,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivered notification at the front of the collection.
    pub fn ingest(&mut self, payload: NotificationPayload) -> IngestOutcome {
        let id = match payload.id {
            Some(server_id) => NotificationId::Server(server_id),
            None => NotificationId::Local(self.ids.generate()),
        };

        if self.index.contains(&id) {
            tracing::debug!(notification_id = %id, "Duplicate notification delivery ignored");
            return IngestOutcome::Duplicate(id);
        }

        let kind = payload
            .kind
            .as_deref()
            .map(NotificationKind::from_wire)
            .unwrap_or_default();
        let mut record = NotificationRecord::new(id.clone(), kind, payload.title, payload.message);
        if let Some(level) = payload.kind {
            record = record.with_level(level);
        }

        self.index.insert(id.clone());
        self.records.push_front(record);
        self.unread += 1;

        tracing::debug!(notification_id = %id, kind = %kind, unread = self.unread, "Notification ingested");
        IngestOutcome::Inserted(id)
    }

    /// Append older records from the history collaborator.
    ///
    /// `history` is most-recent-first; records already present are skipped.
    /// Returns the number of records added.
    pub fn hydrate(&mut self, history: Vec<NotificationRecord>) -> usize {
        let mut added = 0;
        for record in history {
            if !self.index.insert(record.id.clone()) {
                continue;
            }
            if !record.is_read() {
                self.unread += 1;
            }
            self.records.push_back(record);
            added += 1;
        }
        added
    }

    /// Mark one record read. Unknown ids are a no-op. Returns true if a flag changed.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| &r.id == id) else {
            tracing::debug!(notification_id = %id, "mark_read on unknown notification");
            return false;
        };
        if record.mark_read() {
            self.unread = self.unread.saturating_sub(1);
            true
        } else {
            false
        }
    }

    /// Mark everything read. Returns the number of flags changed.
    pub fn mark_all_read(&mut self) -> usize {
        let changed = self
            .records
            .iter_mut()
            .map(|record| record.mark_read())
            .filter(|changed| *changed)
            .count();
        self.unread = 0;
        changed
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
        self.unread = 0;
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &NotificationId) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Records, most recent first
    pub fn records(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.records.iter()
    }
}
