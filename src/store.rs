use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::{
    Client, Invoice, NewClient, NewInvoice, NewScheduleEntry, Note, NoteAttachment, ScheduleEntry,
    Weekday,
};
use crate::persist::BlobStore;
use crate::utils::{get_current_date_string, parse_time, timestamp_now};

/// Namespace key the whole aggregate is stored under.
pub const STORE_NAMESPACE: &str = "omc.store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no record with id {0}")]
    NotFound(i64),
}

fn default_next_id() -> i64 {
    1
}

/// The serialized aggregate. Missing collections in an old blob default
/// to empty so a load never fails on shape drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Aggregate {
    #[serde(default = "default_next_id")]
    next_id: i64,
    #[serde(default)]
    clients: Vec<Client>,
    #[serde(default)]
    schedule: [Vec<ScheduleEntry>; 7],
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    invoices: Vec<Invoice>,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            next_id: default_next_id(),
            clients: Vec::new(),
            schedule: Default::default(),
            notes: Vec::new(),
            invoices: Vec::new(),
        }
    }
}

impl Aggregate {
    /// Ids must stay unique even when the blob was edited by hand.
    fn normalize(&mut self) {
        let mut max_id = 0;
        for client in &self.clients {
            max_id = max_id.max(client.id);
        }
        for day in &self.schedule {
            for entry in day {
                max_id = max_id.max(entry.id);
            }
        }
        for note in &self.notes {
            max_id = max_id.max(note.id);
        }
        for invoice in &self.invoices {
            max_id = max_id.max(invoice.id);
        }
        if self.next_id <= max_id {
            self.next_id = max_id + 1;
        }
    }
}

/// Headline numbers for the dashboard view.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub clients: usize,
    pub jobs_today: usize,
    pub jobs_completed: usize,
    pub invoices: usize,
    pub revenue: f64,
}

/// What a client removal would leave dangling. Callers show this, get
/// confirmation, then commit with `remove_client`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalImpact {
    pub schedule_entries: usize,
    pub invoices: usize,
}

impl RemovalImpact {
    pub fn is_clean(&self) -> bool {
        self.schedule_entries == 0 && self.invoices == 0
    }
}

/// In-memory aggregate of clients, the weekly schedule, notes and the
/// invoice history. Loaded once from the blob store at open and written
/// through after every mutation. In-memory state stays authoritative for
/// the session even when a write-through fails.
pub struct RecordStore {
    state: Aggregate,
    blobs: Box<dyn BlobStore>,
}

impl RecordStore {
    /// Load the aggregate from the blob store. Any load failure falls back
    /// to an empty aggregate; opening never fails because of blob content.
    pub fn open(blobs: Box<dyn BlobStore>) -> Self {
        let mut state = match blobs.load(STORE_NAMESPACE) {
            Ok(Some(blob)) => match serde_json::from_str(&blob) {
                Ok(state) => state,
                Err(e) => {
                    warn!("discarding unreadable store blob: {e}");
                    Aggregate::default()
                }
            },
            Ok(None) => Aggregate::default(),
            Err(e) => {
                warn!("failed to read store blob: {e}");
                Aggregate::default()
            }
        };
        state.normalize();
        RecordStore { state, blobs }
    }

    /// Write-through after a mutation. A failed write is logged and the
    /// operation still reports success; the in-memory state remains the
    /// source of truth for the rest of the session.
    fn persist(&mut self) {
        let blob = match serde_json::to_string(&self.state) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("failed to serialize store state: {e}");
                return;
            }
        };
        if let Err(e) = self.blobs.save(STORE_NAMESPACE, &blob) {
            warn!("failed to persist store state: {e}");
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.state.next_id;
        self.state.next_id += 1;
        id
    }

    pub fn add_client(&mut self, fields: NewClient) -> Result<Client, StoreError> {
        if fields.name.trim().is_empty() {
            return Err(StoreError::Validation("client name is required".to_string()));
        }
        if fields.address.trim().is_empty() {
            return Err(StoreError::Validation(
                "client address is required".to_string(),
            ));
        }
        if fields.phone.trim().is_empty() {
            return Err(StoreError::Validation(
                "client phone is required".to_string(),
            ));
        }

        let client = Client {
            id: self.allocate_id(),
            name: fields.name,
            address: fields.address,
            phone: fields.phone,
            email: fields.email,
            notes: fields.notes,
            created_at: timestamp_now(),
        };
        self.state.clients.push(client.clone());
        self.persist();
        Ok(client)
    }

    /// Removing an absent id is a no-op, not an error. Schedule entries
    /// and invoices referencing the client are left in place; their
    /// client id resolves to no client afterwards.
    pub fn remove_client(&mut self, id: i64) {
        self.state.clients.retain(|c| c.id != id);
        self.persist();
    }

    pub fn client_removal_impact(&self, id: i64) -> RemovalImpact {
        RemovalImpact {
            schedule_entries: self
                .state
                .schedule
                .iter()
                .flatten()
                .filter(|e| e.client_id == id)
                .count(),
            invoices: self
                .state
                .invoices
                .iter()
                .filter(|i| i.client_id == id)
                .count(),
        }
    }

    pub fn find_client(&self, id: i64) -> Option<&Client> {
        self.state.clients.iter().find(|c| c.id == id)
    }

    pub fn clients(&self) -> &[Client] {
        &self.state.clients
    }

    /// Case-insensitive match on name, phone or email.
    pub fn search_clients(&self, query: &str) -> Vec<&Client> {
        let needle = query.to_lowercase();
        self.state
            .clients
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.phone.contains(query)
                    || c.email
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn add_schedule_entry(
        &mut self,
        day: Weekday,
        fields: NewScheduleEntry,
    ) -> Result<ScheduleEntry, StoreError> {
        if fields.client_id <= 0 {
            return Err(StoreError::Validation(
                "schedule entry needs a client".to_string(),
            ));
        }

        let entry = ScheduleEntry {
            id: self.allocate_id(),
            client_id: fields.client_id,
            day,
            time: fields.time,
            duration_hours: fields.duration_hours,
            summary: fields.summary,
            completed: false,
            created_at: timestamp_now(),
        };
        let sequence = &mut self.state.schedule[day.index()];
        sequence.push(entry.clone());
        sort_by_time(sequence);
        self.persist();
        Ok(entry)
    }

    pub fn set_schedule_completion(&mut self, id: i64, completed: bool) -> Result<(), StoreError> {
        let (day_index, position) = self.locate_entry(id)?;
        self.state.schedule[day_index][position].completed = completed;
        self.persist();
        Ok(())
    }

    pub fn remove_schedule_entry(&mut self, id: i64) -> Result<(), StoreError> {
        let (day_index, position) = self.locate_entry(id)?;
        self.state.schedule[day_index].remove(position);
        self.persist();
        Ok(())
    }

    /// Move an entry to another day and time slot. The entry leaves its
    /// source day's sequence and the destination sequence is re-sorted.
    pub fn move_schedule_entry(
        &mut self,
        id: i64,
        new_day: Weekday,
        new_time: String,
        new_duration: f64,
    ) -> Result<(), StoreError> {
        if !(new_duration.is_finite() && new_duration >= 0.0) {
            return Err(StoreError::Validation(
                "duration must be a non-negative number of hours".to_string(),
            ));
        }
        let (day_index, position) = self.locate_entry(id)?;

        let mut entry = self.state.schedule[day_index].remove(position);
        entry.day = new_day;
        entry.time = new_time;
        entry.duration_hours = new_duration;
        let destination = &mut self.state.schedule[new_day.index()];
        destination.push(entry);
        sort_by_time(destination);
        self.persist();
        Ok(())
    }

    pub fn entries_for_day(&self, day: Weekday) -> &[ScheduleEntry] {
        &self.state.schedule[day.index()]
    }

    pub fn find_schedule_entry(&self, id: i64) -> Option<&ScheduleEntry> {
        self.state.schedule.iter().flatten().find(|e| e.id == id)
    }

    fn locate_entry(&self, id: i64) -> Result<(usize, usize), StoreError> {
        for (day_index, sequence) in self.state.schedule.iter().enumerate() {
            if let Some(position) = sequence.iter().position(|e| e.id == id) {
                return Ok((day_index, position));
            }
        }
        Err(StoreError::NotFound(id))
    }

    pub fn add_note(&mut self, text: String, attachment: Option<NoteAttachment>) -> Note {
        let note = Note {
            id: self.allocate_id(),
            text,
            attachment,
            created_at: timestamp_now(),
        };
        // Most-recent-first, like the invoice history.
        self.state.notes.insert(0, note.clone());
        self.persist();
        note
    }

    pub fn remove_note(&mut self, id: i64) {
        self.state.notes.retain(|n| n.id != id);
        self.persist();
    }

    pub fn notes(&self) -> &[Note] {
        &self.state.notes
    }

    /// Record a composed invoice at the front of the history. The invoice
    /// history is append-only; records are never mutated or deleted.
    pub fn record_invoice(&mut self, fields: NewInvoice) -> Result<Invoice, StoreError> {
        if !fields.items.iter().any(|i| i.is_billable()) {
            return Err(StoreError::Validation(
                "invoice needs at least one line item".to_string(),
            ));
        }
        if self.find_client(fields.client_id).is_none() {
            return Err(StoreError::Validation(format!(
                "invoice references unknown client {}",
                fields.client_id
            )));
        }

        let invoice_number = match fields.invoice_number.map(|n| n.trim().to_string()) {
            Some(number) if !number.is_empty() => number,
            _ => format!("INV-{:04}", self.state.invoices.len() + 1),
        };

        let invoice = Invoice {
            id: self.allocate_id(),
            client_id: fields.client_id,
            invoice_number,
            issue_date: fields.issue_date.unwrap_or_else(get_current_date_string),
            notes: fields.notes,
            items: fields.items,
            totals: fields.totals,
            created_at: timestamp_now(),
        };
        self.state.invoices.insert(0, invoice.clone());
        self.persist();
        Ok(invoice)
    }

    /// Invoice history, most recently created first.
    pub fn list_invoices(&self, limit: Option<usize>) -> &[Invoice] {
        match limit {
            Some(limit) => &self.state.invoices[..limit.min(self.state.invoices.len())],
            None => &self.state.invoices,
        }
    }

    pub fn find_invoice(&self, id: i64) -> Option<&Invoice> {
        self.state.invoices.iter().find(|i| i.id == id)
    }

    pub fn dashboard_stats(&self) -> DashboardStats {
        DashboardStats {
            clients: self.state.clients.len(),
            jobs_today: self.entries_for_day(Weekday::today()).len(),
            jobs_completed: self
                .state
                .schedule
                .iter()
                .flatten()
                .filter(|e| e.completed)
                .count(),
            invoices: self.state.invoices.len(),
            revenue: self.state.invoices.iter().map(|i| i.totals.total_due).sum(),
        }
    }
}

/// Keep a day's sequence time-ascending. Sorting is stable, so entries
/// sharing a time slot keep their insertion order.
fn sort_by_time(sequence: &mut [ScheduleEntry]) {
    sequence.sort_by_key(|e| parse_time(&e.time).unwrap_or(0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemCategory, LineItem};
    use crate::persist::{MemoryBlobStore, PersistError};
    use crate::totals::compute_totals;

    fn empty_store() -> RecordStore {
        RecordStore::open(Box::new(MemoryBlobStore::new()))
    }

    fn client_fields(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
            address: "1200 Frederica St".to_string(),
            phone: "270-555-0142".to_string(),
            email: None,
            notes: None,
        }
    }

    fn job_at(client_id: i64, time: &str) -> NewScheduleEntry {
        NewScheduleEntry {
            client_id,
            time: time.to_string(),
            duration_hours: 1.0,
            summary: "Weekly mow".to_string(),
        }
    }

    fn mowing_invoice(client_id: i64) -> NewInvoice {
        let items = vec![LineItem::new(
            ItemCategory::Labor,
            "Mowing".to_string(),
            2.0,
            50.0,
        )];
        let totals = compute_totals(&items, 0.06, false, false);
        NewInvoice {
            client_id,
            invoice_number: None,
            issue_date: None,
            notes: None,
            items,
            totals,
        }
    }

    #[test]
    fn add_client_with_blank_phone_fails_and_changes_nothing() {
        let mut store = empty_store();
        let mut fields = client_fields("Ada Byron");
        fields.phone = "  ".to_string();

        let result = store.add_client(fields);
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.clients().len(), 0);
    }

    #[test]
    fn add_client_assigns_fresh_ids() {
        let mut store = empty_store();
        let a = store.add_client(client_fields("Ada Byron")).unwrap();
        let b = store.add_client(client_fields("Blaise Pascal")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.find_client(a.id).unwrap().name, "Ada Byron");
    }

    #[test]
    fn remove_client_is_a_noop_when_absent() {
        let mut store = empty_store();
        store.add_client(client_fields("Ada Byron")).unwrap();
        store.remove_client(9999);
        assert_eq!(store.clients().len(), 1);
    }

    #[test]
    fn removing_a_referenced_client_leaves_the_entry_dangling() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        let entry = store
            .add_schedule_entry(Weekday::Tuesday, job_at(client.id, "09:00"))
            .unwrap();

        store.remove_client(client.id);

        let remaining = store.entries_for_day(Weekday::Tuesday);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, entry.id);
        assert!(store.find_client(remaining[0].client_id).is_none());
    }

    #[test]
    fn removal_impact_counts_references() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        store
            .add_schedule_entry(Weekday::Monday, job_at(client.id, "08:00"))
            .unwrap();
        store
            .add_schedule_entry(Weekday::Friday, job_at(client.id, "10:00"))
            .unwrap();
        store.record_invoice(mowing_invoice(client.id)).unwrap();

        let impact = store.client_removal_impact(client.id);
        assert_eq!(impact.schedule_entries, 2);
        assert_eq!(impact.invoices, 1);
        assert!(!impact.is_clean());
        assert!(store.client_removal_impact(9999).is_clean());
    }

    #[test]
    fn search_matches_name_phone_and_email() {
        let mut store = empty_store();
        let mut fields = client_fields("Ada Byron");
        fields.email = Some("ada@example.com".to_string());
        store.add_client(fields).unwrap();
        store.add_client(client_fields("Blaise Pascal")).unwrap();

        assert_eq!(store.search_clients("ada").len(), 1);
        assert_eq!(store.search_clients("270-555").len(), 2);
        assert_eq!(store.search_clients("EXAMPLE.COM").len(), 1);
        assert!(store.search_clients("nobody").is_empty());
    }

    #[test]
    fn schedule_entry_requires_a_client() {
        let mut store = empty_store();
        let result = store.add_schedule_entry(Weekday::Monday, job_at(0, "09:00"));
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn day_sequences_stay_time_ascending() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        store
            .add_schedule_entry(Weekday::Monday, job_at(client.id, "13:30"))
            .unwrap();
        store
            .add_schedule_entry(Weekday::Monday, job_at(client.id, "08:00"))
            .unwrap();
        let middle = store
            .add_schedule_entry(Weekday::Monday, job_at(client.id, "10:15"))
            .unwrap();

        let times = |store: &RecordStore, day| {
            store
                .entries_for_day(day)
                .iter()
                .map(|e| e.time.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(times(&store, Weekday::Monday), ["08:00", "10:15", "13:30"]);

        store.remove_schedule_entry(middle.id).unwrap();
        assert_eq!(times(&store, Weekday::Monday), ["08:00", "13:30"]);

        // Move the late Monday job into an occupied Thursday slot list.
        let late = store.entries_for_day(Weekday::Monday)[1].id;
        store
            .add_schedule_entry(Weekday::Thursday, job_at(client.id, "07:45"))
            .unwrap();
        store
            .add_schedule_entry(Weekday::Thursday, job_at(client.id, "16:00"))
            .unwrap();
        store
            .move_schedule_entry(late, Weekday::Thursday, "12:00".to_string(), 2.0)
            .unwrap();

        assert_eq!(times(&store, Weekday::Monday), ["08:00"]);
        assert_eq!(times(&store, Weekday::Thursday), ["07:45", "12:00", "16:00"]);
        let moved = store.find_schedule_entry(late).unwrap();
        assert_eq!(moved.day, Weekday::Thursday);
        assert_eq!(moved.duration_hours, 2.0);
    }

    #[test]
    fn move_rejects_bad_durations_and_missing_ids() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        let entry = store
            .add_schedule_entry(Weekday::Monday, job_at(client.id, "09:00"))
            .unwrap();

        let result =
            store.move_schedule_entry(entry.id, Weekday::Tuesday, "10:00".to_string(), -1.0);
        assert!(matches!(result, Err(StoreError::Validation(_))));
        // The rejected move must not have touched the entry.
        assert_eq!(store.find_schedule_entry(entry.id).unwrap().day, Weekday::Monday);

        let result = store.move_schedule_entry(9999, Weekday::Tuesday, "10:00".to_string(), 1.0);
        assert!(matches!(result, Err(StoreError::NotFound(9999))));
    }

    #[test]
    fn completion_updates_are_surfaced_when_missing() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        let entry = store
            .add_schedule_entry(Weekday::Wednesday, job_at(client.id, "09:00"))
            .unwrap();

        store.set_schedule_completion(entry.id, true).unwrap();
        assert!(store.find_schedule_entry(entry.id).unwrap().completed);
        store.set_schedule_completion(entry.id, false).unwrap();
        assert!(!store.find_schedule_entry(entry.id).unwrap().completed);

        assert!(matches!(
            store.set_schedule_completion(9999, true),
            Err(StoreError::NotFound(9999))
        ));
    }

    #[test]
    fn notes_are_kept_most_recent_first() {
        let mut store = empty_store();
        store.add_note("first".to_string(), None);
        store.add_note("second".to_string(), None);

        let texts: Vec<_> = store.notes().iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, ["second", "first"]);

        store.remove_note(9999); // no-op
        assert_eq!(store.notes().len(), 2);
        let first_id = store.notes()[1].id;
        store.remove_note(first_id);
        assert_eq!(store.notes()[0].text, "second");
    }

    #[test]
    fn record_invoice_requires_billable_items_and_a_known_client() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();

        let mut no_items = mowing_invoice(client.id);
        no_items.items.clear();
        assert!(matches!(
            store.record_invoice(no_items),
            Err(StoreError::Validation(_))
        ));

        let mut blank_items = mowing_invoice(client.id);
        blank_items.items[0].description = " ".to_string();
        assert!(matches!(
            store.record_invoice(blank_items),
            Err(StoreError::Validation(_))
        ));

        assert!(matches!(
            store.record_invoice(mowing_invoice(9999)),
            Err(StoreError::Validation(_))
        ));
        assert!(store.list_invoices(None).is_empty());
    }

    #[test]
    fn invoices_are_auto_numbered_and_listed_most_recent_first() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();

        let first = store.record_invoice(mowing_invoice(client.id)).unwrap();
        let mut custom = mowing_invoice(client.id);
        custom.invoice_number = Some("2026-07".to_string());
        let second = store.record_invoice(custom).unwrap();
        let third = store.record_invoice(mowing_invoice(client.id)).unwrap();

        assert_eq!(first.invoice_number, "INV-0001");
        assert_eq!(second.invoice_number, "2026-07");
        assert_eq!(third.invoice_number, "INV-0003");

        let history: Vec<_> = store.list_invoices(None).iter().map(|i| i.id).collect();
        assert_eq!(history, [third.id, second.id, first.id]);
        assert_eq!(store.list_invoices(Some(2)).len(), 2);
        assert_eq!(store.list_invoices(Some(10)).len(), 3);
    }

    #[test]
    fn dashboard_stats_summarize_the_aggregate() {
        let mut store = empty_store();
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        let entry = store
            .add_schedule_entry(Weekday::today(), job_at(client.id, "09:00"))
            .unwrap();
        store.set_schedule_completion(entry.id, true).unwrap();
        let invoice = store.record_invoice(mowing_invoice(client.id)).unwrap();

        let stats = store.dashboard_stats();
        assert_eq!(stats.clients, 1);
        assert_eq!(stats.jobs_today, 1);
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.invoices, 1);
        assert_eq!(stats.revenue, invoice.totals.total_due);
    }

    #[test]
    fn corrupt_blob_falls_back_to_an_empty_store() {
        let mut blobs = MemoryBlobStore::new();
        blobs.save(STORE_NAMESPACE, "not json {{{").unwrap();

        let store = RecordStore::open(Box::new(blobs));
        assert!(store.clients().is_empty());
        assert!(store.list_invoices(None).is_empty());
    }

    #[test]
    fn state_survives_a_reopen_and_ids_stay_unique() {
        let blobs = MemoryBlobStore::new();
        let mut store = RecordStore::open(Box::new(blobs.clone()));
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        store
            .add_schedule_entry(Weekday::Friday, job_at(client.id, "09:00"))
            .unwrap();
        store.add_note("gate code 4411".to_string(), None);

        let mut reopened = RecordStore::open(Box::new(blobs));
        assert_eq!(reopened.clients().len(), 1);
        assert_eq!(reopened.entries_for_day(Weekday::Friday).len(), 1);
        assert_eq!(reopened.notes()[0].text, "gate code 4411");

        let next = reopened.add_client(client_fields("Blaise Pascal")).unwrap();
        assert!(next.id > client.id);
    }

    struct FailingBlobStore;

    impl BlobStore for FailingBlobStore {
        fn load(&self, _namespace: &str) -> Result<Option<String>, PersistError> {
            Ok(None)
        }

        fn save(&mut self, _namespace: &str, _blob: &str) -> Result<(), PersistError> {
            Err(PersistError::DirectoryError("disk gone".to_string()))
        }
    }

    #[test]
    fn persistence_failure_does_not_fail_the_operation() {
        let mut store = RecordStore::open(Box::new(FailingBlobStore));
        let client = store.add_client(client_fields("Ada Byron")).unwrap();
        assert_eq!(store.clients().len(), 1);
        assert_eq!(store.find_client(client.id).unwrap().name, "Ada Byron");
    }
}
