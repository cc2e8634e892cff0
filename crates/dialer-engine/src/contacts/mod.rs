//! # Contact Store
//!
//! Contact records and their dialing state. Reads go through the store;
//! attempt and outcome fields are written only by the outcome recorder, and
//! lock state is owned by the lease manager.

pub mod ingest;

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info};

pub use crate::database::{Contact, LockState};
use crate::config::IngestConfig;
use crate::database::{CallRecord, DialerDatabase};
use crate::error::{DialerError, Result};
use crate::events::{DialerEvent, EventBus};
use crate::types::{ContactId, ContactStatus, ListId};
pub use ingest::{
    canonicalize_phone, FieldMapping, IngestOptions, IngestReport, RejectReason, RejectedRow,
};

#[derive(Clone)]
pub struct ContactStore {
    db: DialerDatabase,
    config: IngestConfig,
    events: EventBus,
}

impl ContactStore {
    pub fn new(db: DialerDatabase, config: IngestConfig, events: EventBus) -> Self {
        Self { db, config, events }
    }

    pub async fn get_contact(&self, contact_id: &ContactId) -> Result<Contact> {
        self.db
            .get_contact(contact_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("contact {}", contact_id)))
    }

    pub async fn contacts_in_list(&self, list_id: &ListId) -> Result<Vec<Contact>> {
        self.db.contacts_in_list(list_id).await
    }

    pub async fn count_in_list(&self, list_id: &ListId) -> Result<i64> {
        self.db.count_contacts_in_list(list_id).await
    }

    /// Every dial attempt made against a contact, oldest first
    pub async fn call_history(&self, contact_id: &ContactId) -> Result<Vec<CallRecord>> {
        self.db.call_records_for_contact(contact_id).await
    }

    /// Add a number to the global do-not-call registry
    pub async fn add_to_dnc(&self, raw_phone: &str, source: Option<&str>) -> Result<bool> {
        let phone = canonicalize_phone(raw_phone)
            .ok_or_else(|| DialerError::validation(format!("invalid phone number: {}", raw_phone)))?;
        self.db.add_dnc_number(&phone, source).await
    }

    pub async fn is_dnc(&self, raw_phone: &str) -> Result<bool> {
        match canonicalize_phone(raw_phone) {
            Some(phone) => self.db.is_dnc(&phone).await,
            None => Ok(false),
        }
    }

    /// Validate, deduplicate and insert a batch of raw rows into a list
    ///
    /// Rejected rows are counted in the report; only a missing list, an
    /// oversized batch or a bad attempt limit fail the call as a whole.
    pub async fn upload_contacts(
        &self,
        list_id: &ListId,
        rows: &[HashMap<String, String>],
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        if self.db.get_list(list_id).await?.is_none() {
            return Err(DialerError::not_found(format!("data list {}", list_id)));
        }
        if rows.len() > self.config.max_rows_per_upload {
            return Err(DialerError::validation(format!(
                "upload of {} rows exceeds limit of {}",
                rows.len(),
                self.config.max_rows_per_upload
            )));
        }
        let max_attempts = options.max_attempts.unwrap_or(self.config.default_max_attempts);
        if max_attempts == 0 {
            return Err(DialerError::validation("max_attempts must be at least 1"));
        }

        info!("📥 Uploading {} rows into list {}", rows.len(), list_id);

        let mut seen: HashSet<String> = if options.skip_duplicates {
            self.db.phones_in_list(list_id).await?
        } else {
            HashSet::new()
        };
        let mut report = IngestReport::default();
        let mut accepted = Vec::new();
        let now = Utc::now();

        for (index, raw) in rows.iter().enumerate() {
            let mapped = match ingest::map_row(raw, options) {
                Ok(mapped) => mapped,
                Err(reason) => {
                    debug!("Row {} rejected: {:?}", index, reason);
                    report.reject(index, reason);
                    continue;
                }
            };

            if let Some(phone) = mapped.phone.as_deref() {
                if options.skip_duplicates && seen.contains(phone) {
                    report.reject(index, RejectReason::Duplicate);
                    continue;
                }
                if options.dnc_check && self.db.is_dnc(phone).await? {
                    report.reject(index, RejectReason::DoNotCall);
                    continue;
                }
                seen.insert(phone.to_string());
            }

            accepted.push(Contact {
                id: ContactId::new(),
                list_id: list_id.clone(),
                first_name: mapped.first_name,
                last_name: mapped.last_name,
                email: mapped.email,
                phone: mapped.phone,
                alternate_phones: mapped.alternate_phones,
                attempt_count: 0,
                max_attempts,
                status: ContactStatus::Pending,
                last_outcome: None,
                last_attempt_at: None,
                created_at: now,
                lock: LockState::default(),
            });
        }

        self.db.insert_contacts(&accepted).await?;
        report.accepted = accepted.len();

        info!(
            "✅ Upload into list {}: {} accepted, {} duplicates, {} invalid, {} on DNC",
            list_id, report.accepted, report.duplicates, report.invalid, report.dnc_rejected
        );
        self.events.publish(DialerEvent::ContactsUploaded {
            list_id: list_id.clone(),
            accepted: report.accepted,
            rejected: report.rejected_rows.len(),
        });

        Ok(report)
    }
}
