//! # Outcome Recorder
//!
//! Consumes dial results and decides what happens to the contact next. This
//! is the only writer of a contact's attempt count and last outcome, and it
//! only runs against an entry that is `dialing`, i.e. one whose dial held a
//! lease.
//!
//! ## Classification
//!
//! | Outcome | Entry | Contact |
//! |---|---|---|
//! | `answered_handled` | completed | `completed` (terminal) |
//! | `do_not_call` | completed | `do_not_call` (terminal, number added to the registry) |
//! | `invalid_number` | failed | `invalid` (terminal) |
//! | `no_answer`, `busy`, `voicemail`, `dial_error`, `lease_expired` | failed | retry |
//! | `abandoned` | abandoned | retry |
//! | `skipped` | failed | unchanged, no attempt counted |
//!
//! A retryable outcome that uses up the last allowed attempt moves the contact
//! to `exhausted` instead. No new queue entry is created: the contact comes
//! back through the next queue generation once its retry delay has elapsed.
//!
//! ## Late results
//!
//! A call can outlive the lease behind it, in which case the reaper fails the
//! entry as `lease_expired` and counts the attempt. When the provider's result
//! arrives afterwards it replaces the expiry: a terminal outcome still moves
//! the contact out of the pool and `do_not_call` still lands in the registry.
//! No second attempt is counted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::{
    call_records, campaigns, contacts, dnc, leases, queue_entries, CallRecord, Contact, DialerDatabase,
    LockState, QueueEntry,
};
use crate::error::{DialerError, Result};
use crate::events::{DialerEvent, EventBus};
use crate::types::{ActorId, CallOutcome, CampaignId, ContactStatus, QueueEntryId, QueueEntryStatus};

/// What an outcome means for the contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    /// Contact leaves the dialable pool with this status
    Terminal(ContactStatus),
    /// Contact may be dialed again after the retry delay
    Retryable,
    /// No call was made
    NotAttempted,
}

/// Entry status and contact class for an outcome
pub fn classify(outcome: CallOutcome) -> (QueueEntryStatus, OutcomeClass) {
    match outcome {
        CallOutcome::AnsweredHandled => (QueueEntryStatus::Completed, OutcomeClass::Terminal(ContactStatus::Completed)),
        CallOutcome::DoNotCall => (QueueEntryStatus::Completed, OutcomeClass::Terminal(ContactStatus::DoNotCall)),
        CallOutcome::InvalidNumber => (QueueEntryStatus::Failed, OutcomeClass::Terminal(ContactStatus::Invalid)),
        CallOutcome::NoAnswer
        | CallOutcome::Busy
        | CallOutcome::Voicemail
        | CallOutcome::DialError
        | CallOutcome::LeaseExpired => (QueueEntryStatus::Failed, OutcomeClass::Retryable),
        CallOutcome::Abandoned => (QueueEntryStatus::Abandoned, OutcomeClass::Retryable),
        CallOutcome::Skipped => (QueueEntryStatus::Failed, OutcomeClass::NotAttempted),
    }
}

/// Whether a provider result may replace a `lease_expired` failure
fn supersedes_expiry(outcome: CallOutcome) -> bool {
    !matches!(outcome, CallOutcome::LeaseExpired | CallOutcome::Skipped)
}

/// Free-form details reported alongside an outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMetadata {
    pub notes: Option<String>,
    pub provider_call_id: Option<String>,
}

impl OutcomeMetadata {
    pub fn with_notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            provider_call_id: None,
        }
    }
}

/// Contact state after an outcome was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactDisposition {
    pub contact: Contact,
    pub entry: QueueEntry,
    /// Contact will never be queued again
    pub terminal: bool,
    /// Whether this outcome counted as an attempt
    pub attempt_counted: bool,
    /// Earliest instant the contact is eligible again
    pub retry_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct OutcomeRecorder {
    db: DialerDatabase,
    events: EventBus,
}

impl OutcomeRecorder {
    pub fn new(db: DialerDatabase, events: EventBus) -> Self {
        Self { db, events }
    }

    pub async fn record_outcome(
        &self,
        entry_id: &QueueEntryId,
        outcome: CallOutcome,
        metadata: OutcomeMetadata,
    ) -> Result<ContactDisposition> {
        self.record_outcome_at(entry_id, outcome, metadata, Utc::now()).await
    }

    /// Record an outcome reported against the provider's call id
    pub async fn record_provider_outcome(
        &self,
        provider_call_id: &str,
        outcome: CallOutcome,
        metadata: OutcomeMetadata,
    ) -> Result<ContactDisposition> {
        let entry = self
            .db
            .entry_by_provider_call_id(provider_call_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("provider call {}", provider_call_id)))?;
        let metadata = OutcomeMetadata {
            provider_call_id: Some(provider_call_id.to_string()),
            ..metadata
        };
        self.record_outcome(&entry.id, outcome, metadata).await
    }

    pub async fn record_outcome_at(
        &self,
        entry_id: &QueueEntryId,
        outcome: CallOutcome,
        metadata: OutcomeMetadata,
        now: DateTime<Utc>,
    ) -> Result<ContactDisposition> {
        let (entry_status, class) = classify(outcome);
        let mut tx = self.db.begin().await?;

        // The guarded entry update goes first so this transaction is the writer
        if !queue_entries::finish_entry(&mut tx, entry_id, entry_status, outcome, now).await? {
            if supersedes_expiry(outcome)
                && queue_entries::supersede_expired_entry(&mut tx, entry_id, entry_status, outcome, now).await?
            {
                return self.apply_late_outcome(tx, entry_id, outcome, class, metadata, now).await;
            }
            return Err(match queue_entries::fetch_entry(&mut tx, entry_id).await? {
                Some(entry) => DialerError::invalid_transition(format!(
                    "queue entry {} is {}, not dialing",
                    entry_id, entry.status
                )),
                None => DialerError::not_found(format!("queue entry {}", entry_id)),
            });
        }

        let entry = queue_entries::fetch_entry(&mut tx, entry_id)
            .await?
            .ok_or_else(|| DialerError::internal(format!("queue entry {} vanished", entry_id)))?;
        let campaign = campaigns::fetch_campaign(&mut tx, &entry.campaign_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("campaign {}", entry.campaign_id)))?;
        let mut contact = contacts::fetch_contact(&mut tx, &entry.contact_id, now)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("contact {}", entry.contact_id)))?;

        let open_record = call_records::open_record_for_entry(&mut tx, entry_id).await?;
        let attempt_counted = match class {
            OutcomeClass::NotAttempted => false,
            // An expired preview or a number blocked before dialing placed no call
            _ if matches!(outcome, CallOutcome::LeaseExpired | CallOutcome::DoNotCall) => open_record.is_some(),
            _ => true,
        };

        match open_record {
            Some(record_id) => {
                call_records::attach_outcome(
                    &mut tx,
                    &record_id,
                    outcome,
                    metadata.notes.as_deref(),
                    metadata.provider_call_id.as_deref(),
                    now,
                )
                .await?;
            }
            None if attempt_counted => {
                let record = CallRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    queue_entry_id: Some(entry.id.clone()),
                    contact_id: contact.id.clone(),
                    campaign_id: entry.campaign_id.clone(),
                    actor_id: entry.actor_id.clone().unwrap_or_else(ActorId::auto_dialer),
                    phone_dialed: contact.phone.clone().unwrap_or_default(),
                    started_at: entry.dialed_at.unwrap_or(now),
                    provider_call_id: metadata.provider_call_id.clone().or_else(|| entry.provider_call_id.clone()),
                    notes: metadata.notes.clone(),
                    outcome: Some(outcome),
                    completed_at: Some(now),
                };
                call_records::insert_record(&mut tx, &record).await?;
            }
            None => {}
        }

        let effective_max = contact.max_attempts.min(campaign.retry_policy.max_attempts);
        if attempt_counted {
            contact.attempt_count += 1;
            contact.last_attempt_at = Some(now);
        }
        contact.last_outcome = Some(outcome);
        contact.status = match class {
            OutcomeClass::Terminal(status) => status,
            OutcomeClass::Retryable if attempt_counted && contact.attempt_count >= effective_max => {
                ContactStatus::Exhausted
            }
            OutcomeClass::Retryable if attempt_counted => ContactStatus::Retry,
            _ => contact.status,
        };
        contacts::write_contact_state(&mut tx, &contact).await?;

        if outcome == CallOutcome::DoNotCall {
            if let Some(phone) = contact.phone.as_deref() {
                dnc::insert_number(&mut tx, phone, Some("call_outcome"), now).await?;
            }
        }

        if let Some(actor_id) = entry.actor_id.as_ref() {
            if leases::release(&mut tx, &contact.id, actor_id).await? {
                contact.lock = LockState::default();
            }
        }

        tx.commit().await?;

        let retry_delay = chrono::Duration::seconds(campaign.retry_policy.retry_delay.as_secs() as i64);
        let retry_at = if contact.status.is_dialable() {
            Some(contact.last_attempt_at.map(|at| at + retry_delay).unwrap_or(now))
        } else {
            None
        };
        let terminal = !contact.status.is_dialable();

        info!(
            "📞 Outcome {} for entry {} (contact {}): {} after {}/{} attempts",
            outcome, entry_id, contact.id, contact.status, contact.attempt_count, effective_max
        );
        self.events.publish(DialerEvent::OutcomeRecorded {
            campaign_id: entry.campaign_id.clone(),
            entry_id: entry.id.clone(),
            contact_id: contact.id.clone(),
            outcome,
            contact_status: contact.status,
        });

        Ok(ContactDisposition {
            contact,
            entry,
            terminal,
            attempt_counted,
            retry_at,
        })
    }

    /// Finish a reaped entry with the outcome the provider reported late
    async fn apply_late_outcome(
        &self,
        mut tx: sqlx::Transaction<'static, sqlx::Sqlite>,
        entry_id: &QueueEntryId,
        outcome: CallOutcome,
        class: OutcomeClass,
        metadata: OutcomeMetadata,
        now: DateTime<Utc>,
    ) -> Result<ContactDisposition> {
        let entry = queue_entries::fetch_entry(&mut tx, entry_id)
            .await?
            .ok_or_else(|| DialerError::internal(format!("queue entry {} vanished", entry_id)))?;
        let campaign = campaigns::fetch_campaign(&mut tx, &entry.campaign_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("campaign {}", entry.campaign_id)))?;
        let mut contact = contacts::fetch_contact(&mut tx, &entry.contact_id, now)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("contact {}", entry.contact_id)))?;

        call_records::supersede_expired_outcome(&mut tx, entry_id, outcome, metadata.notes.as_deref(), now).await?;

        // The reaper already counted this attempt and released the lease
        contact.last_outcome = Some(outcome);
        if let OutcomeClass::Terminal(status) = class {
            contact.status = status;
        }
        contacts::write_contact_state(&mut tx, &contact).await?;

        if outcome == CallOutcome::DoNotCall {
            if let Some(phone) = contact.phone.as_deref() {
                dnc::insert_number(&mut tx, phone, Some("call_outcome"), now).await?;
            }
        }

        tx.commit().await?;

        let retry_delay = chrono::Duration::seconds(campaign.retry_policy.retry_delay.as_secs() as i64);
        let retry_at = if contact.status.is_dialable() {
            Some(contact.last_attempt_at.map(|at| at + retry_delay).unwrap_or(now))
        } else {
            None
        };

        warn!(
            "⏰ Late outcome {} for entry {} replaced its lease expiry (contact {} now {})",
            outcome, entry_id, contact.id, contact.status
        );
        self.events.publish(DialerEvent::OutcomeRecorded {
            campaign_id: entry.campaign_id.clone(),
            entry_id: entry.id.clone(),
            contact_id: contact.id.clone(),
            outcome,
            contact_status: contact.status,
        });

        Ok(ContactDisposition {
            terminal: !contact.status.is_dialable(),
            contact,
            entry,
            attempt_counted: false,
            retry_at,
        })
    }

    /// Fail dialing entries whose actor's lease has run out
    pub async fn reap_stale_dialing(&self, campaign_id: &CampaignId) -> Result<usize> {
        self.reap_stale_dialing_at(campaign_id, Utc::now()).await
    }

    pub async fn reap_stale_dialing_at(&self, campaign_id: &CampaignId, now: DateTime<Utc>) -> Result<usize> {
        let stale = self.db.stale_dialing_entries(campaign_id, now).await?;
        let mut reaped = 0;

        for entry in stale {
            let metadata = OutcomeMetadata::with_notes("lease expired before an outcome was reported");
            match self.record_outcome_at(&entry.id, CallOutcome::LeaseExpired, metadata, now).await {
                Ok(_) => {
                    reaped += 1;
                    warn!("⏰ Lease expired on dialing entry {} (contact {})", entry.id, entry.contact_id);
                    self.events.publish(DialerEvent::LeaseExpired {
                        campaign_id: campaign_id.clone(),
                        entry_id: entry.id,
                        contact_id: entry.contact_id,
                    });
                }
                // Real outcome landed between the scan and the update
                Err(DialerError::InvalidTransition(reason)) => debug!("Skipping reap: {}", reason),
                Err(e) => return Err(e),
            }
        }

        Ok(reaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(
            classify(CallOutcome::AnsweredHandled),
            (QueueEntryStatus::Completed, OutcomeClass::Terminal(ContactStatus::Completed))
        );
        assert_eq!(
            classify(CallOutcome::DoNotCall),
            (QueueEntryStatus::Completed, OutcomeClass::Terminal(ContactStatus::DoNotCall))
        );
        assert_eq!(
            classify(CallOutcome::InvalidNumber),
            (QueueEntryStatus::Failed, OutcomeClass::Terminal(ContactStatus::Invalid))
        );
        for retryable in [CallOutcome::NoAnswer, CallOutcome::Busy, CallOutcome::Voicemail, CallOutcome::DialError] {
            assert_eq!(classify(retryable), (QueueEntryStatus::Failed, OutcomeClass::Retryable));
        }
        assert_eq!(classify(CallOutcome::Abandoned), (QueueEntryStatus::Abandoned, OutcomeClass::Retryable));
        assert_eq!(classify(CallOutcome::Skipped), (QueueEntryStatus::Failed, OutcomeClass::NotAttempted));
    }

    #[test]
    fn test_only_real_results_replace_an_expiry() {
        assert!(supersedes_expiry(CallOutcome::DoNotCall));
        assert!(supersedes_expiry(CallOutcome::AnsweredHandled));
        assert!(supersedes_expiry(CallOutcome::NoAnswer));
        assert!(!supersedes_expiry(CallOutcome::LeaseExpired));
        assert!(!supersedes_expiry(CallOutcome::Skipped));
    }
}
