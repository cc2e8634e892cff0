//! # Queue Builder
//!
//! Materializes a campaign's dial queue from the eligible contacts of its
//! active data lists, blended by list weight.
//!
//! ## Eligibility
//!
//! A contact is queued only if all of the following hold:
//!
//! - its status is `pending` or `retry` and it has a phone number
//! - `attempt_count < min(contact.max_attempts, campaign.max_attempts)`
//! - it was never attempted, or its last attempt is older than the retry delay
//! - nobody holds a live lease on it
//! - it has no live (`queued`/`dialing`) entry in any campaign
//! - its phone is not on the do-not-call registry
//!
//! Within a list, fresher contacts (fewer attempts, then older rows) come
//! first. Lists are interleaved by [`blend::blend`].
//!
//! ## Regeneration
//!
//! Generating again replaces the campaign's still-queued entries in the same
//! transaction, so repeated runs never produce duplicate live work. Entries
//! already dialing are left alone.

pub mod blend;
pub mod builder;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::database::QueueEntry;
use crate::types::ListId;
pub use builder::QueueBuilder;

/// Why a generation produced what it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationSignal {
    Generated,
    /// Campaign has no active data lists; nothing was touched
    NoEligibleLists,
    /// Lists exist but none of their contacts is dialable right now
    NoEligibleContacts,
}

/// Result of one queue generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueGeneration {
    pub entries: Vec<QueueEntry>,
    /// Entries drawn from each list
    pub per_list: BTreeMap<ListId, usize>,
    /// Previously queued entries replaced by this run
    pub removed: u64,
    pub signal: GenerationSignal,
}

impl QueueGeneration {
    pub(crate) fn empty(signal: GenerationSignal) -> Self {
        Self {
            entries: Vec::new(),
            per_list: BTreeMap::new(),
            removed: 0,
            signal,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_for(&self, list_id: &ListId) -> usize {
        self.per_list.get(list_id).copied().unwrap_or(0)
    }
}

/// Live entry counts for a campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub queued: i64,
    pub dialing: i64,
}
