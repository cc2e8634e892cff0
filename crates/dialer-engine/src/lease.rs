//! # Lease Manager
//!
//! Grants time-boxed exclusive claims on contacts so at most one dial attempt
//! per contact is in flight, even with several schedulers sharing a database.
//!
//! - `acquire` is a single compare-and-set statement. It succeeds only when the
//!   contact has no lease or its lease has expired. A live lease, even one held
//!   by the caller, makes it return `false`.
//! - `release` only removes a lease owned by the caller and is idempotent.
//! - A holder that crashes simply lets its lease run out; the contact becomes
//!   acquirable again without any cleanup.
//!
//! ```rust
//! use std::time::Duration;
//! use rvoip_dialer_engine::lease::LeaseManager;
//! use rvoip_dialer_engine::types::{ActorId, ContactId};
//!
//! # async fn example(leases: LeaseManager, contact: ContactId) -> rvoip_dialer_engine::error::Result<()> {
//! let agent_a = ActorId::from("agent-a");
//! let agent_b = ActorId::from("agent-b");
//!
//! assert!(leases.acquire(&contact, &agent_a, Duration::from_secs(60)).await?);
//! assert!(!leases.acquire(&contact, &agent_b, Duration::from_secs(60)).await?);
//!
//! leases.release(&contact, &agent_a).await?;
//! assert!(leases.acquire(&contact, &agent_b, Duration::from_secs(60)).await?);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

pub use crate::database::Lease;
use crate::database::DialerDatabase;
use crate::error::{DialerError, Result};
use crate::types::{ActorId, ContactId};

#[derive(Clone)]
pub struct LeaseManager {
    db: DialerDatabase,
    default_ttl: Duration,
}

fn ttl_to_chrono(ttl: Duration) -> Result<chrono::Duration> {
    if ttl.is_zero() {
        return Err(DialerError::validation("lease ttl must be greater than zero"));
    }
    chrono::Duration::from_std(ttl).map_err(|_| DialerError::validation("lease ttl out of range"))
}

impl LeaseManager {
    pub fn new(db: DialerDatabase, default_ttl: Duration) -> Self {
        Self { db, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn acquire(&self, contact_id: &ContactId, actor_id: &ActorId, ttl: Duration) -> Result<bool> {
        self.acquire_at(contact_id, actor_id, ttl, Utc::now()).await
    }

    pub async fn acquire_at(
        &self,
        contact_id: &ContactId,
        actor_id: &ActorId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let expires_at = now + ttl_to_chrono(ttl)?;
        let granted = self.db.try_acquire_lease(contact_id, actor_id, now, expires_at).await?;
        if granted {
            debug!("🔒 Lease on contact {} granted to {}", contact_id, actor_id);
        } else {
            debug!("🔒 Lease on contact {} refused for {}: held elsewhere", contact_id, actor_id);
        }
        Ok(granted)
    }

    /// Release a lease held by `actor_id`; a no-op for anyone else
    pub async fn release(&self, contact_id: &ContactId, actor_id: &ActorId) -> Result<bool> {
        let released = self.db.release_lease(contact_id, actor_id).await?;
        if released {
            debug!("🔓 Lease on contact {} released by {}", contact_id, actor_id);
        }
        Ok(released)
    }

    /// Push out the expiry of a lease the caller still holds
    pub async fn renew(&self, contact_id: &ContactId, actor_id: &ActorId, ttl: Duration) -> Result<bool> {
        self.renew_at(contact_id, actor_id, ttl, Utc::now()).await
    }

    pub async fn renew_at(
        &self,
        contact_id: &ContactId,
        actor_id: &ActorId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let expires_at = now + ttl_to_chrono(ttl)?;
        self.db.renew_lease(contact_id, actor_id, now, expires_at).await
    }

    /// Current live lease, if any
    pub async fn holder(&self, contact_id: &ContactId) -> Result<Option<Lease>> {
        self.holder_at(contact_id, Utc::now()).await
    }

    pub async fn holder_at(&self, contact_id: &ContactId, now: DateTime<Utc>) -> Result<Option<Lease>> {
        self.db.live_lease(contact_id, now).await
    }

    pub async fn live_count(&self) -> Result<i64> {
        self.db.count_live_leases(Utc::now()).await
    }

    /// Remove expired lease rows
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self.db.purge_expired_leases(Utc::now()).await?;
        if purged > 0 {
            debug!("🧹 Purged {} expired leases", purged);
        }
        Ok(purged)
    }
}
