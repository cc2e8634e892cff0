//! # Telephony Collaborator Interface
//!
//! The dialer never speaks SIP or PSTN signaling itself. Call placement is
//! delegated to a [`TelephonyProvider`], which in a full deployment wraps the
//! session-core client stack or a carrier API. The pacer only needs to know
//! whether initiation succeeded; completion is reported back asynchronously
//! through the outcome recorder using the provider call id.
//!
//! ```rust
//! use async_trait::async_trait;
//! use rvoip_dialer_engine::telephony::{PlaceCallRequest, PlacedCall, ProviderError, TelephonyProvider};
//!
//! struct LoggingProvider;
//!
//! #[async_trait]
//! impl TelephonyProvider for LoggingProvider {
//!     async fn place_call(&self, request: PlaceCallRequest) -> Result<PlacedCall, ProviderError> {
//!         println!("dialing {} from {}", request.to, request.from);
//!         Ok(PlacedCall { provider_call_id: format!("call-{}", request.to) })
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters handed to the telephony collaborator for one dial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCallRequest {
    /// Caller id presented to the callee
    pub from: String,
    /// Canonical number being dialed
    pub to: String,
    /// Where the provider should report call progress
    pub callback_url: String,
    /// Agent or auto-dialer on whose behalf the call is made
    pub actor_hint: String,
}

/// Successful call initiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedCall {
    pub provider_call_id: String,
}

/// Telephony collaborator failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider could not be reached or is shedding load
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider refused the request
    #[error("call rejected by provider: {0}")]
    Rejected(String),

    /// Provider did not answer in time
    #[error("provider timed out: {0}")]
    Timeout(String),
}

/// Places outbound calls on behalf of the pacer
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Initiate a call. Must not wait for the call to be answered.
    async fn place_call(&self, request: PlaceCallRequest) -> Result<PlacedCall, ProviderError>;
}

/// Build the per-entry callback URL handed to the provider
pub fn callback_url(base: &str, queue_entry_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), queue_entry_id)
}
