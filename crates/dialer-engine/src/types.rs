//! Shared identifiers and lifecycle enums
//!
//! Every enum here is persisted as a lowercase snake_case string. Parsing is
//! case-insensitive so rows written as `Active` or `ACTIVE` by older tooling
//! still load.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Campaign identifier
    CampaignId
);
string_id!(
    /// Data list identifier
    ListId
);
string_id!(
    /// Contact identifier
    ContactId
);
string_id!(
    /// Queue entry identifier
    QueueEntryId
);
string_id!(
    /// Agent or automated dialer identity
    ActorId
);

impl ActorId {
    /// The actor used for push-mode (progressive/predictive) dials
    pub fn auto_dialer() -> Self {
        Self("auto-dialer".to_string())
    }
}

/// Error returned when a persisted enum string is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! string_enum {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
                match normalized.as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

/// How a campaign initiates calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialMethod {
    /// Agent reviews the contact before the call is placed
    ManualPreview,
    /// Agent requests the next contact and it is dialed immediately
    ManualDial,
    /// One line per available agent
    Progressive,
    /// Overdials against agent capacity, throttled by abandon rate
    Predictive,
    /// Dialing disabled for the campaign
    Skip,
}

string_enum!(DialMethod, "dial method" {
    ManualPreview => "manual_preview",
    ManualDial => "manual_dial",
    Progressive => "progressive",
    Predictive => "predictive",
    Skip => "skip",
});

/// Campaign lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
}

string_enum!(CampaignStatus, "campaign status" {
    Draft => "draft",
    Active => "active",
    Paused => "paused",
    Completed => "completed",
    Archived => "archived",
});

/// Queue entry lifecycle; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Queued,
    Dialing,
    Completed,
    Failed,
    Abandoned,
}

string_enum!(QueueEntryStatus, "queue entry status" {
    Queued => "queued",
    Dialing => "dialing",
    Completed => "completed",
    Failed => "failed",
    Abandoned => "abandoned",
});

impl QueueEntryStatus {
    /// Queued or dialing
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Queued | Self::Dialing)
    }
}

/// Contact dialing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    /// Never attempted
    Pending,
    /// Attempted, eligible again once the retry delay elapses
    Retry,
    /// Answered and handled
    Completed,
    /// Contact asked not to be called
    DoNotCall,
    /// Number is not dialable
    Invalid,
    /// Attempt limit reached
    Exhausted,
}

string_enum!(ContactStatus, "contact status" {
    Pending => "pending",
    Retry => "retry",
    Completed => "completed",
    DoNotCall => "do_not_call",
    Invalid => "invalid",
    Exhausted => "exhausted",
});

impl ContactStatus {
    pub fn is_dialable(&self) -> bool {
        matches!(self, Self::Pending | Self::Retry)
    }
}

/// Result of one dial attempt as reported by the telephony side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    AnsweredHandled,
    DoNotCall,
    InvalidNumber,
    NoAnswer,
    Busy,
    Voicemail,
    /// Callee answered but no agent was connected in time
    Abandoned,
    /// Telephony collaborator failed to place the call
    DialError,
    /// Dial holder vanished and its lease ran out
    LeaseExpired,
    /// Agent skipped a previewed contact without dialing
    Skipped,
}

string_enum!(CallOutcome, "call outcome" {
    AnsweredHandled => "answered_handled",
    DoNotCall => "do_not_call",
    InvalidNumber => "invalid_number",
    NoAnswer => "no_answer",
    Busy => "busy",
    Voicemail => "voicemail",
    Abandoned => "abandoned",
    DialError => "dial_error",
    LeaseExpired => "lease_expired",
    Skipped => "skipped",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!("Active".parse::<CampaignStatus>().unwrap(), CampaignStatus::Active);
        assert_eq!("ACTIVE".parse::<CampaignStatus>().unwrap(), CampaignStatus::Active);
        assert_eq!("manual-preview".parse::<DialMethod>().unwrap(), DialMethod::ManualPreview);
        assert!("sleeping".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn test_enum_strings_round_trip_through_storage_form() {
        for outcome in [CallOutcome::DialError, CallOutcome::DoNotCall, CallOutcome::LeaseExpired] {
            assert_eq!(outcome.as_str().parse::<CallOutcome>().unwrap(), outcome);
        }
    }

    #[test]
    fn test_live_and_dialable_states() {
        assert!(QueueEntryStatus::Queued.is_live());
        assert!(QueueEntryStatus::Dialing.is_live());
        assert!(!QueueEntryStatus::Abandoned.is_live());
        assert!(ContactStatus::Retry.is_dialable());
        assert!(!ContactStatus::Exhausted.is_dialable());
    }
}
