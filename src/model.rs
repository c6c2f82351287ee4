use std::fmt;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::UNLOCKED_FLAG;

/// The platform releases slots on Beijing time, whatever the local zone is.
pub const REFERENCE_TZ: Tz = chrono_tz::Asia::Shanghai;

/// Raw lock flag as the platform reported it. `None` when absent or not numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFlag(pub Option<i64>);

impl LockFlag {
    /// Only an explicit `0` counts as unlocked.
    pub fn is_unlocked(&self) -> bool {
        self.0 == Some(UNLOCKED_FLAG)
    }
}

/// One resource instance as listed in an availability read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceEntry {
    pub instance_id: String,
    pub display_name: String,
    /// Window label in the platform's encoding, e.g. `16:30--18:30`.
    pub window: String,
    pub lock: LockFlag,
}

/// One availability read for a date. Entries keep the platform's listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    pub entries: Vec<SliceEntry>,
}

impl AvailabilitySnapshot {
    pub fn new(entries: Vec<SliceEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An unlocked, window-matching instance eligible for a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub instance_id: String,
    pub display_name: String,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID: {})", self.display_name, self.instance_id)
    }
}

/// Which pool and day to read availability for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    /// Resource group (venue) id.
    pub space_id: String,
    /// Resource kind (sport) id.
    pub sport_type: String,
    pub date: NaiveDate,
}

// ── Identity ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("session token missing")]
    MissingToken,
    #[error("user id missing")]
    MissingUserId,
    #[error("verified phone missing")]
    MissingPhone,
}

/// Established session plus verified phone. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    token: String,
    user_id: String,
    phone: String,
}

impl Identity {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        phone: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let (token, user_id, phone) = (token.into(), user_id.into(), phone.into());
        if token.trim().is_empty() {
            return Err(IdentityError::MissingToken);
        }
        if user_id.trim().is_empty() {
            return Err(IdentityError::MissingUserId);
        }
        if phone.trim().is_empty() {
            return Err(IdentityError::MissingPhone);
        }
        Ok(Self { token, user_id, phone })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("phone", &self.phone)
            .finish()
    }
}

// ── Claims ───────────────────────────────────────────────────────

/// What the platform answered to a claim request, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimResponse {
    /// `actionState`; `None` when the platform omitted it.
    pub status: Option<i64>,
    /// `data.codeUrl`.
    pub payment_handle: Option<String>,
    /// The `data` object verbatim (`Null` when absent).
    pub data: serde_json::Value,
    pub message: Option<String>,
}

/// Classified result of one claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed {
        payment_handle: String,
        order: serde_json::Value,
    },
    /// The platform answered and said no.
    Rejected { reason: String },
    /// No usable answer: transport error, timeout, bad status, bad body.
    Faulted { cause: String },
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed { .. })
    }
}

impl fmt::Display for ClaimOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimOutcome::Claimed { payment_handle, .. } => write!(f, "claimed, pay at {payment_handle}"),
            ClaimOutcome::Rejected { reason } => write!(f, "rejected: {reason}"),
            ClaimOutcome::Faulted { cause } => write!(f, "faulted: {cause}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimAttempt {
    pub candidate: Candidate,
    pub outcome: ClaimOutcome,
}

// ── Run input / output ───────────────────────────────────────────

/// One booking cycle to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub run_id: Ulid,
    pub date: NaiveDate,
    pub window: String,
}

impl BookingRequest {
    pub fn new(date: NaiveDate, window: impl Into<String>) -> Self {
        Self {
            run_id: Ulid::new(),
            date,
            window: window.into(),
        }
    }
}

/// Successful cycle: the claimed instance and where to pay for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booked {
    pub run_id: Ulid,
    pub instance_id: String,
    pub display_name: String,
    pub payment_handle: String,
    pub order: serde_json::Value,
    /// Claim requests issued, including the successful one.
    pub attempts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_flag_only_zero_is_unlocked() {
        assert!(LockFlag(Some(0)).is_unlocked());
        assert!(!LockFlag(Some(1)).is_unlocked());
        assert!(!LockFlag(Some(2)).is_unlocked());
        assert!(!LockFlag(Some(-1)).is_unlocked());
        assert!(!LockFlag(None).is_unlocked());
    }

    #[test]
    fn identity_requires_every_field() {
        assert!(Identity::new("tok", "42", "138****0000").is_ok());
        assert_eq!(Identity::new("", "42", "p"), Err(IdentityError::MissingToken));
        assert_eq!(Identity::new("tok", " ", "p"), Err(IdentityError::MissingUserId));
        assert_eq!(Identity::new("tok", "42", ""), Err(IdentityError::MissingPhone));
    }

    #[test]
    fn identity_debug_hides_token() {
        let id = Identity::new("secret-token", "42", "138****0000").unwrap();
        let dbg = format!("{id:?}");
        assert!(!dbg.contains("secret-token"));
        assert!(dbg.contains("138****0000"));
    }

    #[test]
    fn booking_requests_get_distinct_run_ids() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let a = BookingRequest::new(date, "16:30--18:30");
        let b = BookingRequest::new(date, "16:30--18:30");
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.window, "16:30--18:30");
    }

    #[test]
    fn candidate_display_names_court_and_id() {
        let c = Candidate {
            instance_id: "A1".into(),
            display_name: "Court West".into(),
        };
        assert_eq!(c.to_string(), "Court West (ID: A1)");
    }

    #[test]
    fn booked_serializes_payment_handle() {
        let booked = Booked {
            run_id: Ulid::new(),
            instance_id: "A2".into(),
            display_name: "Court East".into(),
            payment_handle: "weixin://wxpay/bizpayurl?pr=abc".into(),
            order: serde_json::json!({"orderNo": "X1"}),
            attempts: 2,
        };
        let json = serde_json::to_value(&booked).unwrap();
        assert_eq!(json["payment_handle"], "weixin://wxpay/bizpayurl?pr=abc");
        assert_eq!(json["order"]["orderNo"], "X1");
        assert_eq!(json["attempts"], 2);
    }
}
