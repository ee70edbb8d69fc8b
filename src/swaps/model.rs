use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl SwapStatus {
    pub const ALL: [SwapStatus; 5] = [
        SwapStatus::Pending,
        SwapStatus::Accepted,
        SwapStatus::Rejected,
        SwapStatus::Completed,
        SwapStatus::Cancelled,
    ];

    /// The string persisted in the `status` column.
    pub fn as_str(&self) -> &'static str {
        use SwapStatus::*;
        match self {
            Pending => "pending",
            Accepted => "accepted",
            Rejected => "rejected",
            Completed => "completed",
            Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStatus {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        SwapStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown swap status {s:?}")))
    }
}

/// A proposed exchange of one skill for another. Field names match the
/// persisted shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swap {
    pub id: Uuid,
    pub offered_by_user_id: String,
    pub requested_from_user_id: String,
    pub skill_offered: String,
    pub skill_requested: String,
    pub message: Option<String>,
    pub status: SwapStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Swap {
    pub fn involves(&self, user_id: &str) -> bool {
        self.offered_by_user_id == user_id || self.requested_from_user_id == user_id
    }

    /// The party on the other side of the swap from `user_id`.
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        if self.offered_by_user_id == user_id {
            Some(&self.requested_from_user_id)
        } else if self.requested_from_user_id == user_id {
            Some(&self.offered_by_user_id)
        } else {
            None
        }
    }
}

/// Which side of a swap a listing is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapRole {
    Offered,
    Received,
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub swap_id: Uuid,
    pub reviewer_id: String,
    pub reviewee_id: String,
    pub rating: u8,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(SwapStatus::Pending, false)]
    #[case(SwapStatus::Accepted, false)]
    #[case(SwapStatus::Rejected, true)]
    #[case(SwapStatus::Completed, true)]
    #[case(SwapStatus::Cancelled, true)]
    fn terminal_states(#[case] status: SwapStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
        assert_eq!(status.as_str().parse::<SwapStatus>().unwrap(), status);
    }

    #[test]
    fn status_strings_are_persisted_verbatim() {
        assert_eq!(serde_json::to_string(&SwapStatus::Cancelled).unwrap(), "\"cancelled\"");
        assert!("Pending".parse::<SwapStatus>().is_err());
    }
}
