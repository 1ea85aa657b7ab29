//! Certificate status and type enums
//!
//! The transition policy is encoded here as an explicit table: terminal
//! states admit no further transitions, while handlers may move a request
//! freely between open states (correcting mistakes or skipping steps).
//! Legacy status aliases from an older schema are accepted by the parser
//! only; the canonical five states are the only values stored or compared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a certificate request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Pending,
    InProgress,
    Ready,
    Issued,
    Rejected,
}

impl CertificateStatus {
    pub const ALL: [CertificateStatus; 5] = [
        CertificateStatus::Pending,
        CertificateStatus::InProgress,
        CertificateStatus::Ready,
        CertificateStatus::Issued,
        CertificateStatus::Rejected,
    ];

    /// Terminal states never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, CertificateStatus::Issued | CertificateStatus::Rejected)
    }

    /// Transition table for `update_status`
    pub fn can_transition_to(self, to: CertificateStatus) -> bool {
        use CertificateStatus::*;
        match (self, to) {
            // No transition out of issued or rejected
            (Issued, _) | (Rejected, _) => false,
            // Open states may move anywhere, including backwards
            (Pending | InProgress | Ready, _) => true,
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CertificateStatus::Pending => "pending",
            CertificateStatus::InProgress => "in_progress",
            CertificateStatus::Ready => "ready",
            CertificateStatus::Issued => "issued",
            CertificateStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CertificateStatus {
    type Err = String;

    /// Boundary parser. Accepts the canonical names plus the legacy
    /// aliases `approved` (→ ready) and `completed` (→ issued).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CertificateStatus::Pending),
            "in_progress" => Ok(CertificateStatus::InProgress),
            "ready" | "approved" => Ok(CertificateStatus::Ready),
            "issued" | "completed" => Ok(CertificateStatus::Issued),
            "rejected" => Ok(CertificateStatus::Rejected),
            other => Err(format!("Unknown certificate status: {}", other)),
        }
    }
}

/// Kind of administrative certificate being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateType {
    Enrollment,
    Academic,
    Attendance,
    Graduation,
    Other,
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CertificateType::Enrollment => "enrollment",
            CertificateType::Academic => "academic",
            CertificateType::Attendance => "attendance",
            CertificateType::Graduation => "graduation",
            CertificateType::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CertificateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrollment" => Ok(CertificateType::Enrollment),
            "academic" => Ok(CertificateType::Academic),
            "attendance" => Ok(CertificateType::Attendance),
            "graduation" => Ok(CertificateType::Graduation),
            "other" => Ok(CertificateType::Other),
            other => Err(format!("Unknown certificate type: {}", other)),
        }
    }
}
