use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for published tenders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenderId(pub String);

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for documents attached to an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl DocumentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Open,
    Closed,
    Awarded,
    Pending,
    Cancelled,
}

impl TenderStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TenderStatus::Open => "open",
            TenderStatus::Closed => "closed",
            TenderStatus::Awarded => "awarded",
            TenderStatus::Pending => "pending",
            TenderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "awarded" => Some(Self::Awarded),
            "pending" => Some(Self::Pending),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Tender snapshot as served by the catalog. Only `submissions_count` is adjusted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    pub id: TenderId,
    pub tender_number: String,
    pub title: String,
    pub status: TenderStatus,
    pub closing_date: DateTime<Utc>,
    pub submissions_count: u32,
}

impl Tender {
    pub fn accepts_submissions_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TenderStatus::Open && now < self.closing_date
    }
}

/// Lifecycle of an application. Ordered submitted -> under_review -> evaluated -> outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Evaluated,
    Awarded,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Evaluated => "evaluated",
            ApplicationStatus::Awarded => "awarded",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "under_review" | "under-review" => Some(Self::UnderReview),
            "evaluated" => Some(Self::Evaluated),
            "awarded" => Some(Self::Awarded),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    const fn rank(self) -> u8 {
        match self {
            ApplicationStatus::Submitted => 0,
            ApplicationStatus::UnderReview => 1,
            ApplicationStatus::Evaluated => 2,
            ApplicationStatus::Awarded | ApplicationStatus::Rejected => 3,
        }
    }

    pub const fn is_outcome(self) -> bool {
        matches!(self, ApplicationStatus::Awarded | ApplicationStatus::Rejected)
    }

    /// True when moving from `self` to `next` goes backward in the lifecycle. Switching
    /// between the two outcomes counts as backward since an outcome is final.
    pub fn regresses_to(self, next: ApplicationStatus) -> bool {
        if self.is_outcome() {
            return next != self;
        }
        next.rank() < self.rank()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub name: String,
    pub registration_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl CompanyDetails {
    /// Dedup key: registration numbers compare trimmed and case-insensitively.
    pub fn registration_key(&self) -> String {
        registration_key(&self.registration_number)
    }
}

pub(crate) fn registration_key(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub person: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProposalDetails {
    pub summary: Option<String>,
    pub methodology: Option<String>,
    pub timeline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialOffer {
    pub total_bid_amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceDeclaration {
    pub tax_compliant: bool,
    pub accepts_terms: bool,
    pub conflict_of_interest_declared: bool,
    pub notes: Option<String>,
}

/// Metadata for one stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub file_name: String,
    pub file_path: String,
    #[serde(rename = "type")]
    pub document_type: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub comments: String,
    pub evaluated_by: String,
    pub evaluated_at: DateTime<Utc>,
}

/// A supplier's submission against exactly one tender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderApplication {
    pub id: ApplicationId,
    pub tender_id: TenderId,
    pub application_number: String,
    pub company: CompanyDetails,
    pub contact: ContactDetails,
    pub proposal: ProposalDetails,
    pub financial: FinancialOffer,
    pub compliance: ComplianceDeclaration,
    pub documents: Vec<Document>,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationRecord>,
    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl TenderApplication {
    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.iter().find(|document| &document.id == id)
    }
}
