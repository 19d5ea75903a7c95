//! Tender application lifecycle: intake, evaluation, supporting documents and outcome
//! notifications.
//!
//! Every service receives its store handles at construction time; nothing in this module
//! reaches for process-wide connection state.

pub mod catalog;
pub mod documents;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod intake;
pub mod memory;
pub mod notifications;
pub mod reconcile;
pub mod repository;
pub mod router;
pub(crate) mod validation;

#[cfg(test)]
mod tests;

pub use documents::{
    AttachRequest, DocumentManager, DocumentStore, DocumentStoreError, FsDocumentStore,
    InMemoryDocumentStore, UploadedFile,
};
pub use domain::{
    ApplicationId, ApplicationStatus, CompanyDetails, ComplianceDeclaration, ContactDetails,
    Document, DocumentId, EvaluationRecord, FinancialOffer, ProposalDetails, Tender,
    TenderApplication, TenderId, TenderStatus,
};
pub use error::{ConflictReason, ProcurementError};
pub use evaluation::{EvaluationRequest, EvaluationService, EvaluationView, StatusPolicy};
pub use intake::{ApplicationIntakeService, ApplicationSubmission, SubmissionReceipt};
pub use memory::InMemoryProcurementStore;
pub use notifications::{
    BatchReport, DeliveryStatus, DispatchRequest, EmailProvider, HttpEmailProvider,
    LogEmailProvider, NotificationDispatcher, NotificationResult, NotificationTarget,
    OutboundEmail, ProviderError, ProviderReceipt, TenderDetails,
};
pub use reconcile::{CounterReconciler, PendingAdjustment, ReconcileSummary};
pub use repository::{ApplicationRepository, RepositoryError, TenderStore};
pub use router::{portal_router, ProcurementServices};
