use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::procurement::documents::{DocumentManager, InMemoryDocumentStore};
use crate::procurement::domain::{
    ApplicationId, ComplianceDeclaration, ProposalDetails, Tender, TenderApplication, TenderId,
    TenderStatus,
};
use crate::procurement::error::ProcurementError;
use crate::procurement::evaluation::{EvaluationService, StatusPolicy};
use crate::procurement::intake::{ApplicationIntakeService, ApplicationSubmission};
use crate::procurement::memory::InMemoryProcurementStore;
use crate::procurement::notifications::{
    EmailProvider, NotificationDispatcher, OutboundEmail, ProviderError, ProviderReceipt,
};
use crate::procurement::reconcile::CounterReconciler;
use crate::procurement::repository::{ApplicationRepository, RepositoryError, TenderStore};
use crate::procurement::router::ProcurementServices;

pub(super) const TENDER_ID: &str = "T1";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn tender(id: &str, status: TenderStatus, closing_date: DateTime<Utc>) -> Tender {
    Tender {
        id: TenderId(id.to_string()),
        tender_number: format!("TN-{id}"),
        title: "Road resurfacing".to_string(),
        status,
        closing_date,
        submissions_count: 0,
    }
}

pub(super) fn open_tender() -> Tender {
    tender(TENDER_ID, TenderStatus::Open, now() + Duration::days(14))
}

pub(super) fn submission() -> ApplicationSubmission {
    ApplicationSubmission {
        tender_id: Some(TENDER_ID.to_string()),
        company_name: Some("Acme Construction".to_string()),
        registration_number: Some("REG-1".to_string()),
        company_address: Some("1 Main Street".to_string()),
        company_website: None,
        contact_person: Some("Ada Mensah".to_string()),
        contact_email: Some("bids@acme.example".to_string()),
        contact_phone: Some("+233 20 000 0000".to_string()),
        total_bid_amount: Some(150_000.0),
        currency: Some("usd".to_string()),
        proposal: ProposalDetails {
            summary: Some("Resurface 12km of arterial road".to_string()),
            methodology: None,
            timeline: Some("6 months".to_string()),
        },
        compliance: ComplianceDeclaration {
            tax_compliant: true,
            accepts_terms: true,
            conflict_of_interest_declared: false,
            notes: None,
        },
    }
}

pub(super) fn submission_for(registration_number: &str, email: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        registration_number: Some(registration_number.to_string()),
        contact_email: Some(email.to_string()),
        ..submission()
    }
}

pub(super) fn seeded_store() -> Arc<InMemoryProcurementStore> {
    let store = Arc::new(InMemoryProcurementStore::new());
    store.upsert_tender(open_tender()).expect("seed tender");
    store
}

pub(super) fn intake_service(
    store: &Arc<InMemoryProcurementStore>,
    documents: &Arc<InMemoryDocumentStore>,
) -> ApplicationIntakeService {
    ApplicationIntakeService::new(
        store.clone(),
        store.clone(),
        documents.clone(),
        Arc::new(CounterReconciler::new()),
    )
}

pub(super) fn submitted(
    service: &ApplicationIntakeService,
    store: &InMemoryProcurementStore,
) -> TenderApplication {
    let receipt = service
        .submit_at(submission(), now())
        .expect("submission accepted");
    store
        .fetch(&receipt.application_id)
        .expect("fetch")
        .expect("stored")
}

pub(super) fn submissions_count(store: &InMemoryProcurementStore) -> u32 {
    store
        .fetch_tender(&TenderId(TENDER_ID.to_string()))
        .expect("fetch tender")
        .expect("tender present")
        .submissions_count
}

pub(super) fn document_manager(
    store: &Arc<InMemoryProcurementStore>,
    documents: &Arc<InMemoryDocumentStore>,
) -> DocumentManager {
    DocumentManager::new(store.clone(), documents.clone())
}

pub(super) fn evaluation_service(
    store: &Arc<InMemoryProcurementStore>,
    policy: StatusPolicy,
) -> EvaluationService {
    EvaluationService::new(store.clone(), policy)
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryProcurementStore>,
    pub(super) documents: Arc<InMemoryDocumentStore>,
    pub(super) provider: Arc<RecordingProvider>,
    pub(super) services: ProcurementServices,
}

pub(super) fn harness() -> Harness {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let provider = Arc::new(RecordingProvider::default());
    let services = ProcurementServices::new(
        store.clone(),
        store.clone(),
        documents.clone(),
        provider.clone(),
        StatusPolicy::Permissive,
    );
    Harness {
        store,
        documents,
        provider,
        services,
    }
}

pub(super) fn dispatcher(provider: Arc<dyn EmailProvider>) -> NotificationDispatcher {
    NotificationDispatcher::new(provider)
}

/// Accepts every message and remembers it.
#[derive(Default)]
pub(super) struct RecordingProvider {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingProvider {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("provider mutex poisoned").clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingProvider {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
        let mut sent = self.sent.lock().expect("provider mutex poisoned");
        sent.push(email);
        Ok(ProviderReceipt {
            message_id: format!("msg-{}", sent.len()),
        })
    }
}

/// Rejects messages addressed to the listed recipients.
pub(super) struct SelectiveProvider {
    rejected: HashSet<String>,
}

impl SelectiveProvider {
    pub(super) fn rejecting(recipients: &[&str]) -> Self {
        Self {
            rejected: recipients.iter().map(|email| email.to_string()).collect(),
        }
    }
}

#[async_trait]
impl EmailProvider for SelectiveProvider {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
        if self.rejected.contains(&email.to) {
            return Err(ProviderError::Rejected {
                status: 422,
                body: "mailbox unavailable".to_string(),
            });
        }
        Ok(ProviderReceipt {
            message_id: format!("ok-{}", email.to),
        })
    }
}

/// Panics inside the send task to simulate an aborted delivery.
pub(super) struct PanickingProvider;

#[async_trait]
impl EmailProvider for PanickingProvider {
    async fn send(&self, _email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
        panic!("transport crashed");
    }
}

/// Tender catalog whose counter updates always fail.
pub(super) struct FlakyTenderStore {
    pub(super) inner: Arc<InMemoryProcurementStore>,
}

impl TenderStore for FlakyTenderStore {
    fn fetch_tender(&self, id: &TenderId) -> Result<Option<Tender>, RepositoryError> {
        self.inner.fetch_tender(id)
    }

    fn adjust_submissions(&self, _id: &TenderId, _delta: i32) -> Result<u32, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog timeout".to_string()))
    }
}

/// Repository that is always offline.
pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(
        &self,
        _application: TenderApplication,
    ) -> Result<TenderApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn modify(
        &self,
        _id: &ApplicationId,
        _edit: &mut dyn FnMut(&mut TenderApplication) -> Result<(), ProcurementError>,
    ) -> Result<TenderApplication, ProcurementError> {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<TenderApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_company(
        &self,
        _tender_id: &TenderId,
        _registration_number: &str,
    ) -> Result<Option<TenderApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_for_tender(
        &self,
        _tender_id: &TenderId,
    ) -> Result<Vec<TenderApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ApplicationId) -> Result<TenderApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Delegates reads and inserts but refuses every modification.
pub(super) struct ReadOnlyRepository {
    pub(super) inner: Arc<InMemoryProcurementStore>,
}

impl ApplicationRepository for ReadOnlyRepository {
    fn insert(&self, application: TenderApplication) -> Result<TenderApplication, RepositoryError> {
        self.inner.insert(application)
    }

    fn modify(
        &self,
        _id: &ApplicationId,
        _edit: &mut dyn FnMut(&mut TenderApplication) -> Result<(), ProcurementError>,
    ) -> Result<TenderApplication, ProcurementError> {
        Err(RepositoryError::Unavailable("read only".to_string()).into())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<TenderApplication>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn find_by_company(
        &self,
        tender_id: &TenderId,
        registration_number: &str,
    ) -> Result<Option<TenderApplication>, RepositoryError> {
        self.inner.find_by_company(tender_id, registration_number)
    }

    fn list_for_tender(
        &self,
        tender_id: &TenderId,
    ) -> Result<Vec<TenderApplication>, RepositoryError> {
        self.inner.list_for_tender(tender_id)
    }

    fn delete(&self, id: &ApplicationId) -> Result<TenderApplication, RepositoryError> {
        self.inner.delete(id)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
