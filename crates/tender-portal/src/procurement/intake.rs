use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::documents::DocumentStore;
use super::domain::{
    ApplicationId, ApplicationStatus, CompanyDetails, ComplianceDeclaration, ContactDetails,
    FinancialOffer, ProposalDetails, TenderApplication, TenderId, TenderStatus,
};
use super::error::{ConflictReason, ProcurementError};
use super::reconcile::CounterReconciler;
use super::repository::{ApplicationRepository, RepositoryError, TenderStore};
use super::validation;

const MAX_NUMBER_ATTEMPTS: usize = 5;
const DEFAULT_CURRENCY: &str = "USD";

/// Fields a client may not overwrite through a partial update.
const IMMUTABLE_FIELDS: &[&str] = &["_id", "id", "createdAt", "submittedAt", "applicationNumber"];

type NumberSource = dyn Fn(DateTime<Utc>) -> String + Send + Sync;

/// Flat intake payload. Every field is optional on the wire so missing values surface as
/// validation errors instead of deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationSubmission {
    pub tender_id: Option<String>,
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub company_address: Option<String>,
    pub company_website: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub total_bid_amount: Option<f64>,
    pub currency: Option<String>,
    pub proposal: ProposalDetails,
    pub compliance: ComplianceDeclaration,
}

/// Submission with every required field present and well-formed.
#[derive(Debug)]
struct ValidatedSubmission {
    tender_id: TenderId,
    company: CompanyDetails,
    contact: ContactDetails,
    financial: FinancialOffer,
    proposal: ProposalDetails,
    compliance: ComplianceDeclaration,
}

impl ApplicationSubmission {
    fn validate(self) -> Result<ValidatedSubmission, ProcurementError> {
        let tender_id = validation::required("tenderId", self.tender_id)?;
        let company_name = validation::required("companyName", self.company_name)?;
        let registration_number =
            validation::required("registrationNumber", self.registration_number)?;
        let contact_person = validation::required("contactPerson", self.contact_person)?;
        let contact_email = validation::required("contactEmail", self.contact_email)?;
        let total_bid_amount = self
            .total_bid_amount
            .ok_or_else(|| ProcurementError::validation("totalBidAmount is required"))?;

        validation::contact_email(&contact_email)?;
        let total_bid_amount = validation::bid_amount(total_bid_amount)?;

        Ok(ValidatedSubmission {
            tender_id: TenderId(tender_id),
            company: CompanyDetails {
                name: company_name,
                registration_number,
                address: validation::optional(self.company_address),
                website: validation::optional(self.company_website),
            },
            contact: ContactDetails {
                person: contact_person,
                email: contact_email,
                phone: validation::optional(self.contact_phone),
            },
            financial: FinancialOffer {
                total_bid_amount,
                currency: validation::optional(self.currency)
                    .map(|currency| currency.to_ascii_uppercase())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            },
            proposal: self.proposal,
            compliance: self.compliance,
        })
    }
}

/// Acknowledgement returned to the supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub application_id: ApplicationId,
    pub application_number: String,
    pub submitted_at: DateTime<Utc>,
    /// False when the tender counter increment was deferred to reconciliation.
    pub counter_synced: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ApplicationPatch {
    company: Option<CompanyPatch>,
    contact: Option<ContactPatch>,
    proposal: Option<ProposalDetails>,
    financial: Option<FinancialPatch>,
    compliance: Option<ComplianceDeclaration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CompanyPatch {
    name: Option<String>,
    registration_number: Option<String>,
    address: Option<String>,
    website: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ContactPatch {
    person: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FinancialPatch {
    total_bid_amount: Option<f64>,
    currency: Option<String>,
}

impl ApplicationPatch {
    fn parse(payload: Value) -> Result<Self, ProcurementError> {
        let Value::Object(mut fields) = payload else {
            return Err(ProcurementError::validation(
                "update payload must be a JSON object",
            ));
        };
        for field in IMMUTABLE_FIELDS {
            fields.remove(*field);
        }

        let patch: ApplicationPatch = serde_json::from_value(Value::Object(fields))
            .map_err(|err| ProcurementError::validation(format!("invalid update: {err}")))?;
        patch.validate()?;
        Ok(patch)
    }

    fn validate(&self) -> Result<(), ProcurementError> {
        if let Some(company) = &self.company {
            if let Some(name) = &company.name {
                validation::required("company.name", Some(name.clone()))?;
            }
            if let Some(registration) = &company.registration_number {
                validation::required("company.registrationNumber", Some(registration.clone()))?;
            }
        }
        if let Some(contact) = &self.contact {
            if let Some(person) = &contact.person {
                validation::required("contact.person", Some(person.clone()))?;
            }
            if let Some(email) = &contact.email {
                validation::contact_email(email)?;
            }
        }
        if let Some(amount) = self.financial.as_ref().and_then(|f| f.total_bid_amount) {
            validation::bid_amount(amount)?;
        }
        Ok(())
    }

    fn apply(self, application: &mut TenderApplication) {
        if let Some(company) = self.company {
            if let Some(name) = company.name {
                application.company.name = name.trim().to_string();
            }
            if let Some(registration) = company.registration_number {
                application.company.registration_number = registration.trim().to_string();
            }
            if company.address.is_some() {
                application.company.address = validation::optional(company.address);
            }
            if company.website.is_some() {
                application.company.website = validation::optional(company.website);
            }
        }
        if let Some(contact) = self.contact {
            if let Some(person) = contact.person {
                application.contact.person = person.trim().to_string();
            }
            if let Some(email) = contact.email {
                application.contact.email = email.trim().to_string();
            }
            if contact.phone.is_some() {
                application.contact.phone = validation::optional(contact.phone);
            }
        }
        if let Some(proposal) = self.proposal {
            application.proposal = proposal;
        }
        if let Some(financial) = self.financial {
            if let Some(amount) = financial.total_bid_amount {
                application.financial.total_bid_amount = amount;
            }
            if let Some(currency) = validation::optional(financial.currency) {
                application.financial.currency = currency.to_ascii_uppercase();
            }
        }
        if let Some(compliance) = self.compliance {
            application.compliance = compliance;
        }
    }
}

/// Human-readable token: `TA-<yyyymmddHHMMSS>-<6 alphanumerics>`.
pub fn generate_application_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect();
    format!("TA-{}-{suffix}", now.format("%Y%m%d%H%M%S"))
}

/// Creates, edits and removes tender applications.
pub struct ApplicationIntakeService {
    tenders: Arc<dyn TenderStore>,
    applications: Arc<dyn ApplicationRepository>,
    documents: Arc<dyn DocumentStore>,
    reconciler: Arc<CounterReconciler>,
    number_source: Box<NumberSource>,
}

impl ApplicationIntakeService {
    pub fn new(
        tenders: Arc<dyn TenderStore>,
        applications: Arc<dyn ApplicationRepository>,
        documents: Arc<dyn DocumentStore>,
        reconciler: Arc<CounterReconciler>,
    ) -> Self {
        Self {
            tenders,
            applications,
            documents,
            reconciler,
            number_source: Box::new(generate_application_number),
        }
    }

    /// Replace the application number generator.
    pub fn with_number_source<F>(mut self, source: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> String + Send + Sync + 'static,
    {
        self.number_source = Box::new(source);
        self
    }

    pub fn reconciler(&self) -> &Arc<CounterReconciler> {
        &self.reconciler
    }

    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<SubmissionReceipt, ProcurementError> {
        self.submit_at(submission, Utc::now())
    }

    /// Validate and persist a submission as of `now`. Checks run in order and the first
    /// violation wins: fields, tender existence, tender status, deadline, duplicate.
    pub fn submit_at(
        &self,
        submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, ProcurementError> {
        let validated = submission.validate()?;

        let tender = self
            .tenders
            .fetch_tender(&validated.tender_id)?
            .ok_or_else(|| ProcurementError::not_found("tender", validated.tender_id.0.clone()))?;
        if tender.status != TenderStatus::Open {
            return Err(ConflictReason::TenderClosed.into());
        }
        if now >= tender.closing_date {
            return Err(ConflictReason::DeadlinePassed.into());
        }
        if self
            .applications
            .find_by_company(&tender.id, &validated.company.registration_number)?
            .is_some()
        {
            return Err(ConflictReason::DuplicateApplication.into());
        }

        let mut application = TenderApplication {
            id: ApplicationId::generate(),
            tender_id: tender.id.clone(),
            application_number: String::new(),
            company: validated.company,
            contact: validated.contact,
            proposal: validated.proposal,
            financial: validated.financial,
            compliance: validated.compliance,
            documents: Vec::new(),
            status: ApplicationStatus::Submitted,
            score: None,
            evaluation: None,
            submitted_at: now,
            created_at: now,
            last_updated: now,
        };

        let stored = self.insert_with_unique_number(&mut application, now)?;
        let counter_synced = self.adjust_counter(&stored.tender_id, 1, &stored.application_number);

        info!(
            tender_id = %stored.tender_id.0,
            application_id = %stored.id.0,
            application_number = %stored.application_number,
            counter_synced,
            "tender application submitted"
        );

        Ok(SubmissionReceipt {
            application_id: stored.id,
            application_number: stored.application_number,
            submitted_at: stored.submitted_at,
            counter_synced,
        })
    }

    fn insert_with_unique_number(
        &self,
        application: &mut TenderApplication,
        now: DateTime<Utc>,
    ) -> Result<TenderApplication, ProcurementError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            application.application_number = (self.number_source)(now);
            match self.applications.insert(application.clone()) {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::DuplicateApplicationNumber(number)) => {
                    warn!(attempt, application_number = %number, "application number collision");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(ProcurementError::Internal(format!(
            "could not allocate a unique application number after {MAX_NUMBER_ATTEMPTS} attempts"
        )))
    }

    /// Apply a counter delta, deferring to the reconciler on failure. Returns whether it applied.
    fn adjust_counter(&self, tender_id: &TenderId, delta: i32, application_number: &str) -> bool {
        match self.tenders.adjust_submissions(tender_id, delta) {
            Ok(_) => true,
            Err(err) => {
                self.reconciler
                    .defer(tender_id, delta, application_number, &err);
                false
            }
        }
    }

    pub fn get(&self, id: &ApplicationId) -> Result<TenderApplication, ProcurementError> {
        self.applications
            .fetch(id)?
            .ok_or_else(|| ProcurementError::not_found("application", id.0.clone()))
    }

    pub fn list_for_tender(
        &self,
        tender_id: &TenderId,
    ) -> Result<Vec<TenderApplication>, ProcurementError> {
        Ok(self.applications.list_for_tender(tender_id)?)
    }

    pub fn update(
        &self,
        id: &ApplicationId,
        payload: Value,
    ) -> Result<TenderApplication, ProcurementError> {
        self.update_at(id, payload, Utc::now())
    }

    /// Partial update. Immutable fields are stripped; anything else not editable is rejected.
    pub fn update_at(
        &self,
        id: &ApplicationId,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<TenderApplication, ProcurementError> {
        let patch = ApplicationPatch::parse(payload)?;
        let ((), application) = self.applications.modify_with(id, |application| {
            patch.apply(application);
            application.last_updated = now;
            Ok(())
        })?;

        info!(application_id = %id.0, "tender application updated");
        Ok(application)
    }

    /// Remove an application, release its tender slot and its stored documents.
    pub fn delete(&self, id: &ApplicationId) -> Result<TenderApplication, ProcurementError> {
        let removed = self.applications.delete(id)?;
        let counter_synced =
            self.adjust_counter(&removed.tender_id, -1, &removed.application_number);

        for document in &removed.documents {
            if let Err(err) = self.documents.delete(&document.file_path) {
                warn!(
                    application_id = %id.0,
                    file_path = %document.file_path,
                    error = %err,
                    "failed to remove stored document for deleted application"
                );
            }
        }

        info!(
            application_id = %id.0,
            tender_id = %removed.tender_id.0,
            counter_synced,
            "tender application deleted"
        );
        Ok(removed)
    }
}
