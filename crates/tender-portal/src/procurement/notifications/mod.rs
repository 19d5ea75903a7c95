//! Outcome notifications: filter recipients, fan out one send task per application and
//! fold every outcome into a single report.

mod provider;
pub mod templates;

pub use provider::{
    EmailProvider, HttpEmailProvider, LogEmailProvider, OutboundEmail, ProviderError,
    ProviderReceipt,
};
pub use templates::{MessageType, RenderedMessage, TemplateError, TenderDetails};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::domain::TenderApplication;
use super::error::ProcurementError;
use super::validation;

/// Application as supplied by the caller; only the fields needed to address a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTarget {
    #[serde(alias = "_id", alias = "applicationId", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub application_number: Option<String>,
    #[serde(default, alias = "email")]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) => Ok(raw),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "application id must be a string or number, got {other}"
        ))),
    }
}

impl From<&TenderApplication> for NotificationTarget {
    fn from(application: &TenderApplication) -> Self {
        Self {
            id: application.id.0.clone(),
            application_number: Some(application.application_number.clone()),
            contact_email: Some(application.contact.email.clone()),
            contact_person: Some(application.contact.person.clone()),
            company_name: Some(application.company.name.clone()),
        }
    }
}

impl NotificationTarget {
    /// Trimmed recipient address when it is well-formed and not a placeholder.
    fn deliverable_email(&self) -> Option<String> {
        self.contact_email
            .as_deref()
            .map(str::trim)
            .filter(|email| validation::is_valid_email(email))
            .filter(|email| !validation::is_placeholder_email(email))
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(default)]
    pub submissions: Vec<NotificationTarget>,
    pub message_type: String,
    #[serde(default)]
    pub custom_message: Option<String>,
    #[serde(default)]
    pub tender_details: TenderDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub application_id: String,
    pub recipient_email: String,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated outcome of one dispatch call. `successful + failed == total == results.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<NotificationResult>,
    pub failed_details: Vec<NotificationResult>,
}

impl BatchReport {
    fn from_results(results: Vec<NotificationResult>) -> Self {
        let failed_details: Vec<NotificationResult> = results
            .iter()
            .filter(|result| result.status == DeliveryStatus::Failed)
            .cloned()
            .collect();
        let failed = failed_details.len();
        Self {
            total: results.len(),
            successful: results.len() - failed,
            failed,
            results,
            failed_details,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum DeliveryFailure {
    #[error("template rendering failed: {0}")]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("delivery task aborted: {0}")]
    Aborted(String),
}

/// Shared, read-only inputs for every send task of one dispatch.
struct DispatchContext {
    message_type: String,
    custom_message: Option<String>,
    tender_details: TenderDetails,
}

/// Fans out outcome messages to applicants through an [`EmailProvider`].
pub struct NotificationDispatcher {
    provider: Arc<dyn EmailProvider>,
}

impl NotificationDispatcher {
    pub fn new(provider: Arc<dyn EmailProvider>) -> Self {
        Self { provider }
    }

    /// Send one message per deliverable recipient. Only an input without any deliverable
    /// recipient fails the call; every per-recipient problem is reported in the batch.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<BatchReport, ProcurementError> {
        let DispatchRequest {
            submissions,
            message_type,
            custom_message,
            tender_details,
        } = request;

        let requested = submissions.len();
        let recipients: Vec<(NotificationTarget, String)> = submissions
            .into_iter()
            .filter_map(|target| target.deliverable_email().map(|email| (target, email)))
            .collect();
        if recipients.is_empty() {
            return Err(ProcurementError::validation("no valid recipients"));
        }
        if recipients.len() < requested {
            info!(
                requested,
                eligible = recipients.len(),
                "skipping applications without a deliverable email"
            );
        }

        let context = Arc::new(DispatchContext {
            message_type,
            custom_message,
            tender_details,
        });

        let mut attempts = Vec::with_capacity(recipients.len());
        for (target, email) in recipients {
            let provider = Arc::clone(&self.provider);
            let context = Arc::clone(&context);
            let application_id = target.id.clone();
            let recipient = email.clone();
            let handle =
                tokio::spawn(async move { deliver(provider, context, target, recipient).await });
            attempts.push((application_id, email, handle));
        }

        let mut results = Vec::with_capacity(attempts.len());
        for (application_id, email, handle) in attempts {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(DeliveryFailure::Aborted(join_error.to_string())),
            };

            let result = match outcome {
                Ok(receipt) => NotificationResult {
                    application_id,
                    recipient_email: email,
                    status: DeliveryStatus::Sent,
                    provider_message_id: Some(receipt.message_id),
                    error_detail: None,
                    timestamp: Utc::now(),
                },
                Err(failure) => {
                    warn!(
                        application_id = %application_id,
                        recipient = %email,
                        error = %failure,
                        "notification delivery failed"
                    );
                    NotificationResult {
                        application_id,
                        recipient_email: email,
                        status: DeliveryStatus::Failed,
                        provider_message_id: None,
                        error_detail: Some(failure.to_string()),
                        timestamp: Utc::now(),
                    }
                }
            };
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        info!(
            message_type = %context.message_type,
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "notification dispatch finished"
        );
        Ok(report)
    }
}

async fn deliver(
    provider: Arc<dyn EmailProvider>,
    context: Arc<DispatchContext>,
    target: NotificationTarget,
    recipient: String,
) -> Result<ProviderReceipt, DeliveryFailure> {
    let rendered = templates::render(
        &context.message_type,
        context.custom_message.as_deref(),
        &context.tender_details,
        &target,
    )?;

    let receipt = provider
        .send(OutboundEmail {
            to: recipient,
            subject: rendered.subject,
            text_body: rendered.text_body,
            html_body: rendered.html_body,
        })
        .await?;
    Ok(receipt)
}
