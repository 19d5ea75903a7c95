use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::documents::{AttachRequest, DocumentManager, DocumentStore, UploadedFile, MAX_DOCUMENT_BYTES};
use super::domain::{ApplicationId, Document, DocumentId, TenderApplication, TenderId};
use super::error::ProcurementError;
use super::evaluation::{EvaluationRequest, EvaluationService, EvaluationView, StatusPolicy};
use super::intake::{ApplicationIntakeService, ApplicationSubmission, SubmissionReceipt};
use super::notifications::{BatchReport, DispatchRequest, EmailProvider, NotificationDispatcher};
use super::reconcile::CounterReconciler;
use super::repository::{ApplicationRepository, TenderStore};

/// Header carrying the authenticated officer id, set by the session layer in front of us.
pub const CALLER_HEADER: &str = "x-user-id";
const DEFAULT_CALLER: &str = "system";
/// Leaves headroom above the document limit so oversize files reach validation.
const UPLOAD_BODY_LIMIT: usize = MAX_DOCUMENT_BYTES + 2 * 1024 * 1024;

/// Everything the HTTP layer needs, wired once at startup.
#[derive(Clone)]
pub struct ProcurementServices {
    pub intake: Arc<ApplicationIntakeService>,
    pub evaluations: Arc<EvaluationService>,
    pub documents: Arc<DocumentManager>,
    pub notifications: Arc<NotificationDispatcher>,
    pub expose_error_detail: bool,
}

impl ProcurementServices {
    pub fn new(
        tenders: Arc<dyn TenderStore>,
        applications: Arc<dyn ApplicationRepository>,
        documents: Arc<dyn DocumentStore>,
        provider: Arc<dyn EmailProvider>,
        policy: StatusPolicy,
    ) -> Self {
        let intake = ApplicationIntakeService::new(
            tenders,
            applications.clone(),
            documents.clone(),
            Arc::new(CounterReconciler::new()),
        );
        Self {
            intake: Arc::new(intake),
            evaluations: Arc::new(EvaluationService::new(applications.clone(), policy)),
            documents: Arc::new(DocumentManager::new(applications, documents)),
            notifications: Arc::new(NotificationDispatcher::new(provider)),
            expose_error_detail: false,
        }
    }

    pub fn with_error_detail(mut self, expose: bool) -> Self {
        self.expose_error_detail = expose;
        self
    }

    fn reject(&self, error: ProcurementError) -> ApiError {
        ApiError {
            error,
            verbose: self.expose_error_detail,
        }
    }
}

/// Error response: `{kind, error}` plus `detail` outside production.
pub struct ApiError {
    error: ProcurementError,
    verbose: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        if status.is_server_error() {
            error!(kind = self.error.kind(), error = %self.error, "request failed");
        }

        let mut payload = json!({
            "kind": self.error.kind(),
            "error": self.error.to_string(),
        });
        if self.verbose {
            payload["detail"] = json!(format!("{:?}", self.error));
        }
        (status, Json(payload)).into_response()
    }
}

/// Router builder exposing intake, document, evaluation and notification endpoints.
pub fn portal_router(services: ProcurementServices) -> Router {
    Router::new()
        .route(
            "/applications",
            post(submit_handler).get(list_applications_handler),
        )
        .route(
            "/applications/:application_id",
            get(get_application_handler)
                .put(update_application_handler)
                .delete(delete_application_handler),
        )
        .route(
            "/applications/:application_id/documents",
            post(attach_document_handler)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
                .patch(rename_document_handler)
                .delete(remove_document_handler),
        )
        .route(
            "/evaluations",
            post(evaluate_handler).get(get_evaluation_handler),
        )
        .route("/notifications", post(dispatch_handler))
        .with_state(services)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TenderQuery {
    tender_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentQuery {
    doc_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionQuery {
    submission_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RenameDocumentBody {
    #[serde(default)]
    name: Option<String>,
}

fn body<T>(
    services: &ProcurementServices,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| services.reject(ProcurementError::validation(rejection.body_text())))
}

fn query<T>(
    services: &ProcurementServices,
    params: Result<Query<T>, QueryRejection>,
) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| services.reject(ProcurementError::validation(rejection.body_text())))
}

fn required_param(
    services: &ProcurementServices,
    name: &str,
    value: Option<String>,
) -> Result<String, ApiError> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| {
            services.reject(ProcurementError::validation(format!(
                "{name} query parameter is required"
            )))
        })
}

fn caller_identity(headers: &HeaderMap) -> String {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CALLER)
        .to_string()
}

pub(crate) async fn submit_handler(
    State(services): State<ProcurementServices>,
    payload: Result<Json<ApplicationSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), ApiError> {
    let submission = body(&services, payload)?;
    let receipt = services
        .intake
        .submit(submission)
        .map_err(|err| services.reject(err))?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub(crate) async fn list_applications_handler(
    State(services): State<ProcurementServices>,
    params: Result<Query<TenderQuery>, QueryRejection>,
) -> Result<Json<Vec<TenderApplication>>, ApiError> {
    let params = query(&services, params)?;
    let tender_id = required_param(&services, "tenderId", params.tender_id)?;
    let applications = services
        .intake
        .list_for_tender(&TenderId(tender_id))
        .map_err(|err| services.reject(err))?;
    Ok(Json(applications))
}

pub(crate) async fn get_application_handler(
    State(services): State<ProcurementServices>,
    Path(application_id): Path<String>,
) -> Result<Json<TenderApplication>, ApiError> {
    services
        .intake
        .get(&ApplicationId(application_id))
        .map(Json)
        .map_err(|err| services.reject(err))
}

pub(crate) async fn update_application_handler(
    State(services): State<ProcurementServices>,
    Path(application_id): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<TenderApplication>, ApiError> {
    let patch = body(&services, payload)?;
    services
        .intake
        .update(&ApplicationId(application_id), patch)
        .map(Json)
        .map_err(|err| services.reject(err))
}

pub(crate) async fn delete_application_handler(
    State(services): State<ProcurementServices>,
    Path(application_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = services
        .intake
        .delete(&ApplicationId(application_id))
        .map_err(|err| services.reject(err))?;
    Ok(Json(json!({
        "deleted": true,
        "applicationId": removed.id,
        "applicationNumber": removed.application_number,
    })))
}

fn upload_error(error: MultipartError) -> ProcurementError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ProcurementError::validation(format!(
            "too large: upload exceeds the {} MiB limit",
            MAX_DOCUMENT_BYTES / (1024 * 1024)
        ))
    } else {
        ProcurementError::validation(format!("malformed upload: {}", error.body_text()))
    }
}

pub(crate) async fn attach_document_handler(
    State(services): State<ProcurementServices>,
    Path(application_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Document>, ApiError> {
    let mut multipart = multipart
        .map_err(|rejection| services.reject(ProcurementError::validation(rejection.body_text())))?;

    let mut file = None;
    let mut tender_id = None;
    let mut form_application_id = None;
    let mut document_type = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| services.reject(upload_error(err)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| services.reject(upload_error(err)))?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "tenderId" | "applicationId" | "documentType" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| services.reject(upload_error(err)))?;
                match name.as_str() {
                    "tenderId" => tender_id = Some(value),
                    "applicationId" => form_application_id = Some(value),
                    _ => document_type = Some(value),
                }
            }
            _ => {}
        }
    }

    // The form may repeat the application id; it has to agree with the path.
    if let Some(form_id) = form_application_id.filter(|id| !id.trim().is_empty()) {
        if form_id.trim() != application_id {
            return Err(services.reject(ProcurementError::not_found("application", form_id)));
        }
    }

    let request = AttachRequest {
        application_id: ApplicationId(application_id),
        tender_id,
        file,
        document_type,
    };
    let manager = services.documents.clone();
    let document = tokio::task::spawn_blocking(move || manager.attach(request))
        .await
        .map_err(|err| services.reject(ProcurementError::Internal(err.to_string())))?
        .map_err(|err| services.reject(err))?;
    Ok(Json(document))
}

pub(crate) async fn rename_document_handler(
    State(services): State<ProcurementServices>,
    Path(application_id): Path<String>,
    params: Result<Query<DocumentQuery>, QueryRejection>,
    payload: Result<Json<RenameDocumentBody>, JsonRejection>,
) -> Result<Json<Document>, ApiError> {
    let params = query(&services, params)?;
    let document_id = required_param(&services, "docId", params.doc_id)?;
    let rename = body(&services, payload)?;
    services
        .documents
        .rename(
            &ApplicationId(application_id),
            &DocumentId(document_id),
            rename.name,
        )
        .map(Json)
        .map_err(|err| services.reject(err))
}

pub(crate) async fn remove_document_handler(
    State(services): State<ProcurementServices>,
    Path(application_id): Path<String>,
    params: Result<Query<DocumentQuery>, QueryRejection>,
) -> Result<Json<Document>, ApiError> {
    let params = query(&services, params)?;
    let document_id = required_param(&services, "docId", params.doc_id)?;
    services
        .documents
        .remove(&ApplicationId(application_id), &DocumentId(document_id))
        .map(Json)
        .map_err(|err| services.reject(err))
}

pub(crate) async fn evaluate_handler(
    State(services): State<ProcurementServices>,
    headers: HeaderMap,
    payload: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<EvaluationView>, ApiError> {
    let request = body(&services, payload)?;
    let evaluated_by = caller_identity(&headers);
    services
        .evaluations
        .evaluate(request, &evaluated_by)
        .map(Json)
        .map_err(|err| services.reject(err))
}

pub(crate) async fn get_evaluation_handler(
    State(services): State<ProcurementServices>,
    params: Result<Query<SubmissionQuery>, QueryRejection>,
) -> Result<Json<EvaluationView>, ApiError> {
    let params = query(&services, params)?;
    let submission_id = required_param(&services, "submissionId", params.submission_id)?;
    services
        .evaluations
        .get_evaluation(&ApplicationId(submission_id))
        .map(Json)
        .map_err(|err| services.reject(err))
}

pub(crate) async fn dispatch_handler(
    State(services): State<ProcurementServices>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<BatchReport>, ApiError> {
    let request = body(&services, payload)?;
    services
        .notifications
        .dispatch(request)
        .await
        .map(Json)
        .map_err(|err| services.reject(err))
}
