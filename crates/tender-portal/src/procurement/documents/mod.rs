mod storage;

pub use storage::{DocumentStore, DocumentStoreError, FsDocumentStore, InMemoryDocumentStore};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{ApplicationId, Document, DocumentId, TenderId};
use super::error::ProcurementError;
use super::repository::ApplicationRepository;
use super::validation;

pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_DOCUMENT_TYPE: &str = "supporting";

/// Accepted upload types and the extension used for the stored file.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
];

/// Raw upload as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Declared content type, falling back to a guess from the file name.
    fn mime_type(&self) -> Option<String> {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|raw| raw.parse::<mime::Mime>().ok())
            .filter(|parsed| *parsed != mime::APPLICATION_OCTET_STREAM);

        declared
            .or_else(|| mime_guess::from_path(&self.file_name).first())
            .map(|parsed| parsed.essence_str().to_ascii_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub application_id: ApplicationId,
    pub tender_id: Option<String>,
    pub file: Option<UploadedFile>,
    pub document_type: Option<String>,
}

/// Validates uploads and keeps the application's document list in step with storage.
pub struct DocumentManager {
    applications: Arc<dyn ApplicationRepository>,
    store: Arc<dyn DocumentStore>,
}

impl DocumentManager {
    pub fn new(applications: Arc<dyn ApplicationRepository>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            applications,
            store,
        }
    }

    pub fn attach(&self, request: AttachRequest) -> Result<Document, ProcurementError> {
        self.attach_at(request, Utc::now())
    }

    /// Size and type are checked before any bytes are written. A failed metadata write
    /// removes the stored bytes again so no orphaned upload remains.
    pub fn attach_at(
        &self,
        request: AttachRequest,
        now: DateTime<Utc>,
    ) -> Result<Document, ProcurementError> {
        let AttachRequest {
            application_id,
            tender_id,
            file,
            document_type,
        } = request;

        let file = file
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| ProcurementError::validation("file is required"))?;
        if file.bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(ProcurementError::validation(format!(
                "too large: file exceeds the {} MiB limit",
                MAX_DOCUMENT_BYTES / (1024 * 1024)
            )));
        }
        let (mime_type, extension) = file
            .mime_type()
            .and_then(|mime_type| {
                ALLOWED_TYPES
                    .iter()
                    .find(|(allowed, _)| *allowed == mime_type)
                    .map(|(allowed, extension)| (allowed.to_string(), *extension))
            })
            .ok_or_else(|| {
                ProcurementError::validation(
                    "unsupported type: upload a PDF, Word document, JPEG or PNG",
                )
            })?;
        let tender_id = TenderId(validation::required("tenderId", tender_id)?);

        self.applications
            .fetch(&application_id)?
            .filter(|application| application.tender_id == tender_id)
            .ok_or_else(|| ProcurementError::not_found("application", application_id.0.clone()))?;

        let file_name = format!(
            "{}-{}.{}",
            now.timestamp_millis(),
            uuid::Uuid::new_v4().simple(),
            extension
        );
        let file_path = self.store.put(&application_id, &file_name, &file.bytes)?;

        let display_name = validation::optional(Some(file.file_name.clone()))
            .unwrap_or_else(|| file_name.clone());
        let document = Document {
            id: DocumentId::generate(),
            name: display_name,
            file_name,
            file_path,
            document_type: validation::optional(document_type)
                .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string()),
            mime_type,
            size: file.bytes.len() as u64,
            uploaded_at: now,
        };

        let recorded = self.applications.modify_with(&application_id, |application| {
            if application.tender_id != tender_id {
                return Err(ProcurementError::not_found(
                    "application",
                    application_id.0.clone(),
                ));
            }
            application.documents.push(document.clone());
            application.last_updated = now;
            Ok(())
        });
        if let Err(err) = recorded {
            if let Err(cleanup) = self.store.delete(&document.file_path) {
                warn!(
                    file_path = %document.file_path,
                    error = %cleanup,
                    "failed to remove upload after metadata write failed"
                );
            }
            return Err(err);
        }

        info!(
            application_id = %application_id.0,
            document_id = %document.id.0,
            size = document.size,
            mime_type = %document.mime_type,
            "document attached"
        );
        Ok(document)
    }

    pub fn rename(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
        new_name: Option<String>,
    ) -> Result<Document, ProcurementError> {
        let new_name = validation::required("name", new_name)?;
        let (renamed, _) = self.applications.modify_with(application_id, |application| {
            let document = application
                .documents
                .iter_mut()
                .find(|document| &document.id == document_id)
                .ok_or_else(|| ProcurementError::not_found("document", document_id.0.clone()))?;
            document.name = new_name;
            let renamed = document.clone();
            application.last_updated = Utc::now();
            Ok(renamed)
        })?;

        info!(
            application_id = %application_id.0,
            document_id = %document_id.0,
            "document renamed"
        );
        Ok(renamed)
    }

    pub fn remove(
        &self,
        application_id: &ApplicationId,
        document_id: &DocumentId,
    ) -> Result<Document, ProcurementError> {
        let (removed, _) = self.applications.modify_with(application_id, |application| {
            let position = application
                .documents
                .iter()
                .position(|document| &document.id == document_id)
                .ok_or_else(|| ProcurementError::not_found("document", document_id.0.clone()))?;
            application.last_updated = Utc::now();
            Ok(application.documents.remove(position))
        })?;

        if let Err(err) = self.store.delete(&removed.file_path) {
            warn!(
                file_path = %removed.file_path,
                error = %err,
                "document record removed but stored file could not be deleted"
            );
        }

        info!(
            application_id = %application_id.0,
            document_id = %document_id.0,
            "document removed"
        );
        Ok(removed)
    }
}
