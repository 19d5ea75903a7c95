use super::domain::{ApplicationId, Tender, TenderApplication, TenderId};
use super::error::ProcurementError;

/// Read access to the tender catalog plus the submissions counter it delegates to intake.
pub trait TenderStore: Send + Sync {
    fn fetch_tender(&self, id: &TenderId) -> Result<Option<Tender>, RepositoryError>;

    /// Atomically add `delta` to `submissions_count`, saturating at zero. Returns the new count.
    fn adjust_submissions(&self, id: &TenderId, delta: i32) -> Result<u32, RepositoryError>;
}

/// Storage abstraction so the services can be exercised in isolation.
///
/// Implementations must enforce two unique constraints: one application per
/// (tender, registration number) and one application per application number.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: TenderApplication)
        -> Result<TenderApplication, RepositoryError>;
    /// Apply `edit` to the stored application while holding the write lock, so concurrent
    /// edits of one application serialize. Nothing is written when `edit` fails.
    fn modify(
        &self,
        id: &ApplicationId,
        edit: &mut dyn FnMut(&mut TenderApplication) -> Result<(), ProcurementError>,
    ) -> Result<TenderApplication, ProcurementError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<TenderApplication>, RepositoryError>;
    fn find_by_company(
        &self,
        tender_id: &TenderId,
        registration_number: &str,
    ) -> Result<Option<TenderApplication>, RepositoryError>;
    fn list_for_tender(&self, tender_id: &TenderId)
        -> Result<Vec<TenderApplication>, RepositoryError>;
    fn delete(&self, id: &ApplicationId) -> Result<TenderApplication, RepositoryError>;
}

impl<'a> dyn ApplicationRepository + 'a {
    /// [`ApplicationRepository::modify`] for a one-shot edit that yields a value.
    pub fn modify_with<T>(
        &self,
        id: &ApplicationId,
        edit: impl FnOnce(&mut TenderApplication) -> Result<T, ProcurementError>,
    ) -> Result<(T, TenderApplication), ProcurementError> {
        let mut edit = Some(edit);
        let mut output = None;
        let application = self.modify(id, &mut |application: &mut TenderApplication| {
            let edit = edit.take().ok_or_else(|| {
                ProcurementError::Internal("application edit ran twice".to_string())
            })?;
            output = Some(edit(application)?);
            Ok(())
        })?;

        let output = output
            .ok_or_else(|| ProcurementError::Internal("application edit did not run".to_string()))?;
        Ok((output, application))
    }
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("an application from this company already exists for the tender")]
    DuplicateApplication,
    #[error("application number {0} already issued")]
    DuplicateApplicationNumber(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
