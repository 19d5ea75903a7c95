use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::domain::{registration_key, ApplicationId, Tender, TenderApplication, TenderId};
use super::error::ProcurementError;
use super::repository::{ApplicationRepository, RepositoryError, TenderStore};

/// Process-local store backing both the tender catalog and applications.
///
/// Both unique constraints are checked inside the same critical section as the write, so two
/// concurrent submissions for one (tender, company) pair cannot both be inserted.
#[derive(Debug, Default)]
pub struct InMemoryProcurementStore {
    tenders: Mutex<HashMap<TenderId, Tender>>,
    applications: Mutex<ApplicationTable>,
}

#[derive(Debug, Default)]
struct ApplicationTable {
    by_id: HashMap<ApplicationId, TenderApplication>,
    by_company: HashMap<(TenderId, String), ApplicationId>,
    numbers: HashSet<String>,
}

impl ApplicationTable {
    fn company_key(application: &TenderApplication) -> (TenderId, String) {
        (
            application.tender_id.clone(),
            application.company.registration_key(),
        )
    }

    /// Store an edited application, moving its company index entry if the registration changed.
    fn replace(&mut self, application: TenderApplication) -> Result<(), RepositoryError> {
        let previous_key = match self.by_id.get(&application.id) {
            Some(existing) => Self::company_key(existing),
            None => {
                return Err(RepositoryError::NotFound {
                    entity: "application",
                    id: application.id.0.clone(),
                })
            }
        };

        let next_key = Self::company_key(&application);
        if next_key != previous_key {
            if self.by_company.contains_key(&next_key) {
                return Err(RepositoryError::DuplicateApplication);
            }
            self.by_company.remove(&previous_key);
            self.by_company.insert(next_key, application.id.clone());
        }

        self.by_id.insert(application.id.clone(), application);
        Ok(())
    }
}

impl InMemoryProcurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a tender. Catalog maintenance lives outside this crate.
    pub fn upsert_tender(&self, tender: Tender) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.tenders)?;
        guard.insert(tender.id.clone(), tender);
        Ok(())
    }

    pub fn tender_count(&self) -> Result<usize, RepositoryError> {
        Ok(lock(&self.tenders)?.len())
    }

    pub fn application_count(&self) -> Result<usize, RepositoryError> {
        Ok(lock(&self.applications)?.by_id.len())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

impl TenderStore for InMemoryProcurementStore {
    fn fetch_tender(&self, id: &TenderId) -> Result<Option<Tender>, RepositoryError> {
        Ok(lock(&self.tenders)?.get(id).cloned())
    }

    fn adjust_submissions(&self, id: &TenderId, delta: i32) -> Result<u32, RepositoryError> {
        let mut guard = lock(&self.tenders)?;
        let tender = guard.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "tender",
            id: id.0.clone(),
        })?;

        let next = i64::from(tender.submissions_count) + i64::from(delta);
        tender.submissions_count = next.clamp(0, i64::from(u32::MAX)) as u32;
        Ok(tender.submissions_count)
    }
}

impl ApplicationRepository for InMemoryProcurementStore {
    fn insert(
        &self,
        application: TenderApplication,
    ) -> Result<TenderApplication, RepositoryError> {
        let mut table = lock(&self.applications)?;
        let company_key = ApplicationTable::company_key(&application);

        if table.by_company.contains_key(&company_key) {
            return Err(RepositoryError::DuplicateApplication);
        }
        if table.numbers.contains(&application.application_number) {
            return Err(RepositoryError::DuplicateApplicationNumber(
                application.application_number.clone(),
            ));
        }

        table.by_company.insert(company_key, application.id.clone());
        table.numbers.insert(application.application_number.clone());
        table
            .by_id
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn modify(
        &self,
        id: &ApplicationId,
        edit: &mut dyn FnMut(&mut TenderApplication) -> Result<(), ProcurementError>,
    ) -> Result<TenderApplication, ProcurementError> {
        let mut table = lock(&self.applications)?;
        let mut application = table
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| ProcurementError::not_found("application", id.0.clone()))?;

        edit(&mut application)?;
        table.replace(application.clone())?;
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<TenderApplication>, RepositoryError> {
        Ok(lock(&self.applications)?.by_id.get(id).cloned())
    }

    fn find_by_company(
        &self,
        tender_id: &TenderId,
        registration_number: &str,
    ) -> Result<Option<TenderApplication>, RepositoryError> {
        let table = lock(&self.applications)?;
        let key = (tender_id.clone(), registration_key(registration_number));
        Ok(table
            .by_company
            .get(&key)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    fn list_for_tender(
        &self,
        tender_id: &TenderId,
    ) -> Result<Vec<TenderApplication>, RepositoryError> {
        let table = lock(&self.applications)?;
        let mut applications: Vec<TenderApplication> = table
            .by_id
            .values()
            .filter(|application| &application.tender_id == tender_id)
            .cloned()
            .collect();
        applications.sort_by(|left, right| {
            left.submitted_at
                .cmp(&right.submitted_at)
                .then_with(|| left.application_number.cmp(&right.application_number))
        });
        Ok(applications)
    }

    fn delete(&self, id: &ApplicationId) -> Result<TenderApplication, RepositoryError> {
        let mut table = lock(&self.applications)?;
        let removed = table
            .by_id
            .remove(id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "application",
                id: id.0.clone(),
            })?;
        table
            .by_company
            .remove(&ApplicationTable::company_key(&removed));
        // Issued numbers stay reserved so a deleted application's number is never reused.
        Ok(removed)
    }
}
