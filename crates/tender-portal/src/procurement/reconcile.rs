use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::TenderId;
use super::repository::{RepositoryError, TenderStore};

/// Counter change that was not applied after its application write committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAdjustment {
    pub tender_id: TenderId,
    pub delta: i32,
    pub application_number: String,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub applied: usize,
    pub remaining: usize,
}

/// Queue of `submissions_count` adjustments awaiting retry.
#[derive(Debug, Default)]
pub struct CounterReconciler {
    pending: Mutex<Vec<PendingAdjustment>>,
}

impl CounterReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn defer(
        &self,
        tender_id: &TenderId,
        delta: i32,
        application_number: &str,
        error: &RepositoryError,
    ) {
        warn!(
            tender_id = %tender_id.0,
            delta,
            application_number,
            error = %error,
            "tender submissions counter out of sync; queued for reconciliation"
        );

        let adjustment = PendingAdjustment {
            tender_id: tender_id.clone(),
            delta,
            application_number: application_number.to_string(),
            queued_at: Utc::now(),
            attempts: 1,
            last_error: error.to_string(),
        };
        match self.pending.lock() {
            Ok(mut guard) => guard.push(adjustment),
            Err(poisoned) => poisoned.into_inner().push(adjustment),
        }
    }

    pub fn pending(&self) -> Vec<PendingAdjustment> {
        match self.pending.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Retry every queued adjustment once. Failures stay queued with their attempt count bumped.
    pub fn run_once(&self, tenders: &dyn TenderStore) -> ReconcileSummary {
        let queued = match self.pending.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        if queued.is_empty() {
            return ReconcileSummary::default();
        }

        let mut applied = 0;
        let mut retained = Vec::new();
        for mut adjustment in queued {
            match tenders.adjust_submissions(&adjustment.tender_id, adjustment.delta) {
                Ok(count) => {
                    applied += 1;
                    info!(
                        tender_id = %adjustment.tender_id.0,
                        application_number = %adjustment.application_number,
                        submissions_count = count,
                        "reconciled tender submissions counter"
                    );
                }
                // The tender is gone, so there is no counter left to repair.
                Err(RepositoryError::NotFound { .. }) => {
                    warn!(
                        tender_id = %adjustment.tender_id.0,
                        application_number = %adjustment.application_number,
                        "dropping counter adjustment for missing tender"
                    );
                }
                Err(err) => {
                    adjustment.attempts += 1;
                    adjustment.last_error = err.to_string();
                    retained.push(adjustment);
                }
            }
        }

        let remaining = retained.len();
        match self.pending.lock() {
            Ok(mut guard) => guard.extend(retained),
            Err(poisoned) => poisoned.into_inner().extend(retained),
        }

        ReconcileSummary { applied, remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procurement::domain::{Tender, TenderStatus};
    use crate::procurement::memory::InMemoryProcurementStore;
    use chrono::Duration;

    fn seeded_store() -> InMemoryProcurementStore {
        let store = InMemoryProcurementStore::new();
        store
            .upsert_tender(Tender {
                id: TenderId("T1".to_string()),
                tender_number: "TN-001".to_string(),
                title: "Road resurfacing".to_string(),
                status: TenderStatus::Open,
                closing_date: Utc::now() + Duration::days(30),
                submissions_count: 0,
            })
            .expect("seed tender");
        store
    }

    #[test]
    fn run_once_applies_queued_adjustments() {
        let store = seeded_store();
        let reconciler = CounterReconciler::new();
        reconciler.defer(
            &TenderId("T1".to_string()),
            1,
            "TA-1",
            &RepositoryError::Unavailable("timeout".to_string()),
        );

        let summary = reconciler.run_once(&store);
        assert_eq!(summary, ReconcileSummary { applied: 1, remaining: 0 });
        assert!(reconciler.pending().is_empty());
        let tender = store
            .fetch_tender(&TenderId("T1".to_string()))
            .expect("fetch")
            .expect("tender");
        assert_eq!(tender.submissions_count, 1);
    }

    #[test]
    fn run_once_drops_adjustments_for_missing_tenders() {
        let store = seeded_store();
        let reconciler = CounterReconciler::new();
        reconciler.defer(
            &TenderId("gone".to_string()),
            -1,
            "TA-2",
            &RepositoryError::Unavailable("timeout".to_string()),
        );

        let summary = reconciler.run_once(&store);
        assert_eq!(summary, ReconcileSummary { applied: 0, remaining: 0 });
    }
}
