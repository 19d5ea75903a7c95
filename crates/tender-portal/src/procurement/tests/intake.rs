use super::common::*;
use crate::procurement::documents::{DocumentStore, InMemoryDocumentStore};
use crate::procurement::domain::{ApplicationId, ApplicationStatus, TenderId, TenderStatus};
use crate::procurement::error::{ConflictReason, ProcurementError};
use crate::procurement::intake::{
    generate_application_number, ApplicationIntakeService, ApplicationSubmission,
};
use crate::procurement::reconcile::{CounterReconciler, ReconcileSummary};
use crate::procurement::repository::ApplicationRepository;
use chrono::Duration;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn submit_persists_application_and_increments_counter() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    let receipt = service
        .submit_at(submission(), now())
        .expect("submission accepted");

    assert!(receipt.counter_synced);
    assert_eq!(receipt.submitted_at, now());
    assert_eq!(submissions_count(&store), 1);

    let stored = store
        .fetch(&receipt.application_id)
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.status, ApplicationStatus::Submitted);
    assert_eq!(stored.application_number, receipt.application_number);
    assert_eq!(stored.financial.currency, "USD");
    assert_eq!(stored.contact.person, "Ada Mensah");
    assert!(stored.documents.is_empty());
    assert_eq!(stored.created_at, stored.last_updated);
}

#[test]
fn application_numbers_follow_portal_format() {
    let number = generate_application_number(now());
    let parts: Vec<&str> = number.split('-').collect();
    assert_eq!(parts.len(), 3, "unexpected number {number}");
    assert_eq!(parts[0], "TA");
    assert_eq!(parts[1], "20260302093000");
    assert_eq!(parts[2].len(), 6);
    assert!(parts[2]
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit()));
}

#[test]
fn missing_required_fields_fail_before_store_access() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = ApplicationIntakeService::new(
        seeded_store(),
        Arc::new(UnavailableRepository),
        documents,
        Arc::new(CounterReconciler::new()),
    );

    for (field, submission) in [
        (
            "tenderId",
            ApplicationSubmission {
                tender_id: None,
                ..submission()
            },
        ),
        (
            "companyName",
            ApplicationSubmission {
                company_name: Some("   ".to_string()),
                ..submission()
            },
        ),
        (
            "registrationNumber",
            ApplicationSubmission {
                registration_number: None,
                ..submission()
            },
        ),
        (
            "contactPerson",
            ApplicationSubmission {
                contact_person: None,
                ..submission()
            },
        ),
        (
            "contactEmail",
            ApplicationSubmission {
                contact_email: None,
                ..submission()
            },
        ),
        (
            "totalBidAmount",
            ApplicationSubmission {
                total_bid_amount: None,
                ..submission()
            },
        ),
    ] {
        match service.submit_at(submission, now()) {
            Err(ProcurementError::Validation(message)) => {
                assert!(message.contains(field), "{field}: {message}")
            }
            other => panic!("expected validation error for {field}, got {other:?}"),
        }
    }
}

#[test]
fn malformed_email_and_negative_bid_are_rejected() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    let bad_email = submission_for("REG-2", "not-an-email");
    assert!(matches!(
        service.submit_at(bad_email, now()),
        Err(ProcurementError::Validation(_))
    ));

    let negative_bid = ApplicationSubmission {
        total_bid_amount: Some(-5.0),
        ..submission()
    };
    assert!(matches!(
        service.submit_at(negative_bid, now()),
        Err(ProcurementError::Validation(_))
    ));
    assert_eq!(store.application_count().expect("count"), 0);
}

#[test]
fn unknown_tender_is_not_found() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    let submission = ApplicationSubmission {
        tender_id: Some("missing".to_string()),
        ..submission()
    };
    match service.submit_at(submission, now()) {
        Err(ProcurementError::NotFound { entity, id }) => {
            assert_eq!(entity, "tender");
            assert_eq!(id, "missing");
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn tenders_that_are_not_open_reject_submissions() {
    for status in [
        TenderStatus::Closed,
        TenderStatus::Awarded,
        TenderStatus::Pending,
        TenderStatus::Cancelled,
    ] {
        let store = seeded_store();
        store
            .upsert_tender(tender(TENDER_ID, status, now() + Duration::days(30)))
            .expect("replace tender");
        let documents = Arc::new(InMemoryDocumentStore::new());
        let service = intake_service(&store, &documents);

        match service.submit_at(submission(), now()) {
            Err(ProcurementError::Conflict(ConflictReason::TenderClosed)) => {}
            other => panic!("expected tender closed for {status:?}, got {other:?}"),
        }
        assert_eq!(store.application_count().expect("count"), 0);
        assert_eq!(submissions_count(&store), 0);
    }
}

#[test]
fn passed_deadline_rejects_open_tender() {
    let store = seeded_store();
    store
        .upsert_tender(tender(TENDER_ID, TenderStatus::Open, now() - Duration::hours(1)))
        .expect("replace tender");
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    match service.submit_at(submission(), now()) {
        Err(ProcurementError::Conflict(ConflictReason::DeadlinePassed)) => {}
        other => panic!("expected deadline passed, got {other:?}"),
    }

    // The deadline itself is already too late.
    store
        .upsert_tender(tender(TENDER_ID, TenderStatus::Open, now()))
        .expect("replace tender");
    assert!(matches!(
        service.submit_at(submission(), now()),
        Err(ProcurementError::Conflict(ConflictReason::DeadlinePassed))
    ));
    service
        .submit_at(submission(), now() - Duration::seconds(1))
        .expect("one second before the deadline is accepted");
}

#[test]
fn duplicate_company_is_rejected_without_touching_counter() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    service
        .submit_at(submission(), now())
        .expect("first submission accepted");
    assert_eq!(submissions_count(&store), 1);

    // Registration numbers compare case-insensitively and ignore padding.
    let repeat = submission_for("  reg-1 ", "other@acme.example");
    match service.submit_at(repeat, now()) {
        Err(ProcurementError::Conflict(ConflictReason::DuplicateApplication)) => {}
        other => panic!("expected duplicate application, got {other:?}"),
    }
    assert_eq!(submissions_count(&store), 1);
    assert_eq!(store.application_count().expect("count"), 1);
}

#[test]
fn same_company_may_bid_on_different_tenders() {
    let store = seeded_store();
    store
        .upsert_tender(tender("T2", TenderStatus::Open, now() + Duration::days(7)))
        .expect("seed second tender");
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    service.submit_at(submission(), now()).expect("first tender");
    let second = ApplicationSubmission {
        tender_id: Some("T2".to_string()),
        ..submission()
    };
    service.submit_at(second, now()).expect("second tender");
    assert_eq!(store.application_count().expect("count"), 2);
}

#[test]
fn application_number_collisions_are_retried() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let service = intake_service(&store, &documents).with_number_source(move |_| {
        // Two fixed numbers first, then a fresh one.
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => "TA-FIXED-000001".to_string(),
            n => format!("TA-FIXED-{n:06}"),
        }
    });

    let first = service.submit_at(submission(), now()).expect("first");
    let second = service
        .submit_at(submission_for("REG-2", "ops@beta.example"), now())
        .expect("second retries past the collision");

    assert_eq!(first.application_number, "TA-FIXED-000001");
    assert_eq!(second.application_number, "TA-FIXED-000002");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn exhausted_number_retries_surface_internal_error() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service =
        intake_service(&store, &documents).with_number_source(|_| "TA-STUCK".to_string());

    service.submit_at(submission(), now()).expect("first");
    match service.submit_at(submission_for("REG-2", "ops@beta.example"), now()) {
        Err(ProcurementError::Internal(message)) => assert!(message.contains("unique")),
        other => panic!("expected internal error, got {other:?}"),
    }
    assert_eq!(submissions_count(&store), 1);
}

#[test]
fn failed_counter_increment_is_queued_for_reconciliation() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let reconciler = Arc::new(CounterReconciler::new());
    let service = ApplicationIntakeService::new(
        Arc::new(FlakyTenderStore {
            inner: store.clone(),
        }),
        store.clone(),
        documents,
        reconciler.clone(),
    );

    let receipt = service
        .submit_at(submission(), now())
        .expect("application still stored");
    assert!(!receipt.counter_synced);
    assert_eq!(store.application_count().expect("count"), 1);
    assert_eq!(submissions_count(&store), 0);

    let pending = reconciler.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].delta, 1);
    assert_eq!(pending[0].application_number, receipt.application_number);
    assert!(pending[0].last_error.contains("catalog timeout"));

    // Once the catalog recovers the queued increment lands.
    let summary = reconciler.run_once(store.as_ref());
    assert_eq!(summary, ReconcileSummary { applied: 1, remaining: 0 });
    assert_eq!(submissions_count(&store), 1);
}

#[test]
fn repository_outage_maps_to_internal_error() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = ApplicationIntakeService::new(
        seeded_store(),
        Arc::new(UnavailableRepository),
        documents,
        Arc::new(CounterReconciler::new()),
    );

    let err = service
        .submit_at(submission(), now())
        .expect_err("store offline");
    assert_eq!(err.kind(), "internal_error");
}

#[test]
fn update_strips_immutable_fields_and_applies_patch() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);
    let original = submitted(&service, &store);
    let later = now() + Duration::hours(2);

    let updated = service
        .update_at(
            &original.id,
            json!({
                "_id": "forged",
                "applicationNumber": "TA-FORGED",
                "submittedAt": "2020-01-01T00:00:00Z",
                "createdAt": "2020-01-01T00:00:00Z",
                "contact": { "phone": "+1 555 0100" },
                "financial": { "totalBidAmount": 140000.0, "currency": "eur" },
                "proposal": { "summary": "Revised scope" }
            }),
            later,
        )
        .expect("update applies");

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.application_number, original.application_number);
    assert_eq!(updated.submitted_at, original.submitted_at);
    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.last_updated, later);
    assert_eq!(updated.contact.phone.as_deref(), Some("+1 555 0100"));
    assert_eq!(updated.contact.email, original.contact.email);
    assert_eq!(updated.financial.currency, "EUR");
    assert_eq!(updated.proposal.summary.as_deref(), Some("Revised scope"));

    let stored = store.fetch(&original.id).expect("fetch").expect("stored");
    assert_eq!(stored, updated);
}

#[test]
fn update_rejects_unknown_fields_and_bad_values() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);
    let original = submitted(&service, &store);

    for payload in [
        json!({ "status": "awarded" }),
        json!({ "score": 100 }),
        json!({ "contact": { "email": "broken" } }),
        json!({ "financial": { "totalBidAmount": -1.0 } }),
        json!(["not", "an", "object"]),
    ] {
        assert!(
            matches!(
                service.update_at(&original.id, payload.clone(), now()),
                Err(ProcurementError::Validation(_))
            ),
            "payload {payload} should be rejected"
        );
    }
    let stored = store.fetch(&original.id).expect("fetch").expect("stored");
    assert_eq!(stored, original);
}

#[test]
fn update_missing_application_is_not_found() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    assert!(matches!(
        service.update_at(&ApplicationId("ghost".to_string()), json!({}), now()),
        Err(ProcurementError::NotFound { .. })
    ));
}

#[test]
fn update_cannot_take_over_another_company_registration() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);
    service.submit_at(submission(), now()).expect("first");
    let second = service
        .submit_at(submission_for("REG-2", "ops@beta.example"), now())
        .expect("second");

    let result = service.update_at(
        &second.application_id,
        json!({ "company": { "registrationNumber": "reg-1" } }),
        now(),
    );
    assert!(matches!(
        result,
        Err(ProcurementError::Conflict(ConflictReason::DuplicateApplication))
    ));
}

#[test]
fn delete_releases_counter_and_documents() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);
    let application = submitted(&service, &store);

    let file_path = documents
        .put(&application.id, "scan.pdf", b"%PDF-1.7")
        .expect("blob stored");
    let document = crate::procurement::domain::Document {
        id: crate::procurement::domain::DocumentId("doc-1".to_string()),
        name: "scan.pdf".to_string(),
        file_name: "scan.pdf".to_string(),
        file_path,
        document_type: "supporting".to_string(),
        mime_type: "application/pdf".to_string(),
        size: 8,
        uploaded_at: now(),
    };
    let repository: &dyn ApplicationRepository = &*store;
    repository
        .modify_with(&application.id, |stored| {
            stored.documents.push(document);
            Ok(())
        })
        .expect("attach document");

    let removed = service.delete(&application.id).expect("delete");
    assert_eq!(removed.id, application.id);
    assert_eq!(submissions_count(&store), 0);
    assert!(documents.paths().is_empty());
    assert!(store.fetch(&application.id).expect("fetch").is_none());

    assert!(matches!(
        service.delete(&application.id),
        Err(ProcurementError::NotFound { .. })
    ));
    assert_eq!(submissions_count(&store), 0);
}

#[test]
fn deleted_company_may_submit_again() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);
    let first = submitted(&service, &store);

    service.delete(&first.id).expect("delete");
    let again = service
        .submit_at(submission(), now())
        .expect("resubmission accepted");
    assert_ne!(again.application_number, first.application_number);
    assert_eq!(submissions_count(&store), 1);
}

#[test]
fn list_for_tender_returns_submissions_in_order() {
    let store = seeded_store();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let service = intake_service(&store, &documents);

    service.submit_at(submission(), now()).expect("first");
    service
        .submit_at(
            submission_for("REG-2", "ops@beta.example"),
            now() + Duration::minutes(5),
        )
        .expect("second");

    let listed = service
        .list_for_tender(&TenderId(TENDER_ID.to_string()))
        .expect("list");
    let registrations: Vec<&str> = listed
        .iter()
        .map(|application| application.company.registration_number.as_str())
        .collect();
    assert_eq!(registrations, vec!["REG-1", "REG-2"]);
    assert!(service
        .list_for_tender(&TenderId("T9".to_string()))
        .expect("list")
        .is_empty());
}
