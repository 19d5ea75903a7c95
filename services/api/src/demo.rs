use chrono::{Duration, Utc};
use clap::Args;
use std::sync::Arc;
use tender_portal::error::AppError;
use tender_portal::procurement::{
    ApplicationStatus, ApplicationSubmission, AttachRequest, ComplianceDeclaration,
    DispatchRequest, EvaluationRequest, InMemoryDocumentStore, InMemoryProcurementStore,
    LogEmailProvider, NotificationTarget, ProcurementServices, ProposalDetails, StatusPolicy,
    Tender, TenderDetails, TenderId, TenderStatus, TenderStore, UploadedFile,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reject evaluations that move an application backward in its lifecycle.
    #[arg(long)]
    pub(crate) monotonic: bool,
    /// Skip the outcome notification portion of the demo.
    #[arg(long)]
    pub(crate) skip_notifications: bool,
}

struct Bidder {
    company: &'static str,
    registration: &'static str,
    contact: &'static str,
    email: &'static str,
    amount: f64,
}

const BIDDERS: &[Bidder] = &[
    Bidder {
        company: "Coastal Roadworks Ltd",
        registration: "CRW-2291",
        contact: "Ama Owusu",
        email: "tenders@coastalroadworks.example",
        amount: 1_840_000.0,
    },
    Bidder {
        company: "Northern Paving Co",
        registration: "NPC-0457",
        contact: "Yaw Darko",
        email: "bids@northernpaving.example",
        amount: 1_975_500.0,
    },
    Bidder {
        company: "Volta Civil Works",
        registration: "VCW-1180",
        contact: "Efua Mensah",
        email: "no-email@example.com",
        amount: 2_010_000.0,
    },
];

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let policy = if args.monotonic {
        StatusPolicy::Monotonic
    } else {
        StatusPolicy::Permissive
    };

    let store = Arc::new(InMemoryProcurementStore::new());
    let tender = Tender {
        id: TenderId("T-ROADS-2026".to_string()),
        tender_number: "MRH/2026/014".to_string(),
        title: "Resurfacing of the Coastal Highway".to_string(),
        status: TenderStatus::Open,
        closing_date: Utc::now() + Duration::days(21),
        submissions_count: 0,
    };
    store.upsert_tender(tender.clone())?;
    let services = ProcurementServices::new(
        store.clone(),
        store.clone(),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(LogEmailProvider),
        policy,
    );

    println!("Tender portal demo");
    println!(
        "Tender {} \"{}\" closes {}",
        tender.tender_number,
        tender.title,
        tender.closing_date.format("%Y-%m-%d %H:%M UTC")
    );
    println!("Evaluation status policy: {:?}", policy);

    println!("\nApplication intake");
    let mut receipts = Vec::new();
    for bidder in BIDDERS {
        match services.intake.submit(submission(&tender.id, bidder)) {
            Ok(receipt) => {
                println!(
                    "  {:<24} accepted as {}",
                    bidder.company, receipt.application_number
                );
                receipts.push(receipt);
            }
            Err(err) => println!("  {:<24} rejected: {}", bidder.company, err),
        }
    }

    let repeat = submission(&tender.id, &BIDDERS[0]);
    match services.intake.submit(repeat) {
        Ok(receipt) => println!(
            "  Unexpected duplicate accepted: {}",
            receipt.application_number
        ),
        Err(err) => println!("  Second bid from {} rejected: {}", BIDDERS[0].company, err),
    }
    let submissions_count = store
        .fetch_tender(&tender.id)?
        .map(|tender| tender.submissions_count)
        .unwrap_or_default();
    println!("  Tender submissions count: {}", submissions_count);

    println!("\nSupporting documents");
    if let Some(first) = receipts.first() {
        let attached = services.documents.attach(AttachRequest {
            application_id: first.application_id.clone(),
            tender_id: Some(tender.id.0.clone()),
            file: Some(UploadedFile {
                file_name: "technical-proposal.pdf".to_string(),
                content_type: Some("application/pdf".to_string()),
                bytes: b"%PDF-1.7 technical proposal".to_vec(),
            }),
            document_type: Some("technical".to_string()),
        });
        match attached {
            Ok(document) => println!(
                "  Attached {} ({} bytes, stored as {})",
                document.name, document.size, document.file_name
            ),
            Err(err) => println!("  Attachment rejected: {}", err),
        }

        let rejected = services.documents.attach(AttachRequest {
            application_id: first.application_id.clone(),
            tender_id: Some(tender.id.0.clone()),
            file: Some(UploadedFile {
                file_name: "installer.exe".to_string(),
                content_type: Some("application/x-msdownload".to_string()),
                bytes: vec![0x4d, 0x5a],
            }),
            document_type: None,
        });
        if let Err(err) = rejected {
            println!("  installer.exe rejected: {}", err);
        }
    }

    println!("\nEvaluation");
    let verdicts = [(92_u8, "awarded"), (74, "rejected"), (61, "rejected")];
    for (receipt, (score, status)) in receipts.iter().zip(verdicts) {
        let outcome = services.evaluations.evaluate(
            EvaluationRequest {
                submission_id: Some(receipt.application_id.0.clone()),
                score: Some(score.into()),
                status: Some(status.to_string()),
                comments: Some("Scored against the published criteria".to_string()),
                evaluated_at: None,
            },
            "demo-panel",
        );
        match outcome {
            Ok(view) => println!(
                "  {} -> score {} ({})",
                receipt.application_number,
                view.score.unwrap_or_default(),
                view.status
            ),
            Err(err) => println!("  {} evaluation failed: {}", receipt.application_number, err),
        }
    }

    if let Some(first) = receipts.first() {
        let regression = services.evaluations.evaluate(
            EvaluationRequest {
                submission_id: Some(first.application_id.0.clone()),
                score: Some(80_u8.into()),
                status: Some("under_review".to_string()),
                comments: Some("Reopened after clarification".to_string()),
                evaluated_at: None,
            },
            "demo-panel",
        );
        match regression {
            Ok(view) => println!("  Re-evaluation moved status back to {}", view.status),
            Err(err) => println!("  Re-evaluation refused: {}", err),
        }
    }

    if args.skip_notifications {
        return Ok(());
    }

    println!("\nOutcome notifications");
    let applications = services.intake.list_for_tender(&tender.id)?;
    let targets: Vec<NotificationTarget> = applications
        .iter()
        .filter(|application| application.status == ApplicationStatus::Rejected)
        .map(NotificationTarget::from)
        .collect();
    let request = DispatchRequest {
        submissions: targets,
        message_type: "rejected".to_string(),
        custom_message: Some("A debrief is available on request.".to_string()),
        tender_details: TenderDetails {
            title: Some(tender.title.clone()),
            tender_number: Some(tender.tender_number.clone()),
            organization: Some("Ministry of Roads and Highways".to_string()),
            closing_date: Some(tender.closing_date.format("%Y-%m-%d").to_string()),
        },
    };
    match services.notifications.dispatch(request).await {
        Ok(report) => {
            println!(
                "  Attempted {} | sent {} | failed {}",
                report.total, report.successful, report.failed
            );
            for result in &report.results {
                println!(
                    "  - {} <{}>: {:?}",
                    result.application_id, result.recipient_email, result.status
                );
            }
        }
        Err(err) => println!("  Dispatch refused: {}", err),
    }

    Ok(())
}

fn submission(tender_id: &TenderId, bidder: &Bidder) -> ApplicationSubmission {
    ApplicationSubmission {
        tender_id: Some(tender_id.0.clone()),
        company_name: Some(bidder.company.to_string()),
        registration_number: Some(bidder.registration.to_string()),
        contact_person: Some(bidder.contact.to_string()),
        contact_email: Some(bidder.email.to_string()),
        total_bid_amount: Some(bidder.amount),
        currency: Some("GHS".to_string()),
        proposal: ProposalDetails {
            summary: Some("Milling, base repair and asphalt overlay".to_string()),
            methodology: Some("Phased lane closures".to_string()),
            timeline: Some("9 months".to_string()),
        },
        compliance: ComplianceDeclaration {
            tax_compliant: true,
            accepts_terms: true,
            conflict_of_interest_declared: false,
            notes: None,
        },
        ..ApplicationSubmission::default()
    }
}
