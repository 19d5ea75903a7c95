//! Seeds the in-process tender store from a CSV export of the tender catalog.
//!
//! Expected headers: `id,tender_number,title,status,closing_date[,submissions_count]`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use super::domain::{Tender, TenderId, TenderStatus};
use super::memory::InMemoryProcurementStore;
use super::repository::RepositoryError;

#[derive(Debug)]
pub enum TenderCatalogError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: usize, reason: String },
    Store(RepositoryError),
}

impl std::fmt::Display for TenderCatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenderCatalogError::Io(err) => write!(f, "failed to read tender catalog: {}", err),
            TenderCatalogError::Csv(err) => write!(f, "invalid tender catalog CSV: {}", err),
            TenderCatalogError::InvalidRow { line, reason } => {
                write!(f, "tender catalog row {} rejected: {}", line, reason)
            }
            TenderCatalogError::Store(err) => {
                write!(f, "could not load tenders into the store: {}", err)
            }
        }
    }
}

impl std::error::Error for TenderCatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TenderCatalogError::Io(err) => Some(err),
            TenderCatalogError::Csv(err) => Some(err),
            TenderCatalogError::InvalidRow { .. } => None,
            TenderCatalogError::Store(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for TenderCatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for TenderCatalogError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for TenderCatalogError {
    fn from(err: RepositoryError) -> Self {
        Self::Store(err)
    }
}

#[derive(Debug, Deserialize)]
struct TenderRow {
    id: String,
    tender_number: String,
    title: String,
    status: String,
    closing_date: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    submissions_count: Option<u32>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| value.trim().parse::<u32>().map_err(serde::de::Error::custom))
        .transpose()
}

fn parse_closing_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    // A bare date closes at the end of that day.
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
}

pub fn parse_tenders<R: Read>(reader: R) -> Result<Vec<Tender>, TenderCatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut tenders = Vec::new();

    for (index, record) in csv_reader.deserialize::<TenderRow>().enumerate() {
        let row = record?;
        // Header is line 1.
        let line = index + 2;
        let status = TenderStatus::parse(&row.status).ok_or_else(|| {
            TenderCatalogError::InvalidRow {
                line,
                reason: format!("unknown status '{}'", row.status),
            }
        })?;
        let closing_date =
            parse_closing_date(&row.closing_date).ok_or_else(|| TenderCatalogError::InvalidRow {
                line,
                reason: format!("unparseable closing_date '{}'", row.closing_date),
            })?;
        if row.id.is_empty() {
            return Err(TenderCatalogError::InvalidRow {
                line,
                reason: "id is empty".to_string(),
            });
        }

        tenders.push(Tender {
            id: TenderId(row.id),
            tender_number: row.tender_number,
            title: row.title,
            status,
            closing_date,
            submissions_count: row.submissions_count.unwrap_or(0),
        });
    }

    Ok(tenders)
}

/// Load a catalog file into the store, returning how many tenders were seeded.
pub fn load_into<P: AsRef<Path>>(
    path: P,
    store: &InMemoryProcurementStore,
) -> Result<usize, TenderCatalogError> {
    let file = File::open(path)?;
    let tenders = parse_tenders(file)?;
    let count = tenders.len();
    for tender in tenders {
        store.upsert_tender(tender)?;
    }
    Ok(count)
}
