//! Bulk import of qualitative events from CSV. Rows go through the same
//! validation and offline fallback as events recorded one at a time.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use uuid::Uuid;

use crate::dates::parse_record_timestamp;
use crate::models::NewQualitativeEvent;
use crate::repository::{EventQueueRepository, EventRepository, EventStore, EventSyncState};

#[derive(Debug, Deserialize)]
struct CsvRow {
    athlete_id: Uuid,
    fundamento: String,
    event_type: String,
    occurred_at: String,
    training_id: Option<Uuid>,
    notes: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportSummary {
    pub recorded: usize,
    pub queued: usize,
    pub rejected: Vec<(usize, String)>,
}

/// Parses every row; a bad date only rejects its own row. Line numbers count
/// the header as line 1.
pub fn read_events<R: Read>(reader: R) -> anyhow::Result<Vec<(usize, anyhow::Result<NewQualitativeEvent>)>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed CSV row at line {line}"))?;
        let parsed = parse_record_timestamp(&row.occurred_at)
            .map(|timestamp| NewQualitativeEvent {
                athlete_id: row.athlete_id,
                training_id: row.training_id,
                fundamento: row.fundamento,
                event_type: row.event_type,
                timestamp,
                notes: row.notes.filter(|note| !note.trim().is_empty()),
            })
            .map_err(anyhow::Error::from);
        rows.push((line, parsed));
    }

    Ok(rows)
}

pub async fn import_csv<S, Q>(
    repository: &EventRepository<S, Q>,
    csv_path: &Path,
) -> anyhow::Result<ImportSummary>
where
    S: EventStore,
    Q: EventQueueRepository,
{
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary::default();

    for (line, parsed) in read_events(file)? {
        let input = match parsed {
            Ok(input) => input,
            Err(err) => {
                summary.rejected.push((line, err.to_string()));
                continue;
            }
        };
        match repository.record_event(&input).await {
            Ok(outcome) if outcome.state == EventSyncState::PendingSync => summary.queued += 1,
            Ok(_) => summary.recorded += 1,
            Err(err) if err.is_configuration() => {
                summary.rejected.push((line, err.to_string()));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to record event at line {line}"));
            }
        }
    }

    tracing::info!(
        recorded = summary.recorded,
        queued = summary.queued,
        rejected = summary.rejected.len(),
        "csv import finished"
    );
    Ok(summary)
}
