//! Boundary between the scoring core and the outside world.
//!
//! The collaborator traits ([`RosterSource`], [`TallySource`], [`EventStore`])
//! are implemented over Postgres in [`crate::db`]. [`EventRepository`] sits in
//! front of the event store and owns the offline path: writes that cannot
//! reach the store go to an [`EventQueueRepository`] under a `local_` id and
//! are replayed by [`EventRepository::sync_pending`].

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SkillEventConfig;
use crate::dates::DateWindow;
use crate::error::{RankingError, Result};
use crate::fundamento::{EventType, Fundamento};
use crate::models::{Athlete, EventFilter, ExecutionTally, NewQualitativeEvent, QualitativeEvent, Team};

pub const LOCAL_ID_PREFIX: &str = "local_";

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

pub fn new_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())
}

#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn athletes(&self, team: Option<Team>) -> Result<Vec<Athlete>>;

    async fn athlete(&self, id: Uuid) -> Result<Option<Athlete>>;
}

#[async_trait]
pub trait TallySource: Send + Sync {
    async fn tallies(&self, window: &DateWindow) -> Result<Vec<ExecutionTally>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists the event and returns the id assigned by the store.
    async fn insert_event(&self, event: &QualitativeEvent) -> Result<String>;

    async fn delete_event(&self, id: &str) -> Result<bool>;

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<QualitativeEvent>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub event: QualitativeEvent,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedEvent {
    pub fn local_id(&self) -> Option<&str> {
        self.event.id.as_deref()
    }
}

/// Local, append-only store for events that could not reach the remote
/// store. `drain_pending` returns a copy and leaves the queue untouched;
/// entries leave the queue only through `remove`.
#[async_trait]
pub trait EventQueueRepository: Send + Sync {
    async fn append(&self, entry: QueuedEvent) -> Result<()>;

    async fn drain_pending(&self) -> Result<Vec<QueuedEvent>>;

    /// Removes the entries with these ids and returns how many were removed.
    async fn remove(&self, ids: &[String]) -> Result<usize>;

    async fn record_failure(&self, ids: &[String]) -> Result<()>;
}

/// `Created → PendingSync → Synced | PermanentlyLocal`; a write that reaches
/// the store directly goes `Created → Synced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventSyncState {
    Created,
    PendingSync,
    Synced,
    PermanentlyLocal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub event: QualitativeEvent,
    pub state: EventSyncState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub local_id: String,
    pub state: EventSyncState,
    pub remote_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub synced_count: usize,
    pub failed_count: usize,
    pub permanently_local_count: usize,
    pub outcomes: Vec<SyncOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedEvents {
    pub events: Vec<QualitativeEvent>,
    /// True when the remote store could not be read and only local events
    /// were returned.
    pub degraded: bool,
}

pub struct EventRepository<S, Q> {
    store: S,
    queue: Q,
    skills: SkillEventConfig,
    request_timeout: Duration,
    max_sync_attempts: u32,
}

impl<S, Q> EventRepository<S, Q>
where
    S: EventStore,
    Q: EventQueueRepository,
{
    pub fn new(
        store: S,
        queue: Q,
        skills: SkillEventConfig,
        request_timeout: Duration,
        max_sync_attempts: u32,
    ) -> Self {
        Self {
            store,
            queue,
            skills,
            request_timeout,
            max_sync_attempts,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Resolves and validates an event without touching storage.
    pub fn prepare(&self, input: &NewQualitativeEvent) -> Result<QualitativeEvent> {
        let fundamento = Fundamento::parse(&input.fundamento)?;
        let event_type = EventType::new(&input.event_type)?;
        let weight = self.skills.resolve_weight(fundamento, &event_type)?;

        Ok(QualitativeEvent {
            id: None,
            athlete_id: input.athlete_id,
            training_id: input.training_id,
            fundamento,
            event_type,
            weight,
            timestamp: input.timestamp,
            notes: input.notes.clone(),
        })
    }

    pub async fn record_event(&self, input: &NewQualitativeEvent) -> Result<RecordOutcome> {
        let mut event = self.prepare(input)?;

        match self.remote(self.store.insert_event(&event)).await {
            Ok(remote_id) => {
                event.id = Some(remote_id);
                Ok(RecordOutcome {
                    event,
                    state: EventSyncState::Synced,
                })
            }
            Err(err) if err.is_remote_unavailable() => {
                let local_id = new_local_id();
                event.id = Some(local_id.clone());
                self.queue
                    .append(QueuedEvent {
                        event: event.clone(),
                        queued_at: Utc::now(),
                        attempts: 0,
                    })
                    .await?;
                tracing::warn!(%local_id, %err, "event stored offline, pending sync");
                Ok(RecordOutcome {
                    event,
                    state: EventSyncState::PendingSync,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Replays every queued `local_` event. Each record is tried on its own;
    /// only confirmed inserts leave the queue.
    pub async fn sync_pending(&self) -> Result<SyncReport> {
        let pending = self.queue.drain_pending().await?;
        let mut report = SyncReport::default();
        let mut synced_ids = Vec::new();
        let mut failed_ids = Vec::new();
        let mut unidentified = 0;

        for entry in pending {
            let Some(local_id) = entry.local_id().filter(|id| is_local_id(id)) else {
                let id = entry.local_id().unwrap_or_default().to_string();
                tracing::warn!(%id, "queued event without a local id cannot be synced");
                report.outcomes.push(SyncOutcome {
                    local_id: id,
                    state: EventSyncState::PermanentlyLocal,
                    remote_id: None,
                    error: Some("queued event has no local id".to_string()),
                });
                unidentified += 1;
                continue;
            };
            let local_id = local_id.to_string();

            let mut event = entry.event.clone();
            event.id = None;

            match self.remote(self.store.insert_event(&event)).await {
                Ok(remote_id) => {
                    tracing::info!(%local_id, %remote_id, "queued event synced");
                    report.outcomes.push(SyncOutcome {
                        local_id: local_id.clone(),
                        state: EventSyncState::Synced,
                        remote_id: Some(remote_id),
                        error: None,
                    });
                    synced_ids.push(local_id);
                }
                Err(err) => {
                    let exhausted = entry.attempts + 1 >= self.max_sync_attempts;
                    let state = if exhausted {
                        EventSyncState::PermanentlyLocal
                    } else {
                        EventSyncState::PendingSync
                    };
                    tracing::warn!(%local_id, attempts = entry.attempts + 1, %err, "queued event not synced");
                    report.outcomes.push(SyncOutcome {
                        local_id: local_id.clone(),
                        state,
                        remote_id: None,
                        error: Some(err.to_string()),
                    });
                    failed_ids.push(local_id);
                }
            }
        }

        if !synced_ids.is_empty() {
            self.queue.remove(&synced_ids).await?;
        }
        if !failed_ids.is_empty() {
            self.queue.record_failure(&failed_ids).await?;
        }

        report.synced_count = synced_ids.len();
        report.failed_count = failed_ids.len() + unidentified;
        report.permanently_local_count = report
            .outcomes
            .iter()
            .filter(|outcome| outcome.state == EventSyncState::PermanentlyLocal)
            .count();
        Ok(report)
    }

    /// Remote events plus events still waiting in the offline queue. When the
    /// store is unreachable only the queued events are returned.
    pub async fn fetch_events(&self, filter: &EventFilter) -> Result<FetchedEvents> {
        let local: Vec<QualitativeEvent> = self
            .queue
            .drain_pending()
            .await?
            .into_iter()
            .map(|entry| entry.event)
            .filter(|event| filter.matches(event))
            .collect();

        match self.remote(self.store.query_events(filter)).await {
            Ok(mut events) => {
                let known: HashSet<String> = events.iter().filter_map(|e| e.id.clone()).collect();
                events.extend(
                    local
                        .into_iter()
                        .filter(|e| e.id.as_ref().map_or(true, |id| !known.contains(id))),
                );
                Ok(FetchedEvents {
                    events,
                    degraded: false,
                })
            }
            Err(err) if err.is_remote_unavailable() => {
                tracing::warn!(%err, local = local.len(), "serving queued events only");
                Ok(FetchedEvents {
                    events: local,
                    degraded: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn delete_event(&self, id: &str) -> Result<bool> {
        if is_local_id(id) {
            let removed = self.queue.remove(&[id.to_string()]).await?;
            return Ok(removed > 0);
        }
        self.remote(self.store.delete_event(id)).await
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    async fn remote<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_timeout(self.request_timeout, call).await
    }
}

/// Bounds a remote call; running out of time counts as the store being
/// unavailable.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RankingError::RemoteUnavailable(format!(
            "no response within {} ms",
            timeout.as_millis()
        ))),
    }
}
