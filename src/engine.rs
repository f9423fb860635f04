//! Service façade: fetches a snapshot from the collaborators, then hands it
//! to the pure ranking and aggregation code.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::combiner::fundamento_aggregates;
use crate::config::EngineConfig;
use crate::dates::DateWindow;
use crate::error::Result;
use crate::fundamento::Fundamento;
use crate::models::{
    CombinedRankingEntry, EventFilter, EventTypeSummary, FundamentoAggregate, NewQualitativeEvent,
    Team,
};
use crate::qualitative::summarize_by_event_type;
use crate::ranking::{RankingBuilder, RankingQuery, Snapshot};
use crate::repository::{
    with_timeout, EventQueueRepository, EventRepository, EventStore, RecordOutcome, RosterSource,
    SyncReport, TallySource,
};

#[derive(Debug, Clone)]
pub struct RankingResult {
    pub entries: Vec<CombinedRankingEntry>,
    /// Qualitative events came from the offline queue only.
    pub degraded: bool,
}

pub struct RankingEngine<S, Q> {
    config: EngineConfig,
    events: EventRepository<S, Q>,
}

impl<S, Q> RankingEngine<S, Q>
where
    S: EventStore + RosterSource + TallySource,
    Q: EventQueueRepository,
{
    pub fn new(config: EngineConfig, store: S, queue: Q) -> Self {
        let events = EventRepository::new(
            store,
            queue,
            config.skills.clone(),
            config.request_timeout,
            config.max_sync_attempts,
        );
        Self { config, events }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventRepository<S, Q> {
        &self.events
    }

    /// Returns the snapshot and whether the event half of it is degraded.
    pub async fn load_snapshot(
        &self,
        window: &DateWindow,
        team: Option<Team>,
    ) -> Result<(Snapshot, bool)> {
        let timeout = self.config.request_timeout;
        let store = self.events.store();
        let roster = with_timeout(timeout, store.athletes(team)).await?;
        let tallies = with_timeout(timeout, store.tallies(window)).await?;

        let filter = EventFilter {
            date_start: window.start,
            date_end: window.end,
            ..EventFilter::default()
        };
        let fetched = self.events.fetch_events(&filter).await?;

        tracing::debug!(
            athletes = roster.len(),
            tallies = tallies.len(),
            events = fetched.events.len(),
            degraded = fetched.degraded,
            "snapshot loaded"
        );

        Ok((
            Snapshot {
                roster,
                tallies,
                events: fetched.events,
            },
            fetched.degraded,
        ))
    }

    pub async fn rank(&self, query: &RankingQuery) -> Result<RankingResult> {
        let (snapshot, degraded) = self.load_snapshot(&query.window, query.team).await?;
        let entries = RankingBuilder::from_config(&self.config).build(&snapshot, query);
        Ok(RankingResult { entries, degraded })
    }

    pub async fn aggregates(
        &self,
        window: &DateWindow,
        athlete_id: Option<Uuid>,
    ) -> Result<BTreeMap<(Uuid, Fundamento), FundamentoAggregate>> {
        let (snapshot, _) = self.load_snapshot(window, None).await?;
        let mut aggregates =
            fundamento_aggregates(&snapshot.tallies, &snapshot.events, window, &self.config.scale);
        if let Some(athlete_id) = athlete_id {
            aggregates.retain(|(id, _), _| *id == athlete_id);
        }
        Ok(aggregates)
    }

    /// Event-type mix for one athlete, most frequent first.
    pub async fn event_breakdown(
        &self,
        window: &DateWindow,
        athlete_id: Uuid,
        fundamento: Option<Fundamento>,
    ) -> Result<Vec<EventTypeSummary>> {
        let filter = EventFilter {
            athlete_id: Some(athlete_id),
            fundamento,
            date_start: window.start,
            date_end: window.end,
            ..EventFilter::default()
        };
        let fetched = self.events.fetch_events(&filter).await?;
        Ok(summarize_by_event_type(&fetched.events))
    }

    pub async fn record_event(&self, input: &NewQualitativeEvent) -> Result<RecordOutcome> {
        self.events.record_event(input).await
    }

    pub async fn sync_pending(&self) -> Result<SyncReport> {
        self.events.sync_pending().await
    }

    pub async fn delete_event(&self, id: &str) -> Result<bool> {
        self.events.delete_event(id).await
    }
}
