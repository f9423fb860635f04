use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use fundamento_ranking::config::EngineConfig;
use fundamento_ranking::dates::DateWindow;
use fundamento_ranking::engine::RankingEngine;
use fundamento_ranking::fundamento::{EventType, Fundamento};
use fundamento_ranking::models::{
    Athlete, EventFilter, ExecutionTally, NewQualitativeEvent, QualitativeEvent, QualityLabel, Team,
};
use fundamento_ranking::qualitative::classify;
use fundamento_ranking::queue::MemoryEventQueue;
use fundamento_ranking::ranking::{RankingBuilder, RankingQuery, Snapshot};
use fundamento_ranking::repository::{EventQueueRepository, EventStore, RosterSource, TallySource};
use fundamento_ranking::{RankingError, Result};

#[derive(Default)]
struct InMemoryStore {
    roster: Vec<Athlete>,
    tallies: Vec<ExecutionTally>,
    events: Mutex<Vec<QualitativeEvent>>,
    offline: AtomicBool,
    rejected_notes: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RankingError::RemoteUnavailable("offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RosterSource for InMemoryStore {
    async fn athletes(&self, team: Option<Team>) -> Result<Vec<Athlete>> {
        Ok(self
            .roster
            .iter()
            .filter(|a| team.map_or(true, |t| a.team == t))
            .cloned()
            .collect())
    }

    async fn athlete(&self, id: Uuid) -> Result<Option<Athlete>> {
        Ok(self.roster.iter().find(|a| a.id == id).cloned())
    }
}

#[async_trait]
impl TallySource for InMemoryStore {
    async fn tallies(&self, _window: &DateWindow) -> Result<Vec<ExecutionTally>> {
        Ok(self.tallies.clone())
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert_event(&self, event: &QualitativeEvent) -> Result<String> {
        self.check_online()?;
        if let Some(note) = &event.notes {
            if self.rejected_notes.lock().await.contains(note) {
                return Err(RankingError::RemoteUnavailable("write lost".to_string()));
            }
        }
        let id = Uuid::new_v4().to_string();
        let mut stored = event.clone();
        stored.id = Some(id.clone());
        self.events.lock().await.push(stored);
        Ok(id)
    }

    async fn delete_event(&self, id: &str) -> Result<bool> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.id.as_deref() != Some(id));
        Ok(events.len() < before)
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<QualitativeEvent>> {
        self.check_online()?;
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

fn athlete(name: &str) -> Athlete {
    Athlete {
        id: Uuid::new_v4(),
        name: name.to_string(),
        team: Team::Feminino,
    }
}

fn tally(athlete: &Athlete, fundamento: &str, hits: u64, misses: u64) -> ExecutionTally {
    ExecutionTally {
        athlete_id: athlete.id,
        fundamento: fundamento.to_string(),
        hits,
        misses,
        last_date: Some("10/02/2026".to_string()),
    }
}

fn events(athlete: &Athlete, fundamento: Fundamento, weights: &[f64]) -> Vec<QualitativeEvent> {
    weights
        .iter()
        .enumerate()
        .map(|(i, weight)| QualitativeEvent {
            id: Some(format!("remote-{i}")),
            athlete_id: athlete.id,
            training_id: None,
            fundamento,
            event_type: EventType::new("observado").unwrap(),
            weight: *weight,
            timestamp: Utc.with_ymd_and_hms(2026, 2, 10, 18, 0, 0).unwrap(),
            notes: None,
        })
        .collect()
}

fn builder() -> RankingBuilder {
    RankingBuilder::from_config(&EngineConfig::builtin().unwrap())
}

#[test]
fn accuracy_only_athlete_scores_exactly_their_accuracy() {
    let a = athlete("Athlete A");
    let snapshot = Snapshot {
        roster: vec![a.clone()],
        tallies: vec![tally(&a, "saque", 6, 2)],
        events: Vec::new(),
    };
    let ranking = builder().build(&snapshot, &RankingQuery::fundamento(Fundamento::Saque));
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].quantitative_pct, 75.0);
    assert_eq!(ranking[0].composite_score, 75.0);
    assert_eq!(ranking[0].descriptive_label, QualityLabel::SemAvaliacao);
    assert_eq!(ranking[0].descriptive_label.to_string(), "Sem avaliação");
}

#[test]
fn blended_score_uses_per_fundamento_profile() {
    let b = athlete("Athlete B");
    let snapshot = Snapshot {
        roster: vec![b.clone()],
        tallies: vec![tally(&b, "ataque", 8, 2)],
        events: events(&b, Fundamento::Ataque, &[3.0, 3.0, 1.0, 1.0, 2.0]),
    };
    let ranking = builder().build(&snapshot, &RankingQuery::fundamento(Fundamento::Ataque));
    let entry = &ranking[0];
    assert_eq!(entry.quantitative_pct, 80.0);
    assert!((entry.qualitative_pct.unwrap() - 80.0).abs() < 1e-9);
    assert!((entry.composite_score - 80.0).abs() < 1e-9);
    assert_eq!(entry.total_qualitative_events, 5);
}

#[test]
fn small_sample_is_excluded_despite_many_events() {
    let c = athlete("Athlete C");
    let d = athlete("Athlete D");
    let snapshot = Snapshot {
        roster: vec![c.clone(), d.clone()],
        tallies: vec![tally(&c, "bloqueio", 3, 0), tally(&d, "bloqueio", 2, 3)],
        events: events(&c, Fundamento::Bloqueio, &[3.0; 10]),
    };
    let ranking = builder().build(&snapshot, &RankingQuery::fundamento(Fundamento::Bloqueio));
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].athlete_id, d.id);
}

#[test]
fn labels_for_example_means() {
    assert_eq!(classify(2.6).to_string(), "Excelente");
    assert_eq!(classify(0.6).to_string(), "Bom");
    assert_eq!(classify(-1.8).to_string(), "Muito Ruim");
}

#[test]
fn passe_and_recepcao_rank_identically() {
    let a = athlete("Luana");
    let snapshot = Snapshot {
        roster: vec![a.clone()],
        tallies: vec![tally(&a, "recepção", 7, 3)],
        events: Vec::new(),
    };
    let by_passe = builder().build(&snapshot, &RankingQuery::fundamento(Fundamento::Passe));
    let alias = Fundamento::parse("recepção").unwrap();
    let by_recepcao = builder().build(&snapshot, &RankingQuery::fundamento(alias));
    assert_eq!(by_passe, by_recepcao);
    assert_eq!(by_passe[0].quantitative_pct, 70.0);
}

#[tokio::test]
async fn partial_reconciliation_reports_and_keeps_failures() {
    let store = InMemoryStore::default();
    store.offline.store(true, Ordering::SeqCst);
    let engine = RankingEngine::new(EngineConfig::builtin().unwrap(), store, MemoryEventQueue::new());

    for note in ["primeiro", "segundo", "terceiro"] {
        let outcome = engine
            .record_event(&NewQualitativeEvent {
                athlete_id: Uuid::new_v4(),
                training_id: None,
                fundamento: "saque".to_string(),
                event_type: "ace".to_string(),
                timestamp: Utc::now(),
                notes: Some(note.to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.event.id.unwrap().starts_with("local_"));
    }

    let store = engine.events().store();
    store.offline.store(false, Ordering::SeqCst);
    store.rejected_notes.lock().await.insert("primeiro".to_string());

    let report = engine.sync_pending().await.unwrap();
    assert_eq!(report.synced_count, 2);

    let remaining = engine.events().queue().drain_pending().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].event.notes.as_deref(), Some("primeiro"));
}

#[tokio::test]
async fn engine_ranks_with_queued_events_when_offline() {
    let a = athlete("Bianca");
    let b = athlete("Amanda");
    let store = InMemoryStore {
        roster: vec![a.clone(), b.clone()],
        tallies: vec![tally(&a, "defesa", 5, 5), tally(&b, "defesa", 5, 5)],
        ..InMemoryStore::default()
    };
    store.offline.store(true, Ordering::SeqCst);
    let engine = RankingEngine::new(EngineConfig::builtin().unwrap(), store, MemoryEventQueue::new());

    engine
        .record_event(&NewQualitativeEvent {
            athlete_id: a.id,
            training_id: None,
            fundamento: "defesa".to_string(),
            event_type: "defesa_perfeita".to_string(),
            timestamp: Utc::now(),
            notes: None,
        })
        .await
        .unwrap();

    let result = engine
        .rank(&RankingQuery::fundamento(Fundamento::Defesa))
        .await
        .unwrap();
    assert!(result.degraded);
    assert_eq!(result.entries[0].athlete_name, "Bianca");
    assert_eq!(result.entries[1].athlete_name, "Amanda");
    // 0.6 * 50 + 0.4 * 100
    assert!((result.entries[0].composite_score - 70.0).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_event_type_is_rejected_before_storage() {
    let engine = RankingEngine::new(
        EngineConfig::builtin().unwrap(),
        InMemoryStore::default(),
        MemoryEventQueue::new(),
    );
    let err = engine
        .record_event(&NewQualitativeEvent {
            athlete_id: Uuid::new_v4(),
            training_id: None,
            fundamento: "recepção".to_string(),
            event_type: "ace".to_string(),
            timestamp: Utc::now(),
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RankingError::UnknownEventType { .. }));
    assert!(engine.events().store().events.lock().await.is_empty());
}

#[tokio::test]
async fn event_breakdown_counts_recorded_events_per_type() {
    let a = athlete("Carol");
    let engine = RankingEngine::new(
        EngineConfig::builtin().unwrap(),
        InMemoryStore {
            roster: vec![a.clone()],
            ..InMemoryStore::default()
        },
        MemoryEventQueue::new(),
    );

    for event_type in ["ace", "ace", "erro_saque"] {
        engine
            .record_event(&NewQualitativeEvent {
                athlete_id: a.id,
                training_id: None,
                fundamento: "saque".to_string(),
                event_type: event_type.to_string(),
                timestamp: Utc::now(),
                notes: None,
            })
            .await
            .unwrap();
    }

    let mix = engine
        .event_breakdown(&DateWindow::unbounded(), a.id, Some(Fundamento::Saque))
        .await
        .unwrap();
    assert_eq!(mix.len(), 2);
    assert_eq!(mix[0].event_type.as_str(), "ace");
    assert_eq!(mix[0].count, 2);
    assert_eq!(mix[1].weight, -2.0);
}
