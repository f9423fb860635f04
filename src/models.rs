use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RankingError, Result};
use crate::fundamento::{EventType, Fundamento};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Masculino,
    Feminino,
}

impl Team {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "masculino" | "m" => Ok(Team::Masculino),
            "feminino" | "f" => Ok(Team::Feminino),
            _ => Err(RankingError::Configuration(format!("unknown team '{raw}'"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Team::Masculino => "masculino",
            Team::Feminino => "feminino",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Athlete {
    pub id: Uuid,
    pub name: String,
    pub team: Team,
}

/// A recorded qualitative observation. `weight` is frozen at record time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeEvent {
    pub id: Option<String>,
    pub athlete_id: Uuid,
    pub training_id: Option<Uuid>,
    pub fundamento: Fundamento,
    pub event_type: EventType,
    pub weight: f64,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Input of a coach/monitor action, before the weight is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQualitativeEvent {
    pub athlete_id: Uuid,
    pub training_id: Option<Uuid>,
    pub fundamento: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Hit/miss totals reported by the execution collaborator. `fundamento`
/// and `last_date` are kept as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTally {
    pub athlete_id: Uuid,
    pub fundamento: String,
    pub hits: u64,
    pub misses: u64,
    pub last_date: Option<String>,
}

impl ExecutionTally {
    pub fn attempts(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityLabel {
    Excelente,
    MuitoBom,
    Bom,
    Regular,
    Ruim,
    MuitoRuim,
    SemAvaliacao,
}

impl QualityLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityLabel::Excelente => "Excelente",
            QualityLabel::MuitoBom => "Muito Bom",
            QualityLabel::Bom => "Bom",
            QualityLabel::Regular => "Regular",
            QualityLabel::Ruim => "Ruim",
            QualityLabel::MuitoRuim => "Muito Ruim",
            QualityLabel::SemAvaliacao => "Sem avaliação",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundamentoAggregate {
    pub athlete_id: Uuid,
    pub fundamento: Fundamento,
    pub mean_weight: Option<f64>,
    pub total_events: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub last_event_date: Option<DateTime<Utc>>,
    pub accuracy_pct: f64,
    pub sample_count: u64,
    pub qualitative_pct: Option<f64>,
    pub label: QualityLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRankingEntry {
    pub athlete_id: Uuid,
    pub athlete_name: String,
    pub quantitative_pct: f64,
    pub qualitative_pct: Option<f64>,
    pub composite_score: f64,
    pub total_executions: u64,
    pub total_qualitative_events: usize,
    pub descriptive_label: QualityLabel,
    pub rank_position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTypeSummary {
    pub event_type: EventType,
    pub count: usize,
    pub share_pct: f64,
    pub weight: f64,
}

/// Filter accepted by the event store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub athlete_id: Option<Uuid>,
    pub training_id: Option<Uuid>,
    pub fundamento: Option<Fundamento>,
    pub event_type: Option<EventType>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &QualitativeEvent) -> bool {
        if self.athlete_id.is_some_and(|id| id != event.athlete_id) {
            return false;
        }
        if self.training_id.is_some() && self.training_id != event.training_id {
            return false;
        }
        if self.fundamento.is_some_and(|f| f != event.fundamento) {
            return false;
        }
        if self
            .event_type
            .as_ref()
            .is_some_and(|t| *t != event.event_type)
        {
            return false;
        }
        let day = event.timestamp.date_naive();
        if self.date_start.is_some_and(|start| day < start) {
            return false;
        }
        if self.date_end.is_some_and(|end| day > end) {
            return false;
        }
        true
    }
}
