use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates::DateWindow;
use crate::error::{RankingError, Result};
use crate::fundamento::{EventType, Fundamento};
use crate::models::{EventTypeSummary, QualitativeEvent, QualityLabel};

/// Lowest configured weight, shifted to zero before scaling.
pub const DEFAULT_WEIGHT_OFFSET: f64 = 2.0;
/// Width of the configured weight domain (`-2.0 ..= 3.0`).
pub const DEFAULT_WEIGHT_DOMAIN_WIDTH: f64 = 5.0;

/// Maps a mean event weight onto `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitativeScale {
    pub offset: f64,
    pub width: f64,
}

impl Default for QualitativeScale {
    fn default() -> Self {
        Self {
            offset: DEFAULT_WEIGHT_OFFSET,
            width: DEFAULT_WEIGHT_DOMAIN_WIDTH,
        }
    }
}

impl QualitativeScale {
    pub fn validate(&self) -> Result<()> {
        if !self.offset.is_finite() || !self.width.is_finite() || self.width <= 0.0 {
            return Err(RankingError::Configuration(format!(
                "qualitative scale needs a finite offset and a positive width, got {:?}",
                self
            )));
        }
        Ok(())
    }

    pub fn to_pct(&self, mean_weight: f64) -> f64 {
        (((mean_weight + self.offset) / self.width) * 100.0).clamp(0.0, 100.0)
    }
}

pub fn classify(mean_weight: f64) -> QualityLabel {
    if mean_weight >= 2.5 {
        QualityLabel::Excelente
    } else if mean_weight >= 1.5 {
        QualityLabel::MuitoBom
    } else if mean_weight >= 0.5 {
        QualityLabel::Bom
    } else if mean_weight >= -0.5 {
        QualityLabel::Regular
    } else if mean_weight >= -1.5 {
        QualityLabel::Ruim
    } else {
        QualityLabel::MuitoRuim
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualitativeSummary {
    pub total_events: usize,
    pub weight_sum: f64,
    pub positive_count: usize,
    pub negative_count: usize,
    pub last_event_date: Option<DateTime<Utc>>,
}

impl QualitativeSummary {
    pub fn mean_weight(&self) -> Option<f64> {
        if self.total_events == 0 {
            None
        } else {
            Some(self.weight_sum / self.total_events as f64)
        }
    }

    pub fn qualitative_pct(&self, scale: &QualitativeScale) -> Option<f64> {
        self.mean_weight().map(|mean| scale.to_pct(mean))
    }

    pub fn label(&self) -> QualityLabel {
        self.mean_weight()
            .map(classify)
            .unwrap_or(QualityLabel::SemAvaliacao)
    }

    fn record(&mut self, event: &QualitativeEvent) {
        if !event.weight.is_finite() {
            tracing::warn!(
                athlete_id = %event.athlete_id,
                event_type = %event.event_type,
                "ignoring event with non-finite weight"
            );
            return;
        }
        self.total_events += 1;
        self.weight_sum += event.weight;
        if event.weight > 0.0 {
            self.positive_count += 1;
        } else if event.weight < 0.0 {
            self.negative_count += 1;
        }
        if self.last_event_date.map_or(true, |last| event.timestamp > last) {
            self.last_event_date = Some(event.timestamp);
        }
    }
}

pub fn summarize<'a, I>(events: I) -> QualitativeSummary
where
    I: IntoIterator<Item = &'a QualitativeEvent>,
{
    let mut summary = QualitativeSummary::default();
    for event in events {
        summary.record(event);
    }
    summary
}

pub fn aggregate_by_fundamento(
    events: &[QualitativeEvent],
    window: &DateWindow,
) -> HashMap<(Uuid, Fundamento), QualitativeSummary> {
    let mut summaries: HashMap<(Uuid, Fundamento), QualitativeSummary> = HashMap::new();
    for event in events.iter().filter(|e| window.contains_timestamp(e.timestamp)) {
        summaries
            .entry((event.athlete_id, event.fundamento))
            .or_default()
            .record(event);
    }
    summaries
}

pub fn aggregate_overall(
    events: &[QualitativeEvent],
    window: &DateWindow,
) -> HashMap<Uuid, QualitativeSummary> {
    let mut summaries: HashMap<Uuid, QualitativeSummary> = HashMap::new();
    for event in events.iter().filter(|e| window.contains_timestamp(e.timestamp)) {
        summaries.entry(event.athlete_id).or_default().record(event);
    }
    summaries
}

/// Event mix for one slice of events, most frequent first.
pub fn summarize_by_event_type(events: &[QualitativeEvent]) -> Vec<EventTypeSummary> {
    let mut map: HashMap<EventType, (usize, f64)> = HashMap::new();

    for event in events {
        let entry = map.entry(event.event_type.clone()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += event.weight;
    }

    let total = events.len();
    let mut summaries: Vec<EventTypeSummary> = map
        .into_iter()
        .map(|(event_type, (count, weight_sum))| EventTypeSummary {
            event_type,
            count,
            share_pct: count as f64 / total as f64 * 100.0,
            weight: weight_sum / count as f64,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.event_type.cmp(&b.event_type))
    });
    summaries
}
