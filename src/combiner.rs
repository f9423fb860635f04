use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates::DateWindow;
use crate::error::{RankingError, Result};
use crate::fundamento::Fundamento;
use crate::models::{ExecutionTally, FundamentoAggregate, QualitativeEvent, QualityLabel};
use crate::qualitative::{self, QualitativeScale, QualitativeSummary};
use crate::quantitative::{self, QuantitativeSummary};

/// Relative weight of the two measurement streams. The pair does not have to
/// sum to one; it is normalized before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub quantitative: f64,
    pub qualitative: f64,
}

impl WeightProfile {
    pub const OVERALL: WeightProfile = WeightProfile {
        quantitative: 0.7,
        qualitative: 0.3,
    };

    pub const PER_FUNDAMENTO: WeightProfile = WeightProfile {
        quantitative: 0.6,
        qualitative: 0.4,
    };

    pub fn new(quantitative: f64, qualitative: f64) -> Result<Self> {
        let valid = quantitative.is_finite()
            && qualitative.is_finite()
            && quantitative >= 0.0
            && qualitative >= 0.0
            && quantitative + qualitative > 0.0;
        if !valid {
            return Err(RankingError::Configuration(format!(
                "weight profile {{{quantitative}, {qualitative}}} needs non-negative weights with a positive sum"
            )));
        }
        Ok(Self {
            quantitative,
            qualitative,
        })
    }

    /// `(quantitative', qualitative')`, summing to 1.
    pub fn normalized(&self) -> (f64, f64) {
        let total = self.quantitative + self.qualitative;
        if !(total > 0.0) || !total.is_finite() {
            return (1.0, 0.0);
        }
        let quantitative = self.quantitative / total;
        (quantitative, 1.0 - quantitative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightProfiles {
    pub overall: WeightProfile,
    pub per_fundamento: WeightProfile,
}

impl Default for WeightProfiles {
    fn default() -> Self {
        Self {
            overall: WeightProfile::OVERALL,
            per_fundamento: WeightProfile::PER_FUNDAMENTO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedScore {
    pub quantitative_pct: f64,
    pub qualitative_pct: Option<f64>,
    pub composite_score: f64,
    pub label: QualityLabel,
}

pub fn combine(
    quantitative: &QuantitativeSummary,
    qualitative: Option<&QualitativeSummary>,
    profile: &WeightProfile,
    scale: &QualitativeScale,
) -> CombinedScore {
    let quantitative_pct = quantitative.accuracy_pct();
    let evaluated = qualitative.and_then(|summary| {
        let mean = summary.mean_weight()?;
        Some((scale.to_pct(mean), summary.label()))
    });

    match evaluated {
        None => CombinedScore {
            quantitative_pct,
            qualitative_pct: None,
            composite_score: quantitative_pct,
            label: QualityLabel::SemAvaliacao,
        },
        Some((qualitative_pct, label)) => {
            let (quant_weight, qual_weight) = profile.normalized();
            let composite = quantitative_pct * quant_weight + qualitative_pct * qual_weight;
            CombinedScore {
                quantitative_pct,
                qualitative_pct: Some(qualitative_pct),
                composite_score: composite.clamp(0.0, 100.0),
                label,
            }
        }
    }
}

/// Both streams side by side for every athlete/fundamento pair that has
/// data in either one.
pub fn fundamento_aggregates(
    tallies: &[ExecutionTally],
    events: &[QualitativeEvent],
    window: &DateWindow,
    scale: &QualitativeScale,
) -> BTreeMap<(Uuid, Fundamento), FundamentoAggregate> {
    let quantitative = quantitative::aggregate_by_fundamento(tallies, window);
    let qualitative = qualitative::aggregate_by_fundamento(events, window);

    let mut keys: Vec<(Uuid, Fundamento)> = quantitative.keys().copied().collect();
    keys.extend(qualitative.keys().copied());

    keys.into_iter()
        .map(|key| {
            let quant = quantitative.get(&key).copied().unwrap_or_default();
            let qual = qualitative.get(&key).copied().unwrap_or_default();
            let aggregate = FundamentoAggregate {
                athlete_id: key.0,
                fundamento: key.1,
                mean_weight: qual.mean_weight(),
                total_events: qual.total_events,
                positive_count: qual.positive_count,
                negative_count: qual.negative_count,
                last_event_date: qual.last_event_date,
                accuracy_pct: quant.accuracy_pct(),
                sample_count: quant.sample_count(),
                qualitative_pct: qual.qualitative_pct(scale),
                label: qual.label(),
            };
            (key, aggregate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fundamento::EventType;
    use chrono::Utc;

    #[test]
    fn aggregates_cover_both_sources() {
        let athlete = Uuid::new_v4();
        let tallies = vec![ExecutionTally {
            athlete_id: athlete,
            fundamento: "recepção".to_string(),
            hits: 9,
            misses: 1,
            last_date: None,
        }];
        let events = vec![QualitativeEvent {
            id: None,
            athlete_id: athlete,
            training_id: None,
            fundamento: Fundamento::Levantamento,
            event_type: EventType::new("levantamento_bom").unwrap(),
            weight: 1.0,
            timestamp: Utc::now(),
            notes: None,
        }];
        let aggregates = fundamento_aggregates(
            &tallies,
            &events,
            &DateWindow::unbounded(),
            &QualitativeScale::default(),
        );
        assert_eq!(aggregates.len(), 2);
        let passe = &aggregates[&(athlete, Fundamento::Passe)];
        assert_eq!(passe.accuracy_pct, 90.0);
        assert_eq!(passe.label, QualityLabel::SemAvaliacao);
        let levantamento = &aggregates[&(athlete, Fundamento::Levantamento)];
        assert_eq!(levantamento.sample_count, 0);
        assert_eq!(levantamento.mean_weight, Some(1.0));
        assert_eq!(levantamento.label, QualityLabel::Bom);
    }

    fn qualitative(mean: f64, count: usize) -> QualitativeSummary {
        QualitativeSummary {
            total_events: count,
            weight_sum: mean * count as f64,
            positive_count: count,
            negative_count: 0,
            last_event_date: None,
        }
    }

    #[test]
    fn no_events_is_pure_accuracy() {
        let quantitative = QuantitativeSummary { hits: 6, misses: 2 };
        let score = combine(
            &quantitative,
            None,
            &WeightProfile::PER_FUNDAMENTO,
            &QualitativeScale::default(),
        );
        assert_eq!(score.composite_score, 75.0);
        assert_eq!(score.composite_score, score.quantitative_pct);
        assert_eq!(score.label, QualityLabel::SemAvaliacao);

        let empty = QualitativeSummary::default();
        let score = combine(
            &quantitative,
            Some(&empty),
            &WeightProfile::OVERALL,
            &QualitativeScale::default(),
        );
        assert_eq!(score.composite_score, 75.0);
        assert_eq!(score.qualitative_pct, None);
    }

    #[test]
    fn blends_with_per_fundamento_profile() {
        let quantitative = QuantitativeSummary { hits: 8, misses: 2 };
        let events = qualitative(2.0, 5);
        let score = combine(
            &quantitative,
            Some(&events),
            &WeightProfile::PER_FUNDAMENTO,
            &QualitativeScale::default(),
        );
        assert!((score.qualitative_pct.unwrap() - 80.0).abs() < 1e-9);
        assert!((score.composite_score - 80.0).abs() < 1e-9);
        assert_eq!(score.label, QualityLabel::MuitoBom);
    }

    #[test]
    fn profile_ratio_not_magnitude_matters() {
        let quantitative = QuantitativeSummary { hits: 3, misses: 7 };
        let events = qualitative(2.7, 4);
        let scale = QualitativeScale::default();
        let raw = combine(
            &quantitative,
            Some(&events),
            &WeightProfile::new(6.0, 4.0).unwrap(),
            &scale,
        );
        let unit = combine(
            &quantitative,
            Some(&events),
            &WeightProfile::new(0.6, 0.4).unwrap(),
            &scale,
        );
        assert!((raw.composite_score - unit.composite_score).abs() < 1e-9);
    }

    #[test]
    fn normalized_weights_sum_to_one() {
        for (q, l) in [(0.7, 0.3), (6.0, 4.0), (1.0, 0.0), (0.001, 900.0)] {
            let (a, b) = WeightProfile::new(q, l).unwrap().normalized();
            assert!((a + b - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn composite_stays_in_bounds() {
        let scale = QualitativeScale::default();
        for (hits, misses) in [(0, 0), (0, 10), (10, 0), (1, 1)] {
            for mean in [-10.0, -2.0, 0.0, 3.0, 50.0] {
                let score = combine(
                    &QuantitativeSummary { hits, misses },
                    Some(&qualitative(mean, 3)),
                    &WeightProfile::OVERALL,
                    &scale,
                );
                assert!((0.0..=100.0).contains(&score.composite_score));
            }
        }
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        assert!(WeightProfile::new(0.0, 0.0).is_err());
        assert!(WeightProfile::new(-1.0, 2.0).is_err());
        assert!(WeightProfile::new(f64::NAN, 1.0).is_err());
    }
}
