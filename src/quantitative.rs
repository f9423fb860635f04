use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::dates::DateWindow;
use crate::fundamento::Fundamento;
use crate::models::ExecutionTally;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantitativeSummary {
    pub hits: u64,
    pub misses: u64,
}

impl QuantitativeSummary {
    pub fn sample_count(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }

    pub fn accuracy_pct(&self) -> f64 {
        accuracy_pct(self.hits, self.misses)
    }

    fn absorb(&mut self, hits: u64, misses: u64) {
        self.hits = self.hits.saturating_add(hits);
        self.misses = self.misses.saturating_add(misses);
    }
}

pub fn accuracy_pct(hits: u64, misses: u64) -> f64 {
    let attempts = hits.saturating_add(misses);
    if attempts == 0 {
        0.0
    } else {
        hits as f64 / attempts as f64 * 100.0
    }
}

/// Per athlete and fundamento, the tallies grouped by raw storage key
/// precedence (0 = canonical name).
type KeyedTallies = HashMap<(Uuid, Fundamento), BTreeMap<usize, QuantitativeSummary>>;

fn group_in_window(tallies: &[ExecutionTally], window: &DateWindow) -> KeyedTallies {
    let mut grouped: KeyedTallies = HashMap::new();

    for tally in tallies {
        if !window.admits_raw(tally.last_date.as_deref()) {
            continue;
        }
        let fundamento = match Fundamento::parse(&tally.fundamento) {
            Ok(fundamento) => fundamento,
            Err(err) => {
                tracing::warn!(athlete_id = %tally.athlete_id, %err, "skipping tally");
                continue;
            }
        };
        let precedence = fundamento.key_precedence(&tally.fundamento);
        grouped
            .entry((tally.athlete_id, fundamento))
            .or_default()
            .entry(precedence)
            .or_default()
            .absorb(tally.hits, tally.misses);
    }

    grouped
}

/// First non-empty alias bucket wins, so `passe` beats `recepção` when both
/// hold data and either one is used when the other is empty.
fn resolve_aliases(buckets: &BTreeMap<usize, QuantitativeSummary>) -> QuantitativeSummary {
    buckets
        .values()
        .find(|summary| summary.sample_count() > 0)
        .copied()
        .unwrap_or_default()
}

pub fn aggregate_by_fundamento(
    tallies: &[ExecutionTally],
    window: &DateWindow,
) -> HashMap<(Uuid, Fundamento), QuantitativeSummary> {
    group_in_window(tallies, window)
        .into_iter()
        .map(|(key, buckets)| (key, resolve_aliases(&buckets)))
        .collect()
}

pub fn summary_for(
    tallies: &[ExecutionTally],
    athlete_id: Uuid,
    fundamento: Fundamento,
    window: &DateWindow,
) -> QuantitativeSummary {
    let relevant: Vec<ExecutionTally> = tallies
        .iter()
        .filter(|tally| tally.athlete_id == athlete_id)
        .cloned()
        .collect();
    aggregate_by_fundamento(&relevant, window)
        .remove(&(athlete_id, fundamento))
        .unwrap_or_default()
}

/// Totals across every fundamento, after alias resolution.
pub fn aggregate_overall(
    tallies: &[ExecutionTally],
    window: &DateWindow,
) -> HashMap<Uuid, QuantitativeSummary> {
    let mut overall: HashMap<Uuid, QuantitativeSummary> = HashMap::new();
    for ((athlete_id, _), summary) in aggregate_by_fundamento(tallies, window) {
        overall
            .entry(athlete_id)
            .or_default()
            .absorb(summary.hits, summary.misses);
    }
    overall
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tally(athlete_id: Uuid, fundamento: &str, hits: u64, misses: u64, date: &str) -> ExecutionTally {
        ExecutionTally {
            athlete_id,
            fundamento: fundamento.to_string(),
            hits,
            misses,
            last_date: Some(date.to_string()),
        }
    }

    #[test]
    fn accuracy_handles_zero_attempts() {
        assert_eq!(accuracy_pct(0, 0), 0.0);
        assert_eq!(accuracy_pct(6, 2), 75.0);
        assert_eq!(accuracy_pct(u64::MAX, 1), 100.0);
    }

    #[test]
    fn window_filters_by_last_date() {
        let athlete = Uuid::new_v4();
        let tallies = vec![
            tally(athlete, "saque", 4, 1, "2026-01-10"),
            tally(athlete, "ataque", 9, 1, "15/03/2026"),
        ];
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2026, 1, 1),
            NaiveDate::from_ymd_opt(2026, 1, 31),
        );
        let by_fundamento = aggregate_by_fundamento(&tallies, &window);
        assert_eq!(by_fundamento.len(), 1);
        assert_eq!(
            by_fundamento[&(athlete, Fundamento::Saque)].accuracy_pct(),
            80.0
        );
    }

    #[test]
    fn unparsable_date_keeps_the_tally() {
        let athlete = Uuid::new_v4();
        let tallies = vec![tally(athlete, "defesa", 3, 3, "semana passada")];
        let window = DateWindow::new(NaiveDate::from_ymd_opt(2026, 1, 1), None);
        let summary = summary_for(&tallies, athlete, Fundamento::Defesa, &window);
        assert_eq!(summary.sample_count(), 6);
    }

    #[test]
    fn recepcao_tally_is_visible_as_passe() {
        let athlete = Uuid::new_v4();
        let tallies = vec![
            tally(athlete, "passe", 0, 0, "2026-01-10"),
            tally(athlete, "recepção", 7, 3, "2026-01-10"),
        ];
        let window = DateWindow::unbounded();
        let summary = summary_for(&tallies, athlete, Fundamento::Passe, &window);
        assert_eq!(summary, QuantitativeSummary { hits: 7, misses: 3 });
        let by_alias = summary_for(
            &tallies,
            athlete,
            Fundamento::parse("recepção").unwrap(),
            &window,
        );
        assert_eq!(by_alias, summary);
    }

    #[test]
    fn passe_tally_wins_when_both_are_populated() {
        let athlete = Uuid::new_v4();
        let tallies = vec![
            tally(athlete, "recepção", 2, 8, "2026-01-10"),
            tally(athlete, "passe", 8, 2, "2026-01-10"),
        ];
        let summary = summary_for(&tallies, athlete, Fundamento::Passe, &DateWindow::unbounded());
        assert_eq!(summary.accuracy_pct(), 80.0);
    }

    #[test]
    fn overall_sums_resolved_fundamentos() {
        let athlete = Uuid::new_v4();
        let tallies = vec![
            tally(athlete, "saque", 5, 5, "2026-01-10"),
            tally(athlete, "passe", 3, 1, "2026-01-10"),
            tally(athlete, "recepção", 1, 1, "2026-01-10"),
        ];
        let overall = aggregate_overall(&tallies, &DateWindow::unbounded());
        assert_eq!(overall[&athlete], QuantitativeSummary { hits: 8, misses: 6 });
    }
}
