//! Ranking over an already-fetched [`Snapshot`].
//!
//! Ordering is a strict cascade: the selected score key (descending), then
//! total executions (descending), then athlete name in collation order, then
//! raw name and athlete id so that no two entries ever compare equal.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::combiner::{combine, WeightProfile, WeightProfiles};
use crate::config::EngineConfig;
use crate::dates::DateWindow;
use crate::fundamento::Fundamento;
use crate::models::{Athlete, CombinedRankingEntry, ExecutionTally, QualitativeEvent, Team};
use crate::qualitative::{self, QualitativeScale, QualitativeSummary};
use crate::quantitative::{self, QuantitativeSummary};

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub roster: Vec<Athlete>,
    pub tallies: Vec<ExecutionTally>,
    pub events: Vec<QualitativeEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortMode {
    #[default]
    Composite,
    Quantitative,
    Qualitative,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "composite" => Ok(SortMode::Composite),
            "quantitative" => Ok(SortMode::Quantitative),
            "qualitative" => Ok(SortMode::Qualitative),
            other => Err(format!(
                "unknown sort mode '{other}' (expected composite, quantitative or qualitative)"
            )),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortMode::Composite => "composite",
            SortMode::Quantitative => "quantitative",
            SortMode::Qualitative => "qualitative",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingScope {
    Overall,
    Fundamento(Fundamento),
}

#[derive(Debug, Clone)]
pub struct RankingQuery {
    pub scope: RankingScope,
    pub sort_mode: SortMode,
    pub apply_min_sample: bool,
    pub top_n: Option<usize>,
    pub team: Option<Team>,
    pub window: DateWindow,
}

impl RankingQuery {
    fn base(scope: RankingScope) -> Self {
        Self {
            scope,
            sort_mode: SortMode::Composite,
            apply_min_sample: true,
            top_n: None,
            team: None,
            window: DateWindow::unbounded(),
        }
    }

    pub fn fundamento(fundamento: Fundamento) -> Self {
        Self::base(RankingScope::Fundamento(fundamento))
    }

    pub fn overall() -> Self {
        Self::base(RankingScope::Overall)
    }
}

#[derive(Debug, Clone)]
pub struct RankingBuilder {
    profiles: WeightProfiles,
    scale: QualitativeScale,
    min_sample: u32,
}

impl RankingBuilder {
    pub fn new(profiles: WeightProfiles, scale: QualitativeScale, min_sample: u32) -> Self {
        Self {
            profiles,
            scale,
            min_sample,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.profiles, config.scale, config.min_sample)
    }

    pub fn build(&self, snapshot: &Snapshot, query: &RankingQuery) -> Vec<CombinedRankingEntry> {
        let (quantitative, qualitative, profile) = self.inputs_for(snapshot, query);
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for athlete in &snapshot.roster {
            if query.team.is_some_and(|team| team != athlete.team) {
                continue;
            }
            if !seen.insert(athlete.id) {
                continue;
            }

            let quant = quantitative.get(&athlete.id).copied().unwrap_or_default();
            if query.apply_min_sample && quant.sample_count() < u64::from(self.min_sample) {
                tracing::debug!(
                    athlete = %athlete.name,
                    executions = quant.sample_count(),
                    "below minimum sample, omitted from ranking"
                );
                continue;
            }

            let qual = qualitative.get(&athlete.id);
            let score = combine(&quant, qual, &profile, &self.scale);
            entries.push(CombinedRankingEntry {
                athlete_id: athlete.id,
                athlete_name: athlete.name.clone(),
                quantitative_pct: score.quantitative_pct,
                qualitative_pct: score.qualitative_pct,
                composite_score: score.composite_score,
                total_executions: quant.sample_count(),
                total_qualitative_events: qual.map_or(0, |summary| summary.total_events),
                descriptive_label: score.label,
                rank_position: 0,
            });
        }

        rank_entries(entries, query.sort_mode, query.top_n)
    }

    fn inputs_for(
        &self,
        snapshot: &Snapshot,
        query: &RankingQuery,
    ) -> (
        HashMap<Uuid, QuantitativeSummary>,
        HashMap<Uuid, QualitativeSummary>,
        WeightProfile,
    ) {
        match query.scope {
            RankingScope::Overall => (
                quantitative::aggregate_overall(&snapshot.tallies, &query.window),
                qualitative::aggregate_overall(&snapshot.events, &query.window),
                self.profiles.overall,
            ),
            RankingScope::Fundamento(fundamento) => {
                let pick = |key: &(Uuid, Fundamento)| key.1 == fundamento;
                let quant = quantitative::aggregate_by_fundamento(&snapshot.tallies, &query.window)
                    .into_iter()
                    .filter(|(key, _)| pick(key))
                    .map(|((athlete_id, _), summary)| (athlete_id, summary))
                    .collect();
                let qual = qualitative::aggregate_by_fundamento(&snapshot.events, &query.window)
                    .into_iter()
                    .filter(|(key, _)| pick(key))
                    .map(|((athlete_id, _), summary)| (athlete_id, summary))
                    .collect();
                (quant, qual, self.profiles.per_fundamento)
            }
        }
    }
}

/// Sorts, assigns 0-based positions, then truncates.
pub fn rank_entries(
    mut entries: Vec<CombinedRankingEntry>,
    sort_mode: SortMode,
    top_n: Option<usize>,
) -> Vec<CombinedRankingEntry> {
    entries.sort_by(|a, b| compare_entries(a, b, sort_mode));
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank_position = position;
    }
    if let Some(limit) = top_n {
        entries.truncate(limit);
    }
    entries
}

pub fn compare_entries(
    a: &CombinedRankingEntry,
    b: &CombinedRankingEntry,
    sort_mode: SortMode,
) -> Ordering {
    let by_key = match sort_mode {
        SortMode::Composite => b.composite_score.total_cmp(&a.composite_score),
        SortMode::Quantitative => b.quantitative_pct.total_cmp(&a.quantitative_pct),
        // Unevaluated athletes sort below every evaluated one.
        SortMode::Qualitative => match (a.qualitative_pct, b.qualitative_pct) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };

    by_key
        .then_with(|| b.total_executions.cmp(&a.total_executions))
        .then_with(|| compare_names(&a.athlete_name, &b.athlete_name))
        .then_with(|| a.athlete_id.cmp(&b.athlete_id))
}

/// Case-insensitive, accent-folded comparison for Portuguese names, falling
/// back to code point order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collation_key(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}
