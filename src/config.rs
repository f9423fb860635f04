//! Engine configuration: the skill event table, weight profiles and the
//! numeric knobs of scoring and reconciliation.
//!
//! A [`RawEngineConfig`] is what lives on disk (JSON). It is validated once
//! into an immutable [`EngineConfig`]; scoring code only ever sees the
//! validated form.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::combiner::{WeightProfile, WeightProfiles};
use crate::error::{RankingError, Result};
use crate::fundamento::{EventType, Fundamento};
use crate::qualitative::QualitativeScale;

pub const DEFAULT_MIN_SAMPLE: u32 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_SYNC_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTypeSpec {
    pub event_type: EventType,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEngineConfig {
    #[serde(default = "default_skill_table")]
    pub skills: BTreeMap<String, Vec<EventTypeSpec>>,
    #[serde(default)]
    pub profiles: WeightProfiles,
    #[serde(default)]
    pub scale: QualitativeScale,
    #[serde(default = "default_min_sample")]
    pub min_sample: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_sync_attempts")]
    pub max_sync_attempts: u32,
}

impl Default for RawEngineConfig {
    fn default() -> Self {
        Self {
            skills: default_skill_table(),
            profiles: WeightProfiles::default(),
            scale: QualitativeScale::default(),
            min_sample: DEFAULT_MIN_SAMPLE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_sync_attempts: DEFAULT_MAX_SYNC_ATTEMPTS,
        }
    }
}

fn default_min_sample() -> u32 {
    DEFAULT_MIN_SAMPLE
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_max_sync_attempts() -> u32 {
    DEFAULT_MAX_SYNC_ATTEMPTS
}

fn spec(event_type: &str, weight: f64, description: &str) -> EventTypeSpec {
    EventTypeSpec {
        event_type: EventType::builtin(event_type),
        weight,
        description: description.to_string(),
    }
}

fn default_skill_table() -> BTreeMap<String, Vec<EventTypeSpec>> {
    let mut table = BTreeMap::new();
    table.insert(
        "saque".to_string(),
        vec![
            spec("ace", 3.0, "Ponto direto de saque"),
            spec("saque_forcado", 2.0, "Saque que quebra o passe adversário"),
            spec("saque_neutro", 0.0, "Saque em jogo sem vantagem"),
            spec("saque_facil", -1.0, "Saque que entrega o ataque ao adversário"),
            spec("erro_saque", -2.0, "Saque na rede ou fora"),
        ],
    );
    table.insert(
        "passe".to_string(),
        vec![
            spec("passe_a", 3.0, "Passe na mão do levantador"),
            spec("passe_b", 1.0, "Passe que limita as opções do levantador"),
            spec("passe_c", -1.0, "Passe sem condição de ataque rápido"),
            spec("erro_passe", -2.0, "Ponto direto do adversário"),
        ],
    );
    table.insert(
        "levantamento".to_string(),
        vec![
            spec("levantamento_perfeito", 3.0, "Atacante sem bloqueio formado"),
            spec("levantamento_bom", 1.0, "Bola atacável"),
            spec("levantamento_ruim", -1.0, "Bola difícil para o atacante"),
            spec("erro_levantamento", -2.0, "Dois toques, condução ou bola perdida"),
        ],
    );
    table.insert(
        "ataque".to_string(),
        vec![
            spec("ponto_ataque", 3.0, "Ataque convertido em ponto"),
            spec("ataque_continuidade", 1.0, "Ataque defendido pelo adversário"),
            spec("ataque_bloqueado", -1.0, "Ataque bloqueado sem ponto"),
            spec("erro_ataque", -2.0, "Ataque fora ou na rede"),
        ],
    );
    table.insert(
        "bloqueio".to_string(),
        vec![
            spec("ponto_bloqueio", 3.0, "Bloqueio convertido em ponto"),
            spec("bloqueio_amortecido", 1.0, "Bloqueio que amortece para a defesa"),
            spec("bloqueio_explorado", -1.0, "Atacante usa o bloqueio"),
            spec("erro_bloqueio", -2.0, "Toque na rede ou invasão"),
        ],
    );
    table.insert(
        "defesa".to_string(),
        vec![
            spec("defesa_perfeita", 3.0, "Defesa que permite contra-ataque"),
            spec("defesa_boa", 1.0, "Bola mantida em jogo"),
            spec("erro_defesa", -2.0, "Bola não recuperada"),
        ],
    );
    table
}

/// Validated `fundamento → event types` table. Each `(fundamento, event_type)`
/// pair resolves to exactly one weight.
#[derive(Debug, Clone)]
pub struct SkillEventConfig {
    entries: HashMap<Fundamento, Vec<EventTypeSpec>>,
    weights: HashMap<(Fundamento, EventType), f64>,
}

impl SkillEventConfig {
    pub fn from_table(table: &BTreeMap<String, Vec<EventTypeSpec>>) -> Result<Self> {
        let mut entries: HashMap<Fundamento, Vec<EventTypeSpec>> = HashMap::new();
        let mut weights = HashMap::new();

        for (raw_fundamento, specs) in table {
            let fundamento = Fundamento::parse(raw_fundamento)?;
            if entries.contains_key(&fundamento) {
                return Err(RankingError::Configuration(format!(
                    "fundamento '{raw_fundamento}' is configured twice (alias of {fundamento})"
                )));
            }
            for spec in specs {
                if !spec.weight.is_finite() {
                    return Err(RankingError::Configuration(format!(
                        "weight of {fundamento}/{} is not a finite number",
                        spec.event_type
                    )));
                }
                let key = (fundamento, spec.event_type.clone());
                if weights.insert(key, spec.weight).is_some() {
                    return Err(RankingError::Configuration(format!(
                        "event type '{}' is configured twice for {fundamento}",
                        spec.event_type
                    )));
                }
            }
            entries.insert(fundamento, specs.clone());
        }

        Ok(Self { entries, weights })
    }

    pub fn resolve_weight(&self, fundamento: Fundamento, event_type: &EventType) -> Result<f64> {
        self.weights
            .get(&(fundamento, event_type.clone()))
            .copied()
            .ok_or_else(|| RankingError::UnknownEventType {
                fundamento,
                event_type: event_type.to_string(),
            })
    }

    pub fn event_types(&self, fundamento: Fundamento) -> &[EventTypeSpec] {
        self.entries
            .get(&fundamento)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub skills: SkillEventConfig,
    pub profiles: WeightProfiles,
    pub scale: QualitativeScale,
    pub min_sample: u32,
    pub request_timeout: Duration,
    pub max_sync_attempts: u32,
}

impl EngineConfig {
    pub fn from_raw(raw: &RawEngineConfig) -> Result<Self> {
        let skills = SkillEventConfig::from_table(&raw.skills)?;
        WeightProfile::new(
            raw.profiles.overall.quantitative,
            raw.profiles.overall.qualitative,
        )?;
        WeightProfile::new(
            raw.profiles.per_fundamento.quantitative,
            raw.profiles.per_fundamento.qualitative,
        )?;
        raw.scale.validate()?;
        if raw.request_timeout_ms == 0 {
            return Err(RankingError::Configuration(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            skills,
            profiles: raw.profiles,
            scale: raw.scale,
            min_sample: raw.min_sample,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
            max_sync_attempts: raw.max_sync_attempts,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let raw: RawEngineConfig = serde_json::from_str(&contents)?;
        Self::from_raw(&raw)
    }

    /// Configuration used when no `--config` file is given.
    pub fn builtin() -> Result<Self> {
        Self::from_raw(&RawEngineConfig::default())
    }
}
