//! Canonical skill names and event-type keys.
//!
//! Every boundary that reads a fundamento name from outside the crate
//! (CLI, CSV, database rows, tally collaborators) goes through
//! [`Fundamento::parse`]. Reception is stored under two historical names,
//! `passe` and `recepção` (also written `recepcao`); all resolve to
//! [`Fundamento::Passe`] and [`Fundamento::storage_keys`] lists every
//! normalized raw key a query has to check.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RankingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Fundamento {
    Saque,
    Passe,
    Levantamento,
    Ataque,
    Bloqueio,
    Defesa,
}

impl Fundamento {
    pub const ALL: [Fundamento; 6] = [
        Fundamento::Saque,
        Fundamento::Passe,
        Fundamento::Levantamento,
        Fundamento::Ataque,
        Fundamento::Bloqueio,
        Fundamento::Defesa,
    ];

    pub fn parse(raw: &str) -> Result<Self> {
        match normalize_key(raw).as_str() {
            "saque" => Ok(Fundamento::Saque),
            "passe" | "recepção" | "recepcao" => Ok(Fundamento::Passe),
            "levantamento" => Ok(Fundamento::Levantamento),
            "ataque" => Ok(Fundamento::Ataque),
            "bloqueio" => Ok(Fundamento::Bloqueio),
            "defesa" => Ok(Fundamento::Defesa),
            _ => Err(RankingError::UnknownFundamento(raw.to_string())),
        }
    }

    /// Name written to storage for new records.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Fundamento::Saque => "saque",
            Fundamento::Passe => "passe",
            Fundamento::Levantamento => "levantamento",
            Fundamento::Ataque => "ataque",
            Fundamento::Bloqueio => "bloqueio",
            Fundamento::Defesa => "defesa",
        }
    }

    /// Raw keys that hold data for this skill, in merge precedence order.
    pub fn storage_keys(self) -> &'static [&'static str] {
        match self {
            Fundamento::Passe => &["passe", "recepção", "recepcao"],
            Fundamento::Saque => &["saque"],
            Fundamento::Levantamento => &["levantamento"],
            Fundamento::Ataque => &["ataque"],
            Fundamento::Bloqueio => &["bloqueio"],
            Fundamento::Defesa => &["defesa"],
        }
    }

    /// Merge precedence of a raw key; lower wins. Both spellings of
    /// `recepção` share one bucket.
    pub fn key_precedence(self, raw: &str) -> usize {
        match normalize_key(raw).as_str() {
            key if key == self.canonical_name() => 0,
            "recepção" | "recepcao" if self == Fundamento::Passe => 1,
            _ => usize::MAX,
        }
    }
}

/// Trimmed, lowercased form of a raw fundamento key, as compared against
/// [`Fundamento::storage_keys`].
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl fmt::Display for Fundamento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for Fundamento {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self> {
        Fundamento::parse(s)
    }
}

impl TryFrom<String> for Fundamento {
    type Error = RankingError;

    fn try_from(value: String) -> Result<Self> {
        Fundamento::parse(&value)
    }
}

impl From<Fundamento> for String {
    fn from(value: Fundamento) -> Self {
        value.canonical_name().to_string()
    }
}

/// Configured event-type key, e.g. `ace` or `erro_saque`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    pub fn new(raw: &str) -> Result<Self> {
        let key = raw.trim().to_lowercase();
        if key.is_empty() {
            return Err(RankingError::Configuration(
                "event type must not be empty".to_string(),
            ));
        }
        if !key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(RankingError::Configuration(format!(
                "event type '{raw}' may only contain letters, digits, '_' or '-'"
            )));
        }
        Ok(EventType(key))
    }

    /// Keys of the built-in table, already lowercase identifiers.
    pub(crate) fn builtin(key: &str) -> Self {
        EventType(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EventType {
    type Error = RankingError;

    fn try_from(value: String) -> Result<Self> {
        EventType::new(&value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.0
    }
}
