use thiserror::Error;

use crate::fundamento::Fundamento;

#[derive(Error, Debug)]
pub enum RankingError {
    #[error("unknown event type '{event_type}' for fundamento {fundamento}")]
    UnknownEventType {
        fundamento: Fundamento,
        event_type: String,
    },

    #[error("unknown fundamento: {0}")]
    UnknownFundamento(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("unparsable date '{0}'")]
    DateParse(String),

    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("offline queue error: {0}")]
    Queue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RankingError {
    /// Configuration-class failures are rejected at the write boundary.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RankingError::UnknownEventType { .. }
                | RankingError::UnknownFundamento(_)
                | RankingError::Configuration(_)
        )
    }

    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, RankingError::RemoteUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, RankingError>;
