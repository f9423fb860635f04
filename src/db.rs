use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::dates::DateWindow;
use crate::error::{RankingError, Result};
use crate::fundamento::{EventType, Fundamento};
use crate::models::{Athlete, EventFilter, ExecutionTally, QualitativeEvent, Team};
use crate::repository::{EventStore, RosterSource, TallySource};

/// Connection-level failures mean the store is unreachable; everything else
/// is a genuine storage error.
pub fn classify_sqlx(err: sqlx::Error) -> RankingError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => RankingError::RemoteUnavailable(err.to_string()),
        other => RankingError::Storage(other),
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn athlete_from_row(row: &PgRow) -> Result<Athlete> {
    let team: String = row.try_get("team")?;
    Ok(Athlete {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        team: Team::parse(&team)?,
    })
}

fn event_from_row(row: &PgRow) -> Result<QualitativeEvent> {
    let id: Uuid = row.try_get("id")?;
    let fundamento: String = row.try_get("fundamento")?;
    let event_type: String = row.try_get("event_type")?;
    Ok(QualitativeEvent {
        id: Some(id.to_string()),
        athlete_id: row.try_get("athlete_id")?,
        training_id: row.try_get("training_id")?,
        fundamento: Fundamento::parse(&fundamento)?,
        event_type: EventType::new(&event_type)?,
        weight: row.try_get("weight")?,
        timestamp: row.try_get("occurred_at")?,
        notes: row.try_get("notes")?,
    })
}

#[async_trait]
impl RosterSource for PgStore {
    async fn athletes(&self, team: Option<Team>) -> Result<Vec<Athlete>> {
        let mut query =
            QueryBuilder::<Postgres>::new("SELECT id, name, team FROM fundamento_ranking.athletes");
        if let Some(team) = team {
            query.push(" WHERE team = ").push_bind(team.as_str());
        }
        query.push(" ORDER BY name, id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(classify_sqlx)?;
        rows.iter().map(athlete_from_row).collect()
    }

    async fn athlete(&self, id: Uuid) -> Result<Option<Athlete>> {
        let row = sqlx::query("SELECT id, name, team FROM fundamento_ranking.athletes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_sqlx)?;
        row.as_ref().map(athlete_from_row).transpose()
    }
}

// Both columns carry a `>= 0` check.
fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Matches every stored spelling of the fundamento, whatever its case.
fn push_fundamento_filter(query: &mut QueryBuilder<'_, Postgres>, fundamento: Fundamento) {
    let keys: Vec<String> = fundamento
        .storage_keys()
        .iter()
        .map(|key| key.to_string())
        .collect();
    query
        .push(" AND lower(btrim(fundamento)) = ANY(")
        .push_bind(keys)
        .push(")");
}

#[async_trait]
impl TallySource for PgStore {
    async fn tallies(&self, window: &DateWindow) -> Result<Vec<ExecutionTally>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT athlete_id, fundamento, SUM(hits)::BIGINT AS hits, SUM(misses)::BIGINT AS misses, \
             MAX(performed_on) AS last_date \
             FROM fundamento_ranking.executions WHERE TRUE",
        );
        if let Some(start) = window.start {
            query.push(" AND performed_on >= ").push_bind(start);
        }
        if let Some(end) = window.end {
            query.push(" AND performed_on <= ").push_bind(end);
        }
        query.push(" GROUP BY athlete_id, fundamento");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(classify_sqlx)?;

        let mut tallies = Vec::with_capacity(rows.len());
        for row in rows {
            let hits: i64 = row.try_get("hits")?;
            let misses: i64 = row.try_get("misses")?;
            let last_date: Option<NaiveDate> = row.try_get("last_date")?;
            tallies.push(ExecutionTally {
                athlete_id: row.try_get("athlete_id")?,
                fundamento: row.try_get("fundamento")?,
                hits: non_negative(hits),
                misses: non_negative(misses),
                last_date: last_date.map(|d| d.to_string()),
            });
        }
        Ok(tallies)
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn insert_event(&self, event: &QualitativeEvent) -> Result<String> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO fundamento_ranking.qualitative_events
            (id, athlete_id, training_id, fundamento, event_type, weight, occurred_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(event.athlete_id)
        .bind(event.training_id)
        .bind(event.fundamento.canonical_name())
        .bind(event.event_type.as_str())
        .bind(event.weight)
        .bind(event.timestamp)
        .bind(event.notes.as_deref())
        .execute(&self.pool)
        .await
        .map_err(classify_sqlx)?;

        Ok(id.to_string())
    }

    async fn delete_event(&self, id: &str) -> Result<bool> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM fundamento_ranking.qualitative_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<QualitativeEvent>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT id, athlete_id, training_id, fundamento, event_type, weight, occurred_at, notes \
             FROM fundamento_ranking.qualitative_events WHERE TRUE",
        );
        if let Some(athlete_id) = filter.athlete_id {
            query.push(" AND athlete_id = ").push_bind(athlete_id);
        }
        if let Some(training_id) = filter.training_id {
            query.push(" AND training_id = ").push_bind(training_id);
        }
        if let Some(fundamento) = filter.fundamento {
            push_fundamento_filter(&mut query, fundamento);
        }
        if let Some(event_type) = &filter.event_type {
            query.push(" AND event_type = ").push_bind(event_type.as_str().to_string());
        }
        if let Some(start) = filter.date_start {
            query
                .push(" AND (occurred_at AT TIME ZONE 'UTC')::date >= ")
                .push_bind(start);
        }
        if let Some(end) = filter.date_end {
            query
                .push(" AND (occurred_at AT TIME ZONE 'UTC')::date <= ")
                .push_bind(end);
        }
        query.push(" ORDER BY occurred_at, id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(classify_sqlx)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            match event_from_row(row) {
                Ok(event) => events.push(event),
                Err(err) if err.is_configuration() => {
                    tracing::warn!(%err, "skipping stored event with unknown fundamento or type");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(events)
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let athletes = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Ana Beatriz Souza",
            Team::Feminino,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Júlia Moreira",
            Team::Feminino,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Carla Pinheiro",
            Team::Feminino,
        ),
        (
            Uuid::parse_str("7b1e8f02-5c1d-4f0e-9a55-1b2f3c4d5e6f")?,
            "Rafael Lima",
            Team::Masculino,
        ),
    ];

    for (id, name, team) in &athletes {
        sqlx::query(
            r#"
            INSERT INTO fundamento_ranking.athletes (id, name, team)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, team = EXCLUDED.team
            "#,
        )
        .bind(*id)
        .bind(*name)
        .bind(team.as_str())
        .execute(pool)
        .await?;
    }

    let executions = vec![
        ("seed-exec-001", 0, "saque", 6, 2, (2026, 2, 2)),
        ("seed-exec-002", 1, "saque", 8, 2, (2026, 2, 2)),
        ("seed-exec-003", 2, "saque", 3, 0, (2026, 2, 3)),
        ("seed-exec-004", 0, "passe", 12, 4, (2026, 2, 3)),
        ("seed-exec-005", 1, "recepção", 9, 6, (2026, 2, 4)),
        ("seed-exec-006", 3, "ataque", 14, 5, (2026, 2, 4)),
    ];

    for (source_key, athlete, fundamento, hits, misses, (y, m, d)) in executions {
        let performed_on = NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| anyhow::anyhow!("invalid seed date {y}-{m}-{d}"))?;
        sqlx::query(
            r#"
            INSERT INTO fundamento_ranking.executions
            (id, athlete_id, fundamento, hits, misses, performed_on, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(athletes[athlete].0)
        .bind(fundamento)
        .bind(hits)
        .bind(misses)
        .bind(performed_on)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let events = vec![
        (
            "7f0c0a52-8f1e-4b7e-9a0e-000000000001",
            1,
            "saque",
            "ace",
            3.0,
            "Dois aces seguidos no treino coletivo",
        ),
        (
            "7f0c0a52-8f1e-4b7e-9a0e-000000000002",
            1,
            "saque",
            "saque_forcado",
            2.0,
            "Saque flutuante quebrou o passe",
        ),
        (
            "7f0c0a52-8f1e-4b7e-9a0e-000000000003",
            2,
            "saque",
            "ace",
            3.0,
            "Saque viagem com boa evolução",
        ),
        (
            "7f0c0a52-8f1e-4b7e-9a0e-000000000004",
            0,
            "passe",
            "passe_b",
            1.0,
            "Passe afastado da rede",
        ),
    ];

    let occurred_at = Utc
        .with_ymd_and_hms(2026, 2, 4, 19, 30, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid seed timestamp"))?;

    for (id, athlete, fundamento, event_type, weight, note) in events {
        sqlx::query(
            r#"
            INSERT INTO fundamento_ranking.qualitative_events
            (id, athlete_id, fundamento, event_type, weight, occurred_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(athletes[athlete].0)
        .bind(fundamento)
        .bind(event_type)
        .bind(weight)
        .bind(occurred_at)
        .bind(note)
        .execute(pool)
        .await?;
    }

    Ok(())
}
