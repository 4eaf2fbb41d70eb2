use std::path::Path;
use std::str::FromStr;

use aquatrace_core::{
    Farm, FarmId, HistoricalReading, Reading, ReadingId, RiskLevel, ThresholdSet,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow, SqliteSynchronous};
use sqlx::{Error as SqlxError, Row, SqlitePool};
use thiserror::Error;
use ulid::Ulid;

use super::{FarmRegistry, ReadingRegistry};

#[derive(Debug, Error)]
pub enum SqliteStorageError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] SqlxError),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("invalid ulid: {0}")]
    InvalidUlid(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
    #[error("invalid risk level: {0}")]
    InvalidRiskLevel(String),
}

#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, SqliteStorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let pool = SqlitePool::connect_with(options).await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteStorageError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}

fn parse_ulid(s: &str) -> Result<Ulid, SqliteStorageError> {
    Ulid::from_str(s).map_err(|_| SqliteStorageError::InvalidUlid(s.to_string()))
}

fn parse_timestamp(micros: i64) -> Result<jiff::Timestamp, SqliteStorageError> {
    jiff::Timestamp::from_microsecond(micros)
        .map_err(|_| SqliteStorageError::InvalidTimestamp(micros))
}

fn farm_from_row(row: &SqliteRow) -> Result<Farm, SqliteStorageError> {
    let id = parse_ulid(&row.try_get::<String, _>("id")?)?;

    Ok(Farm {
        id: FarmId(id),
        name: row.try_get::<String, _>("name")?.into(),
        owner_phone: row.try_get::<Option<String>, _>("owner_phone")?.map(Into::into),
        species: row.try_get::<Option<String>, _>("species")?.map(Into::into),
        location: row.try_get::<Option<String>, _>("location")?.map(Into::into),
        pond_size_m3: row.try_get("pond_size_m3")?,
        thresholds: ThresholdSet {
            temp_min: row.try_get("temp_min")?,
            temp_max: row.try_get("temp_max")?,
            oxygen_min: row.try_get("oxygen_min")?,
            ammonia_max: row.try_get("ammonia_max")?,
            turbidity_max: row.try_get("turbidity_max")?,
        },
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}

fn reading_from_row(row: &SqliteRow) -> Result<HistoricalReading, SqliteStorageError> {
    let id = parse_ulid(&row.try_get::<String, _>("id")?)?;
    let farm_id = parse_ulid(&row.try_get::<String, _>("farm_id")?)?;
    let risk_level: String = row.try_get("risk_level")?;
    let risk = RiskLevel::parse(&risk_level)
        .ok_or(SqliteStorageError::InvalidRiskLevel(risk_level))?;

    Ok(HistoricalReading {
        id: ReadingId(id),
        farm_id: FarmId(farm_id),
        reading: Reading {
            temperature: row.try_get("temperature")?,
            oxygen: row.try_get("oxygen")?,
            ph: row.try_get("ph")?,
            ammonia: row.try_get("ammonia")?,
            turbidity: row.try_get("turbidity")?,
            timestamp: parse_timestamp(row.try_get("recorded_at")?)?,
            error: row.try_get::<Option<String>, _>("source_error")?.map(Into::into),
        },
        risk,
    })
}

#[async_trait]
impl FarmRegistry for SqliteStorage {
    type Error = SqliteStorageError;

    async fn register(&self, farm: Farm) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO farms (
                id, name, owner_phone, species, location, pond_size_m3,
                temp_min, temp_max, oxygen_min, ammonia_max, turbidity_max, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                owner_phone = excluded.owner_phone,
                species = excluded.species,
                location = excluded.location,
                pond_size_m3 = excluded.pond_size_m3,
                temp_min = excluded.temp_min,
                temp_max = excluded.temp_max,
                oxygen_min = excluded.oxygen_min,
                ammonia_max = excluded.ammonia_max,
                turbidity_max = excluded.turbidity_max
            "#,
        )
        .bind(farm.id.0.to_string())
        .bind(&*farm.name)
        .bind(farm.owner_phone.as_deref())
        .bind(farm.species.as_deref())
        .bind(farm.location.as_deref())
        .bind(farm.pond_size_m3)
        .bind(farm.thresholds.temp_min)
        .bind(farm.thresholds.temp_max)
        .bind(farm.thresholds.oxygen_min)
        .bind(farm.thresholds.ammonia_max)
        .bind(farm.thresholds.turbidity_max)
        .bind(farm.created_at.as_microsecond())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: FarmId) -> Result<Option<Farm>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, owner_phone, species, location, pond_size_m3,
                   temp_min, temp_max, oxygen_min, ammonia_max, turbidity_max, created_at
            FROM farms
            WHERE id = ?
            "#,
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(farm_from_row).transpose()
    }
}

#[async_trait]
impl ReadingRegistry for SqliteStorage {
    type Error = SqliteStorageError;

    async fn store(&self, reading: HistoricalReading) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO sensor_readings (
                id, farm_id, temperature, oxygen, ph, ammonia, turbidity,
                risk_level, source_error, recorded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reading.id.0.to_string())
        .bind(reading.farm_id.0.to_string())
        .bind(reading.reading.temperature)
        .bind(reading.reading.oxygen)
        .bind(reading.reading.ph)
        .bind(reading.reading.ammonia)
        .bind(reading.reading.turbidity)
        .bind(reading.risk.as_str())
        .bind(reading.reading.error.as_deref())
        .bind(reading.reading.timestamp.as_microsecond())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest(&self, farm_id: FarmId) -> Result<Option<HistoricalReading>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, farm_id, temperature, oxygen, ph, ammonia, turbidity,
                   risk_level, source_error, recorded_at
            FROM sensor_readings
            WHERE farm_id = ?
            ORDER BY recorded_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(farm_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(reading_from_row).transpose()
    }

    async fn list_recent(
        &self,
        farm_id: FarmId,
        limit: usize,
    ) -> Result<Vec<HistoricalReading>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, farm_id, temperature, oxygen, ph, ammonia, turbidity,
                   risk_level, source_error, recorded_at
            FROM sensor_readings
            WHERE farm_id = ?
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(farm_id.0.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reading_from_row).collect()
    }
}
