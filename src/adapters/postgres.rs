use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Connection, Row};
use tracing::{debug, info, instrument};

use super::RecordStore;
use crate::codec::{self, NdArray};
use crate::config::DatabaseConfig;
use crate::domain::{InputRecord, NewInput, NewPrediction, PredictionRecord};
use crate::error::{LedgerError, Result};
use crate::retry::{retry_with_delay, RetryPolicy};

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Database names accepted by [`PostgresStore::ensure_database`].
///
/// `CREATE DATABASE` cannot take a bind parameter, so the name is spliced into
/// SQL and must be a plain identifier.
pub fn is_valid_database_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(options: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Tables created successfully");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Block until the server accepts connections, or give up per `policy`
    pub async fn wait_for_server(options: &PgConnectOptions, policy: RetryPolicy) -> Result<()> {
        retry_with_delay("database", policy, |_| async move {
            let conn = PgConnection::connect_with(options).await?;
            conn.close().await?;
            Ok::<(), LedgerError>(())
        })
        .await
    }

    /// Create database `name` through the maintenance connection `admin` if absent.
    ///
    /// Returns `true` when the database was created.
    pub async fn ensure_database(admin: &PgConnectOptions, name: &str) -> Result<bool> {
        if !is_valid_database_name(name) {
            return Err(LedgerError::Validation(format!(
                "refusing to create database with invalid name '{name}'"
            )));
        }

        let mut conn = PgConnection::connect_with(admin).await?;

        let exists = sqlx::query("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(name)
            .fetch_optional(&mut conn)
            .await?
            .is_some();

        if !exists {
            // Validated above; quoting keeps the exact case we checked for.
            sqlx::query(&format!("CREATE DATABASE \"{name}\""))
                .execute(&mut conn)
                .await?;
            info!("Database '{}' created successfully", name);
        } else {
            info!("Database '{}' already exists", name);
        }

        conn.close().await?;
        Ok(!exists)
    }

    /// Wait for the server, create the configured database if needed, connect and migrate
    pub async fn bootstrap(db: &DatabaseConfig, policy: RetryPolicy) -> Result<Self> {
        let admin = db.admin_connect_options();
        Self::wait_for_server(&admin, policy).await?;
        Self::ensure_database(&admin, &db.name).await?;

        let store = Self::new(db.connect_options(), db.max_connections).await?;
        store.migrate().await?;
        Ok(store)
    }

    fn input_from_row(row: &PgRow) -> Result<InputRecord> {
        let payload: Vec<u8> = row.get("image_data");
        let record = InputRecord {
            id: row.get("id"),
            image: codec::decode(&payload)?,
            image_shape: row.get("image_shape"),
            true_label: row.get("true_label"),
            created_at: row.get("created_at"),
        };
        record.verify_shape()?;
        Ok(record)
    }

    fn prediction_from_row(row: &PgRow) -> Result<PredictionRecord> {
        let payload: Vec<u8> = row.get("prediction_probabilities");
        let probabilities = codec::decode(&payload)?
            .into_f32()
            .ok_or_else(|| {
                LedgerError::Validation("prediction probabilities are not float32".to_string())
            })?
            .iter()
            .copied()
            .collect();

        Ok(PredictionRecord {
            id: row.get("id"),
            input_data_id: row.get("input_data_id"),
            predicted_label: row.get("predicted_label"),
            confidence: row.get("confidence"),
            probabilities,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    #[instrument(skip(self, input), fields(true_label = input.true_label))]
    async fn insert_input(&self, input: &NewInput) -> Result<i32> {
        let payload = codec::encode(&input.image)?;
        let shape = input.image_shape();

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO input_data (image_data, true_label, image_shape)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&payload)
        .bind(input.true_label)
        .bind(&shape)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let id: i32 = row.get("id");
        info!("Inserted image data with ID: {}", id);
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get_input(&self, id: i32) -> Result<InputRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, image_data, true_label, image_shape, created_at
            FROM input_data
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("input_data", id))?;

        let record = Self::input_from_row(&row)?;
        debug!("Retrieved image with shape: {}", record.image_shape);
        Ok(record)
    }

    #[instrument(skip(self, prediction), fields(input_data_id = prediction.input_data_id))]
    async fn insert_prediction(&self, prediction: &NewPrediction) -> Result<i32> {
        let probs = &prediction.prediction.probabilities;
        let payload = codec::encode(&NdArray::F32(
            ndarray::Array1::from_vec(probs.clone()).into_dyn(),
        ))?;

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO predictions
                (input_data_id, predicted_label, confidence, prediction_probabilities)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(prediction.input_data_id)
        .bind(prediction.prediction.label_i32())
        .bind(prediction.prediction.confidence)
        .bind(&payload)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let orphan = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION)
            );
            if orphan {
                LedgerError::not_found("input_data", prediction.input_data_id)
            } else {
                LedgerError::Database(e)
            }
        })?;
        tx.commit().await?;

        let id: i32 = row.get("id");
        info!("Inserted prediction with ID: {}", id);
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get_prediction(&self, id: i32) -> Result<PredictionRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, input_data_id, predicted_label, confidence,
                   prediction_probabilities, created_at
            FROM predictions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("predictions", id))?;

        Self::prediction_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn predictions_for_input(&self, input_id: i32) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, input_data_id, predicted_label, confidence,
                   prediction_probabilities, created_at
            FROM predictions
            WHERE input_data_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(input_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::prediction_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn delete_input(&self, id: i32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM input_data WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Deleted input data {} and its predictions", id);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
