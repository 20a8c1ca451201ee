//! Number persistence on sqlx with a cache-aside read path.

use crate::cache::NumberCache;
use crate::error::StoreError;
use crate::types::*;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const COLUMNS: &str = "id, customer_id, number, type, call_flow_id, message_flow_id, name, detail, \
     provider_name, provider_reference_id, status, t38_enabled, emergency_enabled, \
     tm_purchase, tm_renew, tm_create, tm_update, tm_delete";

/// Largest page a scan returns.
const MAX_PAGE_SIZE: u64 = 1000;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS numbers (
        id                    TEXT PRIMARY KEY NOT NULL,
        customer_id           TEXT NOT NULL,
        number                TEXT NOT NULL,
        type                  TEXT NOT NULL DEFAULT 'normal',
        call_flow_id          TEXT NOT NULL,
        message_flow_id       TEXT NOT NULL,
        name                  TEXT NOT NULL DEFAULT '',
        detail                TEXT NOT NULL DEFAULT '',
        provider_name         TEXT NOT NULL DEFAULT 'none',
        provider_reference_id TEXT NOT NULL DEFAULT '',
        status                TEXT NOT NULL DEFAULT 'active',
        t38_enabled           INTEGER NOT NULL DEFAULT 0,
        emergency_enabled     INTEGER NOT NULL DEFAULT 0,
        tm_purchase           TEXT,
        tm_renew              TEXT,
        tm_create             TEXT NOT NULL,
        tm_update             TEXT,
        tm_delete             TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_numbers_number_active ON numbers (number) WHERE tm_delete IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_numbers_customer_id ON numbers (customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_numbers_call_flow_id ON numbers (call_flow_id)",
    "CREATE INDEX IF NOT EXISTS idx_numbers_message_flow_id ON numbers (message_flow_id)",
    "CREATE INDEX IF NOT EXISTS idx_numbers_tm_create ON numbers (tm_create)",
    "CREATE INDEX IF NOT EXISTS idx_numbers_tm_renew ON numbers (tm_renew)",
];

/// Open a sqlite pool. The database file is created when missing.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;

    info!("Connected to number database (max_connections={})", max_connections);
    Ok(pool)
}

/// Relational storage for numbers.
///
/// Single-record reads go through the cache; list and renewal scans
/// always hit the database. Every mutation re-reads the row and pushes
/// it into the cache.
#[derive(Clone)]
pub struct NumberDb {
    pool: SqlitePool,
    cache: Arc<dyn NumberCache>,
}

impl NumberDb {
    pub fn new(pool: SqlitePool, cache: Arc<dyn NumberCache>) -> Self {
        Self { pool, cache }
    }

    /// Create the `numbers` table and its indexes.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Number schema is up to date");
        Ok(())
    }

    /// Insert a new record stamped with the current time.
    pub async fn create(&self, number: &Number) -> Result<(), StoreError> {
        self.insert(number, Utc::now()).await
    }

    /// Insert a record. `tm_create` is set to `now`; normal numbers also get
    /// `tm_purchase` and `tm_renew` set to `now`, virtual numbers get neither.
    #[instrument(skip(self, number), fields(id = %number.id, number = %number.number))]
    pub(crate) async fn insert(&self, number: &Number, now: DateTime<Utc>) -> Result<(), StoreError> {
        let tm_now = format_time(&now);
        let (tm_purchase, tm_renew) = match number.number_type {
            NumberType::Normal => (Some(tm_now.clone()), Some(tm_now.clone())),
            NumberType::Virtual => (None, None),
        };

        sqlx::query(&format!(
            "INSERT INTO numbers ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)",
            COLUMNS
        ))
        .bind(number.id.to_string())
        .bind(number.customer_id.to_string())
        .bind(&number.number)
        .bind(number.number_type.as_str())
        .bind(number.call_flow_id.to_string())
        .bind(number.message_flow_id.to_string())
        .bind(&number.name)
        .bind(&number.detail)
        .bind(number.provider_name.as_str())
        .bind(&number.provider_reference_id)
        .bind(number.status.as_str())
        .bind(number.t38_enabled)
        .bind(number.emergency_enabled)
        .bind(tm_purchase)
        .bind(tm_renew)
        .bind(&tm_now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::AlreadyExists(number.number.clone())
            }
            other => StoreError::Database(other),
        })?;

        info!("Created number {} ({})", number.number, number.id);
        self.refresh_cache(&number.id).await;
        Ok(())
    }

    /// Fetch a record by id, cache first.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &Uuid) -> Result<Number, StoreError> {
        match self.cache.get(id).await {
            Ok(Some(number)) => return Ok(number),
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for {}: {}", id, e),
        }

        let number = self.get_from_db(id).await?;
        self.set_cache(&number).await;
        Ok(number)
    }

    /// Fetch the active record holding `number`, cache first.
    #[instrument(skip(self))]
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Number>, StoreError> {
        match self.cache.get_by_number(number).await {
            Ok(Some(cached)) if !cached.is_deleted() => return Ok(Some(cached)),
            Ok(_) => {}
            Err(e) => warn!("Cache read failed for {}: {}", number, e),
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM numbers WHERE number = ? AND tm_delete IS NULL",
            COLUMNS
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let found = number_from_row(&row)?;
                self.set_cache(&found).await;
                Ok(Some(found))
            }
            None => Ok(None),
        }
    }

    /// One page of records created before `token`, newest first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        size: u64,
        token: &str,
        filter: &NumberFilter,
    ) -> Result<Vec<Number>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM numbers WHERE tm_create < ", COLUMNS));
        query.push_bind(token.to_string());
        push_filter(&mut query, filter);
        query.push(" ORDER BY tm_create DESC LIMIT ");
        query.push_bind(page_limit(size));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(number_from_row).collect()
    }

    /// One page of records whose `tm_renew` is older than `cutoff`.
    #[instrument(skip(self))]
    pub async fn get_by_tm_renew(
        &self,
        cutoff: &DateTime<Utc>,
        size: u64,
        filter: &NumberFilter,
    ) -> Result<Vec<Number>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM numbers WHERE tm_renew < ", COLUMNS));
        query.push_bind(format_time(cutoff));
        push_filter(&mut query, filter);
        query.push(" ORDER BY tm_create DESC LIMIT ");
        query.push_bind(page_limit(size));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(number_from_row).collect()
    }

    /// Apply a partial update. An empty patch does nothing.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &Uuid, patch: &NumberPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE numbers SET ");
        {
            let mut set = query.separated(", ");
            for (field, value) in patch.values() {
                if !field.is_updatable() {
                    return Err(StoreError::InvalidData(format!(
                        "field is not updatable: {}",
                        field
                    )));
                }
                set.push(format!("{} = ", field.as_str()));
                set.push_bind_unseparated(value);
            }
            set.push("tm_update = ");
            set.push_bind_unseparated(format_time(&Utc::now()));
        }
        query.push(" WHERE id = ");
        query.push_bind(id.to_string());

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        debug!("Updated number {} ({:?})", id, patch.fields());
        self.refresh_cache(id).await;
        Ok(())
    }

    /// Soft delete. Fails with `NotFound` when there is no live row.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &Uuid) -> Result<(), StoreError> {
        let now = format_time(&Utc::now());
        let result = sqlx::query(
            "UPDATE numbers SET status = ?, tm_update = ?, tm_delete = ? WHERE id = ? AND tm_delete IS NULL",
        )
        .bind(NumberStatus::Deleted.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        info!("Deleted number {}", id);
        self.refresh_cache(id).await;
        Ok(())
    }

    /// Return the subset of `candidates` held by live records.
    #[instrument(skip(self, candidates), fields(count = candidates.len()))]
    pub async fn get_existing_numbers(&self, candidates: &[String]) -> Result<Vec<String>, StoreError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT number FROM numbers WHERE tm_delete IS NULL AND number IN (");
        {
            let mut list = query.separated(", ");
            for candidate in candidates {
                list.push_bind(candidate.clone());
            }
        }
        query.push(")");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("number").map_err(StoreError::from))
            .collect()
    }

    /// Live virtual numbers owned by a customer.
    #[instrument(skip(self))]
    pub async fn count_virtual_by_customer(&self, customer_id: &Uuid) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM numbers WHERE customer_id = ? AND type = ? AND tm_delete IS NULL",
        )
        .bind(customer_id.to_string())
        .bind(NumberType::Virtual.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn get_from_db(&self, id: &Uuid) -> Result<Number, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM numbers WHERE id = ?", COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        number_from_row(&row)
    }

    async fn set_cache(&self, number: &Number) {
        if let Err(e) = self.cache.set(number).await {
            warn!("Cache write failed for {}: {}", number.id, e);
        }
    }

    async fn refresh_cache(&self, id: &Uuid) {
        match self.get_from_db(id).await {
            Ok(number) => self.set_cache(&number).await,
            Err(e) => warn!("Could not refresh cache for {}: {}", id, e),
        }
    }
}

/// Page sizes beyond `MAX_PAGE_SIZE` are clamped; a negative LIMIT would
/// mean "no limit" to sqlite.
fn page_limit(size: u64) -> i64 {
    size.min(MAX_PAGE_SIZE) as i64
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &NumberFilter) {
    if let Some(customer_id) = filter.customer_id {
        query.push(" AND customer_id = ");
        query.push_bind(customer_id.to_string());
    }
    if let Some(number) = &filter.number {
        query.push(" AND number = ");
        query.push_bind(number.clone());
    }
    if let Some(number_type) = filter.number_type {
        query.push(" AND type = ");
        query.push_bind(number_type.as_str());
    }
    if let Some(call_flow_id) = filter.call_flow_id {
        query.push(" AND call_flow_id = ");
        query.push_bind(call_flow_id.to_string());
    }
    if let Some(message_flow_id) = filter.message_flow_id {
        query.push(" AND message_flow_id = ");
        query.push_bind(message_flow_id.to_string());
    }
    if let Some(provider_name) = filter.provider_name {
        query.push(" AND provider_name = ");
        query.push_bind(provider_name.as_str());
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ");
        query.push_bind(status.as_str());
    }
    match filter.deleted {
        Some(true) => {
            query.push(" AND tm_delete IS NOT NULL");
        }
        Some(false) => {
            query.push(" AND tm_delete IS NULL");
        }
        None => {}
    }
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, StoreError> {
    let value: String = row.try_get(column)?;
    Ok(Uuid::parse_str(&value)?)
}

fn parse_optional_time(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_time).transpose()
}

fn number_from_row(row: &SqliteRow) -> Result<Number, StoreError> {
    Ok(Number {
        id: parse_uuid(row, "id")?,
        customer_id: parse_uuid(row, "customer_id")?,
        number: row.try_get("number")?,
        number_type: row.try_get::<String, _>("type")?.parse()?,
        call_flow_id: parse_uuid(row, "call_flow_id")?,
        message_flow_id: parse_uuid(row, "message_flow_id")?,
        name: row.try_get("name")?,
        detail: row.try_get("detail")?,
        provider_name: row.try_get::<String, _>("provider_name")?.parse()?,
        provider_reference_id: row.try_get("provider_reference_id")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        t38_enabled: row.try_get("t38_enabled")?,
        emergency_enabled: row.try_get("emergency_enabled")?,
        tm_purchase: parse_optional_time(row, "tm_purchase")?,
        tm_renew: parse_optional_time(row, "tm_renew")?,
        tm_create: parse_optional_time(row, "tm_create")?,
        tm_update: parse_optional_time(row, "tm_update")?,
        tm_delete: parse_optional_time(row, "tm_delete")?,
    })
}
