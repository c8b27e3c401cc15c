use crate::config::DatabaseConfig;
use crate::domain::{CheckStatus, Service, ServiceStatus, StatusCheck};
use crate::error::{Context, Result};
use crate::store::StatusStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

const SERVICE_COLUMNS: &str = "id::BIGINT AS id, name, domain, slug, category, status, \
     response_time::BIGINT AS response_time, last_checked";

#[derive(Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let max_conn = config.max_connections.unwrap_or(5);
        let timeout = config.acquire_timeout_secs.unwrap_or(5);

        let pool = PgPoolOptions::new()
            .max_connections(max_conn)
            .acquire_timeout(Duration::from_secs(timeout))
            .connect(&config.url)
            .await
            .context("failed to connect to the status database")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn services_with_status(
        &self,
        domain: &str,
        status: ServiceStatus,
    ) -> Result<Vec<Service>> {
        let sql = format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE domain = $1 AND status = $2 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(domain)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to load `{status}` services for {domain}"))?;

        rows.iter().map(service_from_row).collect()
    }

    async fn update_cached_status(
        &self,
        service_id: i64,
        status: ServiceStatus,
        response_time: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let response_time = i64::try_from(response_time).unwrap_or(i64::MAX);
        sqlx::query(
            "UPDATE services SET status = $1, response_time = $2, last_checked = $3 WHERE id = $4",
        )
        .bind(status.as_str())
        .bind(response_time)
        .bind(checked_at)
        .bind(service_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update cached status of service {service_id}"))?;

        Ok(())
    }

    async fn delete_checks_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM status_checks WHERE checked_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("failed to delete expired status checks")?;

        Ok(result.rows_affected())
    }

    async fn service_by_slug(&self, slug: &str) -> Result<Option<Service>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE slug = $1");
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load service `{slug}`"))?;

        row.as_ref().map(service_from_row).transpose()
    }

    async fn checks_since(
        &self,
        service_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusCheck>> {
        let rows = sqlx::query(
            "SELECT id::BIGINT AS id, service_id::BIGINT AS service_id, status, \
             response_time::BIGINT AS response_time, status_code::INTEGER AS status_code, checked_at \
             FROM status_checks WHERE service_id = $1 AND checked_at >= $2 \
             ORDER BY checked_at ASC, id ASC",
        )
        .bind(service_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to load status checks for service {service_id}"))?;

        rows.iter().map(check_from_row).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;

        Ok(())
    }
}

fn service_from_row(row: &PgRow) -> Result<Service> {
    let status: Option<String> = row.try_get("status")?;
    let response_time: Option<i64> = row.try_get("response_time")?;

    Ok(Service {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        slug: row.try_get("slug")?,
        category: row.try_get("category")?,
        status: status
            .as_deref()
            .map(ServiceStatus::parse)
            .unwrap_or_default(),
        response_time: response_time.map(clamp_non_negative),
        last_checked: row.try_get("last_checked")?,
    })
}

fn check_from_row(row: &PgRow) -> Result<StatusCheck> {
    let raw_status: String = row.try_get("status")?;
    let status = CheckStatus::parse(&raw_status)
        .ok_or_else(|| crate::err!("unexpected status check value `{raw_status}`"))?;
    let response_time: i64 = row.try_get("response_time")?;
    let status_code: i32 = row.try_get("status_code")?;

    Ok(StatusCheck {
        id: row.try_get("id")?,
        service_id: row.try_get("service_id")?,
        status,
        response_time: clamp_non_negative(response_time),
        status_code: u16::try_from(status_code).unwrap_or(0),
        checked_at: row.try_get("checked_at")?,
    })
}

fn clamp_non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
