use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::transaction::round_to_cents;
use crate::domain::{
    AccountId, AlertId, FraudAlert, RuleId, Transaction, TransactionId, TransactionStatus,
};

use super::traits::{HistoryLookup, Storage, TransactionStats};

/// PostgreSQL implementation of the Storage trait.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Create a new PostgresStorage instance with a connection pool.
    pub async fn connect(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn transaction_from_row(row: &PgRow) -> anyhow::Result<Transaction> {
    let status: String = row.try_get("status")?;
    let status = TransactionStatus::from_str(&status)
        .ok_or_else(|| anyhow!("unknown transaction status '{status}'"))?;

    Ok(Transaction {
        id: TransactionId(row.try_get("id")?),
        from_account: AccountId::new(row.try_get::<String, _>("from_account")?),
        to_account: AccountId::new(row.try_get::<String, _>("to_account")?),
        amount: row.try_get("amount")?,
        description: row.try_get("description")?,
        status,
        created_at: row.try_get("created_at")?,
    })
}

fn alert_from_row(row: &PgRow) -> anyhow::Result<FraudAlert> {
    let rule: String = row.try_get("rule_triggered")?;
    let rule = RuleId::from_str(&rule).ok_or_else(|| anyhow!("unknown fraud rule '{rule}'"))?;
    let risk_score: i32 = row.try_get("risk_score")?;

    Ok(FraudAlert::restore(
        AlertId(row.try_get("id")?),
        TransactionId(row.try_get("transaction_id")?),
        rule,
        u32::try_from(risk_score).context("negative risk score")?,
        row.try_get("details")?,
        row.try_get("created_at")?,
    ))
}

#[async_trait]
impl HistoryLookup for PostgresStorage {
    async fn count_from_account_since(
        &self,
        account: &AccountId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: TransactionId,
    ) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE from_account = $1
              AND created_at > $2
              AND created_at < $3
              AND id <> $4
            "#,
        )
        .bind(account.as_str())
        .bind(since)
        .bind(until)
        .bind(exclude.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn find_matching_since(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: TransactionId,
    ) -> anyhow::Result<Option<TransactionId>> {
        // amount column is NUMERIC(15, 2), so equality is at cent precision
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM transactions
            WHERE from_account = $1
              AND to_account = $2
              AND amount = $3
              AND created_at > $4
              AND created_at < $5
              AND id <> $6
            LIMIT 1
            "#,
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(round_to_cents(amount))
        .bind(since)
        .bind(until)
        .bind(exclude.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(TransactionId))
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    fn history(&self) -> &dyn HistoryLookup {
        self
    }

    async fn insert_transaction(&self, tx: &Transaction) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, from_account, to_account, amount, description, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tx.id.0)
        .bind(tx.from_account.as_str())
        .bind(tx.to_account.as_str())
        .bind(tx.amount)
        .bind(&tx.description)
        .bind(tx.status.as_str())
        .bind(tx.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> anyhow::Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, from_account, to_account, amount, description, status, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn list_transactions(&self, limit: usize) -> anyhow::Result<Vec<Transaction>> {
        sqlx::query(
            r#"
            SELECT id, from_account, to_account, amount, description, status, created_at
            FROM transactions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(transaction_from_row)
        .collect()
    }

    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2
            WHERE id = $1
              AND status <> 'failed'
            "#,
        )
        .bind(id.0)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_alerts(&self, alerts: &[FraudAlert]) -> anyhow::Result<()> {
        if alerts.is_empty() {
            return Ok(());
        }

        // One batch per transaction: either every alert lands or none do
        let mut tx = self.pool.begin().await?;

        for alert in alerts {
            sqlx::query(
                r#"
                INSERT INTO fraud_alerts (id, transaction_id, rule_triggered, risk_score, severity, details, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(alert.id().0)
            .bind(alert.transaction_id().0)
            .bind(alert.rule().as_str())
            .bind(i32::try_from(alert.risk_score()).unwrap_or(i32::MAX))
            .bind(alert.severity().as_str())
            .bind(alert.details())
            .bind(alert.created_at())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn alerts_for_transaction(&self, id: TransactionId) -> anyhow::Result<Vec<FraudAlert>> {
        sqlx::query(
            r#"
            SELECT id, transaction_id, rule_triggered, risk_score, details, created_at
            FROM fraud_alerts
            WHERE transaction_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(alert_from_row)
        .collect()
    }

    async fn list_alerts(&self, limit: usize) -> anyhow::Result<Vec<FraudAlert>> {
        sqlx::query(
            r#"
            SELECT id, transaction_id, rule_triggered, risk_score, details, created_at
            FROM fraud_alerts
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(alert_from_row)
        .collect()
    }

    async fn stats(&self) -> anyhow::Result<TransactionStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE status = 'success'), 0) AS revenue,
                COUNT(*) AS transactions,
                COUNT(*) FILTER (WHERE status = 'success') AS successful,
                COUNT(*) FILTER (WHERE status = 'blocked') AS blocked
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let alerts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fraud_alerts")
            .fetch_one(&self.pool)
            .await?;

        Ok(TransactionStats {
            revenue: row.try_get("revenue")?,
            transactions: row.try_get::<i64, _>("transactions")? as u64,
            successful: row.try_get::<i64, _>("successful")? as u64,
            blocked: row.try_get::<i64, _>("blocked")? as u64,
            alerts: alerts as u64,
        })
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
