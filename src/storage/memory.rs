use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::transaction::round_to_cents;
use crate::domain::{AccountId, FraudAlert, Transaction, TransactionId, TransactionStatus};

use super::traits::{HistoryLookup, Storage, TransactionStats};

/// Rows in insertion order plus a position index by id.
#[derive(Debug, Default)]
struct TransactionTable {
    rows: Vec<Transaction>,
    by_id: HashMap<TransactionId, usize>,
}

impl TransactionTable {
    fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.by_id.get(&id).map(|&pos| &self.rows[pos])
    }

    fn get_mut(&mut self, id: TransactionId) -> Option<&mut Transaction> {
        self.by_id.get(&id).map(|&pos| &mut self.rows[pos])
    }

    fn contains(&self, id: TransactionId) -> bool {
        self.by_id.contains_key(&id)
    }

    fn insert(&mut self, tx: Transaction) -> bool {
        if self.contains(tx.id) {
            return false;
        }
        self.by_id.insert(tx.id, self.rows.len());
        self.rows.push(tx);
        true
    }

    fn window<'a>(
        &'a self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: TransactionId,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.rows
            .iter()
            .filter(move |tx| tx.id != exclude && tx.created_at > since && tx.created_at < until)
    }
}

/// In-process storage.
///
/// Used when no database is configured and in tests. Rows are kept in
/// insertion order; listings return newest first.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    transactions: RwLock<TransactionTable>,
    alerts: RwLock<Vec<FraudAlert>>,
    fail_lookups: AtomicBool,
    fail_writes: AtomicBool,
    fail_status_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make history lookups return errors (for testing).
    pub fn set_lookup_failure(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::Relaxed);
    }

    /// Make alert and status writes return errors (for testing).
    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make only status writes return errors (for testing).
    pub fn set_status_write_failure(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::Relaxed);
    }

    /// Number of stored alerts (for assertions).
    pub fn alert_count(&self) -> usize {
        self.alerts.read().len()
    }

    fn check_lookup(&self) -> anyhow::Result<()> {
        if self.fail_lookups.load(Ordering::Relaxed) {
            bail!("history lookup unavailable");
        }
        Ok(())
    }

    fn check_write(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            bail!("storage write unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryLookup for MemoryStorage {
    async fn count_from_account_since(
        &self,
        account: &AccountId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: TransactionId,
    ) -> anyhow::Result<u64> {
        self.check_lookup()?;

        let count = self
            .transactions
            .read()
            .window(since, until, exclude)
            .filter(|tx| &tx.from_account == account)
            .count();

        Ok(count as u64)
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
        self.check_lookup()?;

        let amount = round_to_cents(amount);
        let found = self
            .transactions
            .read()
            .window(since, until, exclude)
            .find(|tx| {
                &tx.from_account == from
                    && &tx.to_account == to
                    && round_to_cents(tx.amount) == amount
            })
            .map(|tx| tx.id);

        Ok(found)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn history(&self) -> &dyn HistoryLookup {
        self
    }

    async fn insert_transaction(&self, tx: &Transaction) -> anyhow::Result<()> {
        if !self.transactions.write().insert(tx.clone()) {
            bail!("transaction {} already exists", tx.id);
        }
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> anyhow::Result<Option<Transaction>> {
        Ok(self.transactions.read().get(id).cloned())
    }

    async fn list_transactions(&self, limit: usize) -> anyhow::Result<Vec<Transaction>> {
        let mut transactions = self.transactions.read().rows.clone();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions.truncate(limit);
        Ok(transactions)
    }

    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> anyhow::Result<bool> {
        self.check_write()?;
        if self.fail_status_writes.load(Ordering::Relaxed) {
            bail!("status write unavailable");
        }

        let mut transactions = self.transactions.write();
        match transactions.get_mut(id) {
            Some(tx) if tx.status != TransactionStatus::Failed => {
                tx.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_alerts(&self, alerts: &[FraudAlert]) -> anyhow::Result<()> {
        self.check_write()?;

        {
            let transactions = self.transactions.read();
            for alert in alerts {
                if !transactions.contains(alert.transaction_id()) {
                    bail!(
                        "alert {} references unknown transaction {}",
                        alert.id(),
                        alert.transaction_id()
                    );
                }
            }
        }

        self.alerts.write().extend_from_slice(alerts);
        Ok(())
    }

    async fn alerts_for_transaction(&self, id: TransactionId) -> anyhow::Result<Vec<FraudAlert>> {
        Ok(self
            .alerts
            .read()
            .iter()
            .filter(|alert| alert.transaction_id() == id)
            .cloned()
            .collect())
    }

    async fn list_alerts(&self, limit: usize) -> anyhow::Result<Vec<FraudAlert>> {
        let mut alerts = self.alerts.read().clone();
        alerts.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn stats(&self) -> anyhow::Result<TransactionStats> {
        let transactions = self.transactions.read();
        let mut stats = TransactionStats {
            transactions: transactions.rows.len() as u64,
            alerts: self.alerts.read().len() as u64,
            ..Default::default()
        };

        for tx in transactions.rows.iter() {
            match tx.status {
                TransactionStatus::Success => {
                    stats.successful += 1;
                    stats.revenue = stats
                        .revenue
                        .checked_add(tx.amount)
                        .ok_or_else(|| anyhow!("revenue overflow"))?;
                }
                TransactionStatus::Blocked => stats.blocked += 1,
                _ => {}
            }
        }

        Ok(stats)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.check_lookup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RuleHit, RuleId};
    use chrono::Duration;

    fn tx(from: &str, to: &str, cents: i64) -> Transaction {
        Transaction::new(
            AccountId::new(from),
            AccountId::new(to),
            Decimal::new(cents, 2),
            "",
            TransactionStatus::Success,
        )
    }

    #[tokio::test]
    async fn test_count_excludes_self_and_old() {
        let storage = MemoryStorage::new();
        let now = Utc::now();

        let old = tx("A", "B", 100).with_created_at(now - Duration::seconds(120));
        let recent = tx("A", "C", 100).with_created_at(now - Duration::seconds(10));
        let other = tx("Z", "C", 100).with_created_at(now - Duration::seconds(10));
        let current = tx("A", "B", 100).with_created_at(now);

        for t in [&old, &recent, &other, &current] {
            storage.insert_transaction(t).await.unwrap();
        }

        let count = storage
            .count_from_account_since(
                &AccountId::new("A"),
                now - Duration::seconds(60),
                now,
                current.id,
            )
            .await
            .unwrap();

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_window_excludes_later_rows() {
        let storage = MemoryStorage::new();
        let now = Utc::now();

        let first = tx("A", "B", 100).with_created_at(now - Duration::seconds(30));
        let later = tx("A", "B", 100).with_created_at(now);
        storage.insert_transaction(&first).await.unwrap();
        storage.insert_transaction(&later).await.unwrap();

        let count = storage
            .count_from_account_since(
                &AccountId::new("A"),
                first.created_at - Duration::seconds(60),
                first.created_at,
                first.id,
            )
            .await
            .unwrap();
        assert_eq!(count, 0);

        let found = storage
            .find_matching_since(
                &AccountId::new("A"),
                &AccountId::new("B"),
                first.amount,
                first.created_at - Duration::minutes(5),
                first.created_at,
                first.id,
            )
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_find_matching_at_cent_precision() {
        let storage = MemoryStorage::new();
        let now = Utc::now();

        let earlier = tx("A", "B", 10000).with_created_at(now - Duration::seconds(30));
        storage.insert_transaction(&earlier).await.unwrap();

        let found = storage
            .find_matching_since(
                &AccountId::new("A"),
                &AccountId::new("B"),
                Decimal::new(100000, 3), // 100.000
                now - Duration::minutes(5),
                now,
                TransactionId::new(),
            )
            .await
            .unwrap();
        assert_eq!(found, Some(earlier.id));

        let missing = storage
            .find_matching_since(
                &AccountId::new("A"),
                &AccountId::new("B"),
                Decimal::new(10001, 2),
                now - Duration::minutes(5),
                now,
                TransactionId::new(),
            )
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_find_matching_distinguishes_huge_amounts() {
        let storage = MemoryStorage::new();
        let now = Utc::now();

        let earlier = Transaction::new(
            AccountId::new("A"),
            AccountId::new("B"),
            Decimal::from(10u64.pow(17)),
            "",
            TransactionStatus::Success,
        )
        .with_created_at(now - Duration::seconds(30));
        storage.insert_transaction(&earlier).await.unwrap();

        let found = storage
            .find_matching_since(
                &AccountId::new("A"),
                &AccountId::new("B"),
                Decimal::from(2 * 10u64.pow(17)),
                now - Duration::minutes(5),
                now,
                TransactionId::new(),
            )
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let storage = MemoryStorage::new();
        let first = tx("A", "B", 100);

        storage.insert_transaction(&first).await.unwrap();
        assert!(storage.insert_transaction(&first).await.is_err());

        let stored = storage.get_transaction(first.id).await.unwrap();
        assert_eq!(stored, Some(first));
        assert_eq!(storage.list_transactions(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_status_never_overrides_failed() {
        let storage = MemoryStorage::new();
        let mut failed = tx("A", "B", 100);
        failed.status = TransactionStatus::Failed;
        storage.insert_transaction(&failed).await.unwrap();

        let changed = storage
            .update_status(failed.id, TransactionStatus::Blocked)
            .await
            .unwrap();

        assert!(!changed);
        let stored = storage.get_transaction(failed.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_status_write_failure_switch() {
        let storage = MemoryStorage::new();
        let t = tx("A", "B", 100);
        storage.insert_transaction(&t).await.unwrap();
        storage.set_status_write_failure(true);

        assert!(storage
            .update_status(t.id, TransactionStatus::Blocked)
            .await
            .is_err());

        let alert = FraudAlert::from_hit(t.id, RuleHit::new(RuleId::HighAmount, 30, "x"));
        storage.record_alerts(&[alert]).await.unwrap();
        assert_eq!(storage.alert_count(), 1);
    }

    #[tokio::test]
    async fn test_record_alerts_requires_transaction() {
        let storage = MemoryStorage::new();
        let orphan = FraudAlert::from_hit(
            TransactionId::new(),
            RuleHit::new(RuleId::SuspiciousPattern, 25, "x"),
        );

        assert!(storage.record_alerts(&[orphan]).await.is_err());
        assert_eq!(storage.alert_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_switch() {
        let storage = MemoryStorage::new();
        storage.set_lookup_failure(true);

        let now = Utc::now();
        let result = storage
            .count_from_account_since(&AccountId::new("A"), now, now, TransactionId::new())
            .await;

        assert!(result.is_err());
        assert!(storage.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let storage = MemoryStorage::new();
        storage.insert_transaction(&tx("A", "B", 10000)).await.unwrap();
        storage.insert_transaction(&tx("A", "B", 2550)).await.unwrap();
        let mut blocked = tx("A", "B", 99900);
        blocked.status = TransactionStatus::Blocked;
        storage.insert_transaction(&blocked).await.unwrap();

        let stats = storage.stats().await.unwrap();

        assert_eq!(stats.transactions, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.revenue, Decimal::new(12550, 2));
    }

    #[tokio::test]
    async fn test_stats_revenue_overflow_is_an_error() {
        let storage = MemoryStorage::new();
        for _ in 0..2 {
            let huge = Transaction::new(
                AccountId::new("A"),
                AccountId::new("B"),
                Decimal::MAX,
                "",
                TransactionStatus::Success,
            );
            storage.insert_transaction(&huge).await.unwrap();
        }

        assert!(storage.stats().await.is_err());
    }
}
