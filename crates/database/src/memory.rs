//! 进程内存储
//!
//! 与MongoDB实现同样满足两个仓库Trait的原子性约定：
//! - 账户的读-改-写在 DashMap 分片锁内完成
//! - 邀请边以被邀请人为键，通过 entry API 条件插入

use crate::{
    account::{
        model::{Account, AccountMutation, MutationOutcome, UserId},
        repository::AccountRepositoryTrait,
    },
    referral::{
        model::{EdgeInsert, ReferralEdge},
        repository::ReferralRepositoryTrait,
    },
};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;
use utils::{AppError, AppResult};

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    accounts: DashMap<UserId, Account>,
    // referred_id -> edge
    edges: DashMap<UserId, ReferralEdge>,
    // referrer_id -> 按插入顺序排列的下级
    by_referrer: DashMap<UserId, Vec<ReferralEdge>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[async_trait]
impl AccountRepositoryTrait for MemoryDatabase {
    async fn get_or_create(&self, user_id: UserId) -> AppResult<Account> {
        let account = self
            .accounts
            .entry(user_id)
            .or_insert_with(|| Account::new(user_id))
            .view();

        Ok(account)
    }

    async fn get(&self, user_id: UserId) -> AppResult<Option<Account>> {
        Ok(self.accounts.get(&user_id).map(|account| account.view()))
    }

    async fn apply(&self, user_id: UserId, mutation: AccountMutation) -> AppResult<MutationOutcome> {
        let mut account = self
            .accounts
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("account {}", user_id)))?;

        if account.try_apply(&mutation) {
            Ok(MutationOutcome::Applied(account.view()))
        } else {
            Ok(MutationOutcome::Skipped(account.view()))
        }
    }

    async fn reset_claimed_flags(&self, today: NaiveDate) -> AppResult<u64> {
        let mut cleared = 0;
        for mut account in self.accounts.iter_mut() {
            if account.claimed_today && !account.has_redeemed_on(today) {
                account.claimed_today = false;
                cleared += 1;
            }
        }

        Ok(cleared)
    }
}

#[async_trait]
impl ReferralRepositoryTrait for MemoryDatabase {
    async fn try_create_edge(&self, referrer_id: UserId, referred_id: UserId, date: NaiveDate) -> AppResult<EdgeInsert> {
        match self.edges.entry(referred_id) {
            Entry::Occupied(existing) => {
                debug!("🔁 被邀请人已有邀请人: referred_id={}", referred_id);
                Ok(EdgeInsert::AlreadyExists(existing.get().clone()))
            }
            Entry::Vacant(slot) => {
                let edge = ReferralEdge::new(referrer_id, referred_id, date);
                // 持有 referred_id 的分片锁期间写入下级列表，两张表对外保持一致
                self.by_referrer.entry(referrer_id).or_default().push(edge.clone());
                slot.insert(edge.clone());
                Ok(EdgeInsert::Created(edge))
            }
        }
    }

    async fn list_edges_for_referrer(&self, referrer_id: UserId) -> AppResult<Vec<ReferralEdge>> {
        Ok(self
            .by_referrer
            .get(&referrer_id)
            .map(|edges| edges.clone())
            .unwrap_or_default())
    }

    async fn count_for_referrer(&self, referrer_id: UserId) -> AppResult<u64> {
        Ok(self.by_referrer.get(&referrer_id).map_or(0, |edges| edges.len() as u64))
    }

    async fn get_edge_for_referred(&self, referred_id: UserId) -> AppResult<Option<ReferralEdge>> {
        Ok(self.edges.get(&referred_id).map(|edge| edge.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = MemoryDatabase::new();

        let first = db.get_or_create(42).await.unwrap();
        let second = db.get_or_create(42).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.account_count(), 1);
        assert!(db.get(43).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_touch_creates_one_row() {
        let db = Arc::new(MemoryDatabase::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let db = db.clone();
            handles.push(tokio::spawn(async move { db.get_or_create(7).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(db.account_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_on_unknown_account_is_not_found() {
        let db = MemoryDatabase::new();

        let result = db.apply(1, AccountMutation::Debit { amount: 1 }).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(db.account_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_reports_skipped_with_current_state() {
        let db = MemoryDatabase::new();
        db.get_or_create(1).await.unwrap();

        let redeem = AccountMutation::Redeem { today: day(1), amount: 10 };
        let first = db.apply(1, redeem).await.unwrap();
        let second = db.apply(1, redeem).await.unwrap();

        assert!(first.is_applied());
        assert!(!second.is_applied());
        assert_eq!(second.account().balance, 10);
    }

    #[tokio::test]
    async fn test_returned_accounts_omit_credit_log() {
        let db = MemoryDatabase::new();
        db.get_or_create(1).await.unwrap();

        for referred_id in 2..12 {
            let outcome = db
                .apply(1, AccountMutation::CreditReferral { referred_id, bonus: 50 })
                .await
                .unwrap();
            assert!(outcome.is_applied());
            assert!(outcome.account().credited_referrals.is_empty());
        }

        // 快照里没有记录，守卫仍然按存储内的完整记录判定
        let replay = db
            .apply(1, AccountMutation::CreditReferral { referred_id: 5, bonus: 50 })
            .await
            .unwrap();
        assert!(!replay.is_applied());
        assert_eq!(replay.account().referral_count, 10);
        assert_eq!(replay.account().balance, 500);
        assert!(db.get(1).await.unwrap().unwrap().credited_referrals.is_empty());
    }

    #[tokio::test]
    async fn test_edge_is_unique_per_referred() {
        let db = MemoryDatabase::new();

        let first = db.try_create_edge(1, 2, day(1)).await.unwrap();
        let second = db.try_create_edge(3, 2, day(2)).await.unwrap();

        assert!(matches!(first, EdgeInsert::Created(_)));
        match second {
            EdgeInsert::AlreadyExists(edge) => {
                assert_eq!(edge.referrer_id, 1);
                assert_eq!(edge.date, day(1));
            }
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(db.edge_count(), 1);
        assert_eq!(db.count_for_referrer(3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_edges_keeps_creation_order() {
        let db = MemoryDatabase::new();
        for (referred, d) in [(10, 3), (11, 1), (12, 2)] {
            db.try_create_edge(1, referred, day(d)).await.unwrap();
        }

        let referred: Vec<UserId> = db
            .list_edges_for_referrer(1)
            .await
            .unwrap()
            .into_iter()
            .map(|edge| edge.referred_id)
            .collect();

        assert_eq!(referred, vec![10, 11, 12]);
        assert_eq!(db.count_for_referrer(1).await.unwrap(), 3);
        assert!(db.list_edges_for_referrer(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_claimed_flags_keeps_today() {
        let db = MemoryDatabase::new();
        for user in [1, 2] {
            db.get_or_create(user).await.unwrap();
        }
        db.apply(1, AccountMutation::Redeem { today: day(1), amount: 10 }).await.unwrap();
        db.apply(2, AccountMutation::Redeem { today: day(2), amount: 10 }).await.unwrap();

        let cleared = db.reset_claimed_flags(day(2)).await.unwrap();

        assert_eq!(cleared, 1);
        assert!(!db.get(1).await.unwrap().unwrap().claimed_today);
        assert!(db.get(2).await.unwrap().unwrap().claimed_today);
    }
}
