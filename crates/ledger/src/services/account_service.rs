use crate::{dtos::ledger_dto::WithdrawalResult, policy::RewardPolicy};
use async_trait::async_trait;
use chrono::NaiveDate;
use database::{Account, AccountMutation, DynAccountRepository, MutationOutcome, UserId};
use std::sync::Arc;
use tracing::{debug, info};
use utils::{AppError, AppResult};

pub type DynAccountService = Arc<dyn AccountServiceTrait + Send + Sync>;

#[async_trait]
pub trait AccountServiceTrait {
    async fn ensure_account(&self, user_id: UserId) -> AppResult<Account>;
    async fn get_account(&self, user_id: UserId) -> AppResult<Account>;
    async fn withdraw(&self, user_id: UserId, amount: i64) -> AppResult<WithdrawalResult>;
    async fn reset_daily_flags(&self, today: NaiveDate) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct AccountService {
    repository: DynAccountRepository,
    policy: RewardPolicy,
}

impl AccountService {
    pub fn new(repository: DynAccountRepository, policy: RewardPolicy) -> Self {
        Self { repository, policy }
    }
}

#[async_trait]
impl AccountServiceTrait for AccountService {
    async fn ensure_account(&self, user_id: UserId) -> AppResult<Account> {
        let account = self.repository.get_or_create(user_id).await?;

        Ok(account)
    }

    async fn get_account(&self, user_id: UserId) -> AppResult<Account> {
        self.repository
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", user_id)))
    }

    async fn withdraw(&self, user_id: UserId, amount: i64) -> AppResult<WithdrawalResult> {
        if amount <= 0 {
            return Ok(WithdrawalResult::InvalidAmount);
        }
        if amount < self.policy.min_withdrawal {
            return Ok(WithdrawalResult::BelowMinimum {
                minimum: self.policy.min_withdrawal,
            });
        }

        match self.repository.apply(user_id, AccountMutation::Debit { amount }).await? {
            MutationOutcome::Applied(account) => {
                info!("💸 提现扣款: user_id={}, amount={}, balance={}", user_id, amount, account.balance);
                Ok(WithdrawalResult::Debited {
                    amount,
                    balance: account.balance,
                })
            }
            MutationOutcome::Skipped(account) => {
                debug!("余额不足: user_id={}, amount={}, balance={}", user_id, amount, account.balance);
                Ok(WithdrawalResult::InsufficientBalance {
                    balance: account.balance,
                })
            }
        }
    }

    async fn reset_daily_flags(&self, today: NaiveDate) -> AppResult<u64> {
        let cleared = self.repository.reset_claimed_flags(today).await?;
        info!("🧹 已清理{}个账户的今日签到标记 ({})", cleared, today);

        Ok(cleared)
    }
}
