use crate::{dtos::ledger_dto::RedemptionResult, policy::RewardPolicy};
use async_trait::async_trait;
use chrono::NaiveDate;
use database::{AccountMutation, DynAccountRepository, MutationOutcome, UserId};
use std::sync::Arc;
use tracing::{debug, info};
use utils::AppResult;

pub type DynRedeemService = Arc<dyn RedeemServiceTrait + Send + Sync>;

#[async_trait]
pub trait RedeemServiceTrait {
    // today 由调用方传入，服务内部不读取时钟
    async fn redeem_daily(&self, user_id: UserId, today: NaiveDate) -> AppResult<RedemptionResult>;
}

#[derive(Clone)]
pub struct RedeemService {
    repository: DynAccountRepository,
    policy: RewardPolicy,
}

impl RedeemService {
    pub fn new(repository: DynAccountRepository, policy: RewardPolicy) -> Self {
        Self { repository, policy }
    }
}

#[async_trait]
impl RedeemServiceTrait for RedeemService {
    async fn redeem_daily(&self, user_id: UserId, today: NaiveDate) -> AppResult<RedemptionResult> {
        // 1. 首次交互时创建账户
        self.repository.get_or_create(user_id).await?;

        // 2. 判断与入账在同一个原子操作内完成
        let mutation = AccountMutation::Redeem {
            today,
            amount: self.policy.daily_reward,
        };

        match self.repository.apply(user_id, mutation).await? {
            MutationOutcome::Applied(account) => {
                info!(
                    "🎁 签到成功: user_id={}, date={}, +{}, balance={}",
                    user_id, today, self.policy.daily_reward, account.balance
                );
                Ok(RedemptionResult::Credited {
                    amount: self.policy.daily_reward,
                    balance: account.balance,
                })
            }
            MutationOutcome::Skipped(account) => {
                debug!("今日已签到: user_id={}, date={}", user_id, today);
                Ok(RedemptionResult::AlreadyRedeemedToday {
                    balance: account.balance,
                })
            }
        }
    }
}
