use crate::{
    dtos::ledger_dto::{ReferralEntry, ReferralResult, RejectReason},
    policy::RewardPolicy,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use database::{
    AccountMutation, DynAccountRepository, DynReferralRepository, EdgeInsert, MutationOutcome, UserId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use utils::AppResult;

pub type DynReferService = Arc<dyn ReferServiceTrait + Send + Sync>;

#[async_trait]
pub trait ReferServiceTrait {
    // 记录邀请关系并给邀请人发放奖励(每个被邀请人只发放一次)
    async fn record_referral(
        &self,
        referrer_id: UserId,
        referred_id: UserId,
        today: NaiveDate,
    ) -> AppResult<ReferralResult>;

    // 按创建顺序列出某个用户邀请的下级
    async fn list_referrals(&self, user_id: UserId) -> AppResult<Vec<ReferralEntry>>;

    // 获取某个用户的邀请人
    async fn get_referrer(&self, user_id: UserId) -> AppResult<Option<UserId>>;
}

#[derive(Clone)]
pub struct ReferService {
    accounts: DynAccountRepository,
    referrals: DynReferralRepository,
    policy: RewardPolicy,
}

impl ReferService {
    pub fn new(accounts: DynAccountRepository, referrals: DynReferralRepository, policy: RewardPolicy) -> Self {
        Self {
            accounts,
            referrals,
            policy,
        }
    }

    /// 给邀请人入账；以 (referrer, referred) 为幂等键，重复调用不会重复入账
    async fn credit_referrer(&self, referrer_id: UserId, referred_id: UserId) -> AppResult<ReferralResult> {
        self.accounts.get_or_create(referrer_id).await?;

        let mutation = AccountMutation::CreditReferral {
            referred_id,
            bonus: self.policy.referral_bonus,
        };

        match self.accounts.apply(referrer_id, mutation).await? {
            MutationOutcome::Applied(account) => {
                info!(
                    "🤝 邀请奖励已发放: referrer={}, referred={}, +{}, balance={}, count={}",
                    referrer_id, referred_id, self.policy.referral_bonus, account.balance, account.referral_count
                );
                Ok(ReferralResult::Credited {
                    amount: self.policy.referral_bonus,
                    referrer_balance: account.balance,
                    referral_count: account.referral_count,
                })
            }
            MutationOutcome::Skipped(_) => {
                debug!("邀请奖励此前已发放: referrer={}, referred={}", referrer_id, referred_id);
                Ok(ReferralResult::Noop)
            }
        }
    }
}

#[async_trait]
impl ReferServiceTrait for ReferService {
    async fn record_referral(
        &self,
        referrer_id: UserId,
        referred_id: UserId,
        today: NaiveDate,
    ) -> AppResult<ReferralResult> {
        // 1. 自己邀请自己: 直接拒绝，不触碰存储
        if referrer_id == referred_id {
            warn!("⚠️ 拒绝自我邀请: user_id={}", referrer_id);
            return Ok(ReferralResult::Rejected {
                reason: RejectReason::SelfReferral,
            });
        }

        // 2. 条件插入邀请边(唯一的去重判定点)，成功后才入账
        match self.referrals.try_create_edge(referrer_id, referred_id, today).await? {
            EdgeInsert::Created(_) => self.credit_referrer(referrer_id, referred_id).await,
            // 同一邀请人的重放: 补发可能因中途失败而遗漏的奖励，已发放则为Noop
            EdgeInsert::AlreadyExists(edge) if edge.referrer_id == referrer_id => {
                self.credit_referrer(referrer_id, referred_id).await
            }
            EdgeInsert::AlreadyExists(edge) => {
                debug!(
                    "被邀请人已有邀请人，忽略: referred={}, existing_referrer={}, attempted_referrer={}",
                    referred_id, edge.referrer_id, referrer_id
                );
                Ok(ReferralResult::Noop)
            }
        }
    }

    async fn list_referrals(&self, user_id: UserId) -> AppResult<Vec<ReferralEntry>> {
        let edges = self.referrals.list_edges_for_referrer(user_id).await?;

        Ok(edges.into_iter().map(ReferralEntry::from).collect())
    }

    async fn get_referrer(&self, user_id: UserId) -> AppResult<Option<UserId>> {
        let edge = self.referrals.get_edge_for_referred(user_id).await?;

        Ok(edge.map(|e| e.referrer_id))
    }
}
