use chrono::NaiveDate;
use database::{ReferralEdge, UserId};
use serde::Serialize;

/// 每日签到结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedemptionResult {
    Credited { amount: i64, balance: i64 },
    AlreadyRedeemedToday { balance: i64 },
}

impl RedemptionResult {
    pub fn is_credited(&self) -> bool {
        matches!(self, RedemptionResult::Credited { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SelfReferral,
}

/// 邀请记录结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReferralResult {
    Credited {
        amount: i64,
        referrer_balance: i64,
        referral_count: i64,
    },
    Rejected {
        reason: RejectReason,
    },
    /// 被邀请人已有邀请人(或奖励已发放)，静默忽略
    Noop,
}

impl ReferralResult {
    pub fn is_credited(&self) -> bool {
        matches!(self, ReferralResult::Credited { .. })
    }
}

/// 提现扣款结果(仅扣减余额，不含打款)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WithdrawalResult {
    Debited { amount: i64, balance: i64 },
    InsufficientBalance { balance: i64 },
    BelowMinimum { minimum: i64 },
    InvalidAmount,
}

/// 下级列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralEntry {
    pub referred_id: UserId,
    pub date: NaiveDate,
}

impl From<ReferralEdge> for ReferralEntry {
    fn from(edge: ReferralEdge) -> Self {
        Self {
            referred_id: edge.referred_id,
            date: edge.date,
        }
    }
}
