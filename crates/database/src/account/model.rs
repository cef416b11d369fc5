use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 用户标识(Telegram user id)
pub type UserId = i64;

/// 账户模型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// 用户ID(唯一索引)
    pub user_id: UserId,
    /// 余额(不会小于0)
    pub balance: i64,
    /// 最近一次成功签到的日期(YYYY-MM-DD)
    #[serde(default)]
    pub last_redeem_date: Option<NaiveDate>,
    /// 作为邀请人的邀请边数量
    pub referral_count: i64,
    /// 今日是否已签到(仅用于展示，由定时任务清理；签到判定只看 last_redeem_date)
    #[serde(default)]
    pub claimed_today: bool,
    /// 已发放过邀请奖励的被邀请人
    ///
    /// 只在存储内部用作邀请奖励的幂等守卫，随下级数量增长；
    /// 仓库返回的账户快照不携带该字段(见 Account::view)。
    #[serde(default)]
    pub credited_referrals: BTreeSet<UserId>,
    /// 创建时间(毫秒)
    pub created_at: i64,
    /// 最后更新时间(毫秒)
    pub updated_at: i64,
}

impl Account {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            user_id,
            balance: 0,
            last_redeem_date: None,
            referral_count: 0,
            claimed_today: false,
            credited_referrals: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_redeemed_on(&self, day: NaiveDate) -> bool {
        self.last_redeem_date == Some(day)
    }

    pub fn has_credited(&self, referred_id: UserId) -> bool {
        self.credited_referrals.contains(&referred_id)
    }

    /// 对外返回的账户快照: 与MongoDB读路径的投影一致，去掉 credited_referrals
    pub fn view(&self) -> Account {
        Account {
            user_id: self.user_id,
            balance: self.balance,
            last_redeem_date: self.last_redeem_date,
            referral_count: self.referral_count,
            claimed_today: self.claimed_today,
            credited_referrals: BTreeSet::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// 校验守卫条件并就地应用变更；守卫不满足时返回false且不做任何修改
    ///
    /// 内存存储直接调用；MongoDB实现用等价的过滤条件+更新文档表达同一语义。
    pub fn try_apply(&mut self, mutation: &AccountMutation) -> bool {
        match *mutation {
            AccountMutation::Redeem { today, amount } => {
                if self.has_redeemed_on(today) {
                    return false;
                }
                self.balance += amount;
                self.last_redeem_date = Some(today);
                self.claimed_today = true;
            }
            AccountMutation::CreditReferral { referred_id, bonus } => {
                if self.has_credited(referred_id) {
                    return false;
                }
                self.balance += bonus;
                self.referral_count += 1;
                self.credited_referrals.insert(referred_id);
            }
            AccountMutation::Debit { amount } => {
                if self.balance < amount {
                    return false;
                }
                self.balance -= amount;
            }
        }
        self.updated_at = Utc::now().timestamp_millis();
        true
    }
}

/// 账户上的原子变更(每种变更都带有自己的守卫条件)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountMutation {
    /// 守卫: last_redeem_date != today
    Redeem { today: NaiveDate, amount: i64 },
    /// 守卫: referred_id 尚未计入 credited_referrals
    CreditReferral { referred_id: UserId, bonus: i64 },
    /// 守卫: balance >= amount
    Debit { amount: i64 },
}

/// 变更结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// 已应用，携带变更后的账户
    Applied(Account),
    /// 守卫不满足，未做修改，携带当前账户
    Skipped(Account),
}

impl MutationOutcome {
    pub fn account(&self) -> &Account {
        match self {
            MutationOutcome::Applied(account) | MutationOutcome::Skipped(account) => account,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    #[test]
    fn test_new_account_defaults() {
        let account = Account::new(42);

        assert_eq!(account.user_id, 42);
        assert_eq!(account.balance, 0);
        assert_eq!(account.referral_count, 0);
        assert!(account.last_redeem_date.is_none());
        assert!(!account.claimed_today);
        assert!(account.credited_referrals.is_empty());
    }

    #[test]
    fn test_redeem_guard() {
        let mut account = Account::new(42);
        let redeem = AccountMutation::Redeem { today: day(1), amount: 10 };

        assert!(account.try_apply(&redeem));
        assert_eq!(account.balance, 10);
        assert!(account.has_redeemed_on(day(1)));
        assert!(account.claimed_today);

        // 同一天再次签到: 不修改
        assert!(!account.try_apply(&redeem));
        assert_eq!(account.balance, 10);

        // 第二天可以再次签到
        assert!(account.try_apply(&AccountMutation::Redeem { today: day(2), amount: 10 }));
        assert_eq!(account.balance, 20);
        assert_eq!(account.last_redeem_date, Some(day(2)));
    }

    #[test]
    fn test_credit_referral_guard() {
        let mut account = Account::new(1);
        let credit = AccountMutation::CreditReferral { referred_id: 2, bonus: 50 };

        assert!(account.try_apply(&credit));
        assert!(!account.try_apply(&credit));

        assert_eq!(account.balance, 50);
        assert_eq!(account.referral_count, 1);
        assert_eq!(account.credited_referrals, BTreeSet::from([2]));
    }

    #[test]
    fn test_debit_never_goes_negative() {
        let mut account = Account::new(7);
        account.balance = 30;

        assert!(!account.try_apply(&AccountMutation::Debit { amount: 31 }));
        assert_eq!(account.balance, 30);

        assert!(account.try_apply(&AccountMutation::Debit { amount: 30 }));
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_view_drops_credit_log() {
        let mut account = Account::new(1);
        for referred_id in 2..6 {
            account.try_apply(&AccountMutation::CreditReferral { referred_id, bonus: 50 });
        }

        let view = account.view();
        assert!(view.credited_referrals.is_empty());
        assert_eq!(view.referral_count, 4);
        assert_eq!(view.balance, 200);
        assert_eq!(account.credited_referrals.len(), 4);
    }

    #[test]
    fn test_credit_log_round_trips_as_array() {
        let mut account = Account::new(1);
        account.try_apply(&AccountMutation::CreditReferral { referred_id: 3, bonus: 50 });
        account.try_apply(&AccountMutation::CreditReferral { referred_id: 2, bonus: 50 });

        let json = serde_json::to_value(&account).expect("serialize account");
        assert_eq!(json["credited_referrals"], serde_json::json!([2, 3]));

        let back: Account = serde_json::from_value(json).expect("deserialize account");
        assert!(back.has_credited(2) && back.has_credited(3));
    }

    #[test]
    fn test_date_serializes_as_plain_string() {
        let mut account = Account::new(9);
        account.last_redeem_date = Some(day(15));

        let json = serde_json::to_value(&account).expect("serialize account");
        assert_eq!(json["last_redeem_date"], "2024-01-15");
    }
}
