use utils::{AppConfig, AppError, AppResult};

/// 每日签到奖励
pub const FIXED_DAILY_AMOUNT: i64 = 10;
/// 邀请奖励(与签到奖励同一计价单位)
pub const REFERRAL_BONUS: i64 = 50;
/// 最低提现金额
pub const MIN_WITHDRAWAL: i64 = 100;

/// 奖励策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPolicy {
    pub daily_reward: i64,
    pub referral_bonus: i64,
    pub min_withdrawal: i64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            daily_reward: FIXED_DAILY_AMOUNT,
            referral_bonus: REFERRAL_BONUS,
            min_withdrawal: MIN_WITHDRAWAL,
        }
    }
}

impl RewardPolicy {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let policy = Self {
            daily_reward: config.daily_reward_amount,
            referral_bonus: config.referral_bonus,
            min_withdrawal: config.min_withdrawal,
        };
        policy.validate()?;

        Ok(policy)
    }

    pub fn validate(&self) -> AppResult<()> {
        let amounts = [
            ("daily_reward_amount", self.daily_reward),
            ("referral_bonus", self.referral_bonus),
            ("min_withdrawal", self.min_withdrawal),
        ];
        for (name, value) in amounts {
            if value <= 0 {
                return Err(AppError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.daily_reward, 10);
        assert_eq!(policy.referral_bonus, 50);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_from_config_rejects_non_positive_amounts() {
        let mut config = AppConfig::new_for_test();
        config.referral_bonus = 0;

        let err = RewardPolicy::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("referral_bonus")));
    }

    #[test]
    fn test_from_config_overrides() {
        let mut config = AppConfig::new_for_test();
        config.daily_reward_amount = 5;

        let policy = RewardPolicy::from_config(&config).unwrap();
        assert_eq!(policy.daily_reward, 5);
        assert_eq!(policy.referral_bonus, 50);
    }
}
