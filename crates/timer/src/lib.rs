// Timer: 每日零点(UTC)定时执行
// - 清理前一天签到用户的 claimed_today 展示标记
// - 签到判定依赖 last_redeem_date，本任务停摆或漏跑都不影响签到正确性
use chrono::{NaiveDate, Utc};
use cron::Schedule;
use ledger::Services;
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::time::sleep_until;
use tracing::{error, info, warn};
use utils::{AppError, AppResult};

pub const DEFAULT_RESET_CRON: &str = "0 0 0 * * *";

#[derive(Clone)]
pub struct Timer {
    pub time: String,
    schedule: Schedule,
    pub services: Services,
}

impl Timer {
    // "0 0 0 * * *": 每天00:00:00执行
    pub fn new(time: Option<String>, services: Services) -> AppResult<Self> {
        let time = time.unwrap_or_else(|| DEFAULT_RESET_CRON.to_string());
        let schedule = Schedule::from_str(&time)
            .map_err(|e| AppError::Config(format!("invalid reset cron '{}': {}", time, e)))?;

        Ok(Timer { time, schedule, services })
    }

    pub async fn run(self: Arc<Self>) {
        info!("⏳ Timer action at {} everyday.", self.time);

        loop {
            let now = Utc::now();
            let Some(next_run_time) = self.schedule.upcoming(Utc).next() else {
                warn!("⚠️ cron表达式没有后续执行时间，Timer退出: {}", self.time);
                return;
            };

            let duration_until_next_run = (next_run_time - now).to_std().unwrap_or(Duration::from_secs(0));

            sleep_until(tokio::time::Instant::now() + duration_until_next_run).await;

            let today = Utc::now().date_naive(); // 获取当前UTC日期
            if let Err(e) = self.reset_daily_flags(today).await {
                // 下一个周期会重新清理，这里只记录
                error!("❌ 清理今日签到标记失败: {}", e);
            }
        }
    }

    pub async fn reset_daily_flags(&self, today: NaiveDate) -> AppResult<u64> {
        self.services.account.reset_daily_flags(today).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::RewardPolicy;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    #[test]
    fn test_default_schedule_is_daily_midnight() {
        let timer = Timer::new(None, Services::in_memory(RewardPolicy::default())).unwrap();
        assert_eq!(timer.time, DEFAULT_RESET_CRON);

        let mut upcoming = timer.schedule.upcoming(Utc);
        let first = upcoming.next().unwrap();
        let second = upcoming.next().unwrap();
        assert_eq!((second - first).num_hours(), 24);
        assert_eq!(first.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn test_invalid_cron_is_config_error() {
        let result = Timer::new(Some("every midnight".to_string()), Services::in_memory(RewardPolicy::default()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_sweep_clears_only_stale_flags() {
        let services = Services::in_memory(RewardPolicy::default());
        services.redeem.redeem_daily(1, day(1)).await.unwrap();
        services.redeem.redeem_daily(2, day(2)).await.unwrap();
        services.account.ensure_account(3).await.unwrap();

        let timer = Timer::new(None, services.clone()).unwrap();
        let cleared = timer.reset_daily_flags(day(2)).await.unwrap();

        assert_eq!(cleared, 1);
        assert!(!services.account.get_account(1).await.unwrap().claimed_today);
        assert!(services.account.get_account(2).await.unwrap().claimed_today);

        // 重复执行无副作用
        assert_eq!(timer.reset_daily_flags(day(2)).await.unwrap(), 0);
    }
}
