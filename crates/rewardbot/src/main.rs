use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use ledger::Services;
use std::sync::Arc;
use timer::Timer;
use tokio::{signal, task::JoinSet};
use tracing::{info, warn};
use utils::{AppConfig, Logger};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RewardBot::with_config();
    let _guard = Logger::new_with_log_dir(config.cargo_env, config.log_dir.clone());

    let rewardbot = RewardBot::new(config).await?;
    rewardbot.run().await?;

    Ok(())
}

/// 账本宿主进程: 消息前端通过 services 调用账本，这里负责装配与生命周期
pub struct RewardBot {
    services: Services,
    timer: Option<Timer>,
    config: Arc<AppConfig>,
}

impl RewardBot {
    pub async fn new(config: Arc<AppConfig>) -> Result<Self> {
        let services = RewardBot::with_service(config.clone()).await?;
        let timer = RewardBot::with_timer(&config, services.clone())?;

        Ok(Self {
            services,
            timer,
            config,
        })
    }

    pub async fn run(self) -> Result<()> {
        let mut set = JoinSet::new();

        // 1. 启动账本服务(由消息前端调用)
        // 2. 启动Timer(可选)
        if let Some(timer) = self.timer {
            // 重启后先补一次清理，避免漏跑的零点任务留下过期标记
            let today = Utc::now().date_naive();
            if let Err(e) = timer.reset_daily_flags(today).await {
                warn!("⚠️ 启动时清理签到标记失败: {}", e);
            }

            let timer = Arc::new(timer);
            set.spawn(async move { timer.run().await });
        }

        info!(
            "🚀 reward ledger ready (store={:?}, daily_reward={}, referral_bonus={})",
            self.config.ledger_store, self.services.policy.daily_reward, self.services.policy.referral_bonus
        );

        let tasks = async {
            while set.join_next().await.is_some() {
                info!("🔔 Task completed");
            }
            // 没有后台任务时一直等待关闭信号
            std::future::pending::<()>().await;
        };

        tokio::select! {
            _ = tasks => {},
            result = shutdown_signal() => {
                result?;
                info!("🔔 Shutdown signal received, stopping all tasks...");
            },
        }

        set.shutdown().await;
        Ok(())
    }
}

impl RewardBot {
    fn with_config() -> Arc<AppConfig> {
        // 根据 CARGO_ENV 加载对应的环境配置文件
        utils::EnvLoader::load_env_file().ok();
        Arc::new(AppConfig::parse())
    }

    async fn with_service(config: Arc<AppConfig>) -> Result<Services> {
        let services = Services::from_config(config)
            .await
            .context("🔴 Failed to initialize ledger services")?;

        Ok(services)
    }

    fn with_timer(config: &AppConfig, services: Services) -> Result<Option<Timer>> {
        if !config.enable_reset_scheduler {
            info!("⏸️ Reset scheduler disabled");
            return Ok(None);
        }

        let timer = Timer::new(Some(config.reset_cron.clone()), services).context("🔴 Failed to create timer")?;
        Ok(Some(timer))
    }
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await.context("🔴 Failed to install Ctrl+C handler")?;
        info!("🔔 Ctrl+C received");
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("🔴 Failed to install signal handler")?
            .recv()
            .await;
        info!("🔔 Terminate signal received");
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result?,
        result = terminate => result?,
    }

    warn!("❌ Signal received, starting graceful shutdown...");
    Ok(())
}
