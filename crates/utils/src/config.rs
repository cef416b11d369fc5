use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
#[clap(rename_all = "lowercase")]
pub enum CargoEnv {
    Development,
    Production,
}

/// 账本存储后端
#[derive(clap::ValueEnum, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[clap(rename_all = "lowercase")]
pub enum LedgerStore {
    /// MongoDB(生产环境)
    #[default]
    #[serde(rename = "mongo")]
    Mongo,
    /// 进程内存储(本地调试/测试，进程退出即丢失)
    #[serde(rename = "memory")]
    Memory,
}

/// 环境配置加载器
pub struct EnvLoader;

impl EnvLoader {
    /// 根据 CARGO_ENV 加载对应的环境配置文件
    pub fn load_env_file() -> Result<(), Box<dyn std::error::Error>> {
        // 1. 获取环境变量 CARGO_ENV development
        let cargo_env = std::env::var("CARGO_ENV").unwrap_or_else(|_| "development".to_string());
        // 2. 构建配置文件路径
        let env_file = Self::env_file_for(&cargo_env);
        // 3. 检查文件是否存在
        if !std::path::Path::new(env_file).exists() {
            eprintln!("⚠️  配置文件 {} 不存在，尝试加载默认的 .env 文件", env_file);
            // 回退到默认的 .env 文件
            if std::path::Path::new(".env").exists() {
                dotenvy::from_filename(".env")?;
                println!("✅ 已加载默认配置文件: .env");
            } else {
                eprintln!("❌ 未找到任何配置文件，使用默认配置");
            }
            return Ok(());
        }

        // 4. 加载指定的环境配置文件
        dotenvy::from_filename(env_file)?;
        println!("✅ 已加载环境配置文件: {} (CARGO_ENV={})", env_file, cargo_env);

        Ok(())
    }

    fn env_file_for(cargo_env: &str) -> &'static str {
        match cargo_env {
            "production" | "Production" | "prod" => ".env.production",
            "development" | "Development" | "dev" => ".env.development",
            "test" | "Test" => ".env.test",
            _ => {
                println!("⚠️  未知的 CARGO_ENV: {}，使用默认的 .env.development", cargo_env);
                ".env.development"
            }
        }
    }
}

#[derive(clap::Parser, Clone, Debug)]
pub struct AppConfig {
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    #[clap(long, env, default_value = "mongodb://localhost:27017")]
    pub mongo_uri: String,

    #[clap(long, env, default_value = "reward_ledger")]
    pub mongo_db: String,

    /// 账本存储后端: mongo | memory
    #[clap(long, env, value_enum, default_value = "mongo")]
    pub ledger_store: LedgerStore,

    #[clap(long, env, default_value = "info")]
    pub rust_log: String,

    /// 生产环境日志目录(为空时回退到 LOG_DIR / 可执行文件目录)
    #[clap(long, env)]
    pub log_dir: Option<PathBuf>,

    /// 每日签到奖励
    #[clap(long, env, default_value = "10")]
    pub daily_reward_amount: i64,

    /// 邀请奖励(每个被邀请人只发放一次)
    #[clap(long, env, default_value = "50")]
    pub referral_bonus: i64,

    /// 最低提现金额
    #[clap(long, env, default_value = "100")]
    pub min_withdrawal: i64,

    /// 是否启动每日 claimed_today 标记清理任务
    #[clap(long, env, default_value = "false")]
    pub enable_reset_scheduler: bool,

    /// 清理任务的cron表达式(UTC, 秒 分 时 日 月 周)
    #[clap(long, env, default_value = "0 0 0 * * *")]
    pub reset_cron: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        EnvLoader::load_env_file().ok();
        AppConfig::parse()
    }
}

impl AppConfig {
    /// 手动创建配置实例（用于测试）
    pub fn new_for_test() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            mongo_uri: std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db: std::env::var("MONGO_DB").unwrap_or_else(|_| "reward_ledger_test".to_string()),
            ledger_store: LedgerStore::Memory,
            rust_log: "info".to_string(),
            log_dir: None,
            daily_reward_amount: 10,
            referral_bonus: 50,
            min_withdrawal: 100,
            enable_reset_scheduler: false,
            reset_cron: "0 0 0 * * *".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_args() {
        let config = AppConfig::try_parse_from([
            "rewardbot",
            "--cargo-env",
            "production",
            "--ledger-store",
            "memory",
            "--referral-bonus",
            "20",
        ])
        .expect("args should parse");

        assert!(matches!(config.cargo_env, CargoEnv::Production));
        assert_eq!(config.ledger_store, LedgerStore::Memory);
        assert_eq!(config.referral_bonus, 20);
        assert_eq!(config.daily_reward_amount, 10);
        assert_eq!(config.reset_cron, "0 0 0 * * *");
    }

    #[test]
    fn test_env_file_mapping() {
        assert_eq!(EnvLoader::env_file_for("prod"), ".env.production");
        assert_eq!(EnvLoader::env_file_for("Test"), ".env.test");
        assert_eq!(EnvLoader::env_file_for("staging"), ".env.development");
    }

    #[test]
    fn test_config_for_test_uses_memory_store() {
        let config = AppConfig::new_for_test();
        assert_eq!(config.ledger_store, LedgerStore::Memory);
        assert!(!config.enable_reset_scheduler);
    }
}
