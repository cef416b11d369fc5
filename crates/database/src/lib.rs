////////////////////////////////////////////////////////////////////////
//
// 1. 每个Domain(Entity)单独一个文件夹
// 2. 每个Domain由两部分组成:
//    - model: 定义Schema
//    - repository: 仓库Trait + MongoDB底层操作
// 3. memory: 同一组Trait的进程内实现(本地调试与测试)
//
//////////////////////////////////////////////////////////////////////

use mongodb::{Client, Collection};
use std::sync::Arc;
use tracing::info;
use utils::{AppConfig, AppResult};

pub mod account;
pub mod memory;
pub mod referral;

pub use account::model::{Account, AccountMutation, MutationOutcome, UserId};
pub use account::repository::{AccountRepositoryTrait, DynAccountRepository};
pub use memory::MemoryDatabase;
pub use referral::model::{EdgeInsert, ReferralEdge};
pub use referral::repository::{DynReferralRepository, ReferralRepositoryTrait};

#[derive(Clone, Debug)]
pub struct Database {
    pub accounts: Collection<Account>,
    pub referrals: Collection<ReferralEdge>,
}

impl Database {
    pub async fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let client = Client::with_uri_str(&config.mongo_uri).await?;
        let db: mongodb::Database = client.database(&config.mongo_db);

        let accounts = db.collection("Account");
        let referrals = db.collection("ReferralEdge");

        info!("🧱 database({:#}) connected.", &config.mongo_db);

        Ok(Database { accounts, referrals })
    }

    /// 初始化索引(唯一索引是并发去重的基础，启动时必须先执行)
    pub async fn init_repository_indexes(&self) -> AppResult<()> {
        self.init_account_indexes().await?;
        self.init_referral_indexes().await?;

        info!("✅ 账本索引初始化完成");
        Ok(())
    }
}
