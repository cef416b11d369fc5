////////////////////////////////////////////////////////////////////////
//
// 服务层: 每个服务只依赖仓库Trait，不关心底层是MongoDB还是内存
//
//////////////////////////////////////////////////////////////////////

pub mod account_service;
pub mod redeem_service;
pub mod refer_service;

use crate::policy::RewardPolicy;
use database::{Database, DynAccountRepository, DynReferralRepository, MemoryDatabase};
use std::sync::Arc;
use tracing::info;
use utils::{AppConfig, AppResult, LedgerStore};

use account_service::{AccountService, DynAccountService};
use redeem_service::{DynRedeemService, RedeemService};
use refer_service::{DynReferService, ReferService};

pub use account_service::AccountServiceTrait;
pub use redeem_service::RedeemServiceTrait;
pub use refer_service::ReferServiceTrait;

#[derive(Clone)]
pub struct Services {
    pub account: DynAccountService,
    pub redeem: DynRedeemService,
    pub refer: DynReferService,
    pub policy: RewardPolicy,
}

impl Services {
    /// 基于MongoDB创建Services
    pub fn new(db: Database, policy: RewardPolicy) -> Self {
        let database = Arc::new(db);
        Self::with_repositories(database.clone(), database, policy)
    }

    /// 基于进程内存储创建Services
    pub fn in_memory(policy: RewardPolicy) -> Self {
        let database = Arc::new(MemoryDatabase::new());
        Self::with_repositories(database.clone(), database, policy)
    }

    pub fn with_repositories(
        accounts: DynAccountRepository,
        referrals: DynReferralRepository,
        policy: RewardPolicy,
    ) -> Self {
        let account = Arc::new(AccountService::new(accounts.clone(), policy)) as DynAccountService;
        let redeem = Arc::new(RedeemService::new(accounts.clone(), policy)) as DynRedeemService;
        let refer = Arc::new(ReferService::new(accounts, referrals, policy)) as DynReferService;

        Self {
            account,
            redeem,
            refer,
            policy,
        }
    }

    /// 按配置选择存储后端并初始化
    pub async fn from_config(config: Arc<AppConfig>) -> AppResult<Self> {
        let policy = RewardPolicy::from_config(&config)?;

        let services = match config.ledger_store {
            LedgerStore::Mongo => {
                let database = Database::new(config.clone()).await?;
                database.init_repository_indexes().await?;
                Self::new(database, policy)
            }
            LedgerStore::Memory => Self::in_memory(policy),
        };

        info!("🧠 Services initialized ({:?} store, {:?})", config.ledger_store, policy);
        Ok(services)
    }
}
