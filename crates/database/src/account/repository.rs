use crate::{
    account::model::{Account, AccountMutation, MutationOutcome, UserId},
    Database,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mongodb::{
    bson::{doc, Bson, Document},
    options::{FindOneAndUpdateOptions, FindOneOptions, IndexOptions, ReturnDocument},
    IndexModel,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use utils::{is_duplicate_key_error, AppError, AppResult};

pub type DynAccountRepository = Arc<dyn AccountRepositoryTrait + Send + Sync>;

#[async_trait]
pub trait AccountRepositoryTrait {
    // 获取账户，不存在则原子创建(并发首次访问只会产生一条记录)
    async fn get_or_create(&self, user_id: UserId) -> AppResult<Account>;

    // 获取账户(不会自动创建)
    async fn get(&self, user_id: UserId) -> AppResult<Option<Account>>;

    // 以单个原子操作应用一次带守卫的变更
    async fn apply(&self, user_id: UserId, mutation: AccountMutation) -> AppResult<MutationOutcome>;

    // 清理非今日签到账户的 claimed_today 标记，返回受影响的账户数
    async fn reset_claimed_flags(&self, today: NaiveDate) -> AppResult<u64>;
}

impl Database {
    /// 初始化账户集合索引
    pub async fn init_account_indexes(&self) -> AppResult<()> {
        let indexes = vec![
            // 用户ID唯一索引（主键）
            IndexModel::builder()
                .keys(doc! { "user_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                )
                .build(),
            // 清理任务按 claimed_today 过滤
            IndexModel::builder()
                .keys(doc! { "claimed_today": 1 })
                .build(),
        ];

        self.accounts.create_indexes(indexes, None).await?;
        info!("✅ Account索引初始化完成");
        Ok(())
    }
}

/// 读路径投影: credited_referrals 只在服务端用于守卫，随下级数量增长，不随每次交互返回
fn account_projection() -> Document {
    doc! { "credited_referrals": 0 }
}

/// 变更对应的(额外过滤条件, 更新文档)
///
/// 过滤条件即守卫，与 Account::try_apply 的语义保持一致。
fn mutation_to_update(mutation: &AccountMutation, now: i64) -> (Document, Document) {
    match *mutation {
        AccountMutation::Redeem { today, amount } => (
            doc! { "last_redeem_date": { "$ne": today.to_string() } },
            doc! {
                "$inc": { "balance": amount },
                "$set": {
                    "last_redeem_date": today.to_string(),
                    "claimed_today": true,
                    "updated_at": now,
                },
            },
        ),
        AccountMutation::CreditReferral { referred_id, bonus } => (
            doc! { "credited_referrals": { "$ne": referred_id } },
            doc! {
                "$inc": { "balance": bonus, "referral_count": 1 },
                "$addToSet": { "credited_referrals": referred_id },
                "$set": { "updated_at": now },
            },
        ),
        AccountMutation::Debit { amount } => (
            doc! { "balance": { "$gte": amount } },
            doc! {
                "$inc": { "balance": -amount },
                "$set": { "updated_at": now },
            },
        ),
    }
}

#[async_trait]
impl AccountRepositoryTrait for Database {
    async fn get_or_create(&self, user_id: UserId) -> AppResult<Account> {
        let defaults = Account::new(user_id);
        let update = doc! {
            "$setOnInsert": {
                "user_id": user_id,
                "balance": 0_i64,
                "last_redeem_date": Bson::Null,
                "referral_count": 0_i64,
                "claimed_today": false,
                "credited_referrals": [],
                "created_at": defaults.created_at,
                "updated_at": defaults.updated_at,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .projection(account_projection())
            .build();

        match self
            .accounts
            .find_one_and_update(doc! { "user_id": user_id }, update, options)
            .await
        {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(AppError::StoreUnavailable(format!(
                "upsert of account {} returned no document",
                user_id
            ))),
            // 并发upsert时唯一索引会拒绝其中一方，此时记录已存在，直接读取
            Err(e) if is_duplicate_key_error(&e) => {
                debug!("🔁 并发创建账户，改为读取: user_id={}", user_id);
                self.get(user_id)
                    .await?
                    .ok_or_else(|| AppError::Conflict(format!("account {} vanished after duplicate key", user_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, user_id: UserId) -> AppResult<Option<Account>> {
        let options = FindOneOptions::builder().projection(account_projection()).build();
        let account = self.accounts.find_one(doc! { "user_id": user_id }, options).await?;

        Ok(account)
    }

    async fn apply(&self, user_id: UserId, mutation: AccountMutation) -> AppResult<MutationOutcome> {
        let (guard, update) = mutation_to_update(&mutation, Utc::now().timestamp_millis());

        let mut filter = doc! { "user_id": user_id };
        for (key, value) in guard {
            filter.insert(key, value);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .projection(account_projection())
            .build();

        if let Some(account) = self.accounts.find_one_and_update(filter, update, options).await? {
            return Ok(MutationOutcome::Applied(account));
        }

        // 未命中: 要么账户不存在，要么守卫不满足
        match self.get(user_id).await? {
            Some(account) => Ok(MutationOutcome::Skipped(account)),
            None => {
                warn!("⚠️ 对不存在的账户应用变更: user_id={}, {:?}", user_id, mutation);
                Err(AppError::NotFound(format!("account {}", user_id)))
            }
        }
    }

    async fn reset_claimed_flags(&self, today: NaiveDate) -> AppResult<u64> {
        let filter = doc! {
            "claimed_today": true,
            "last_redeem_date": { "$ne": today.to_string() },
        };
        let update = doc! {
            "$set": {
                "claimed_today": false,
                "updated_at": Utc::now().timestamp_millis(),
            }
        };

        let result = self.accounts.update_many(filter, update, None).await?;

        Ok(result.modified_count)
    }
}
