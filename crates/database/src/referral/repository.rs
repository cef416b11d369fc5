use crate::{
    account::model::UserId,
    referral::model::{EdgeInsert, ReferralEdge},
    Database,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOptions, IndexOptions},
    IndexModel,
};
use std::sync::Arc;
use tracing::{debug, info};
use utils::{is_duplicate_key_error, AppError, AppResult};

pub type DynReferralRepository = Arc<dyn ReferralRepositoryTrait + Send + Sync>;

#[async_trait]
pub trait ReferralRepositoryTrait {
    // 条件插入邀请边: 被邀请人尚无邀请人时才会创建(唯一的去重判定点)
    async fn try_create_edge(&self, referrer_id: UserId, referred_id: UserId, date: NaiveDate) -> AppResult<EdgeInsert>;

    // 按创建顺序列出某个邀请人的所有下级
    async fn list_edges_for_referrer(&self, referrer_id: UserId) -> AppResult<Vec<ReferralEdge>>;

    async fn count_for_referrer(&self, referrer_id: UserId) -> AppResult<u64>;

    // 获取某个用户的邀请人
    async fn get_edge_for_referred(&self, referred_id: UserId) -> AppResult<Option<ReferralEdge>>;
}

impl Database {
    /// 初始化邀请关系集合索引
    pub async fn init_referral_indexes(&self) -> AppResult<()> {
        let indexes = vec![
            // 被邀请人唯一索引: 重复邀请由此拒绝
            IndexModel::builder()
                .keys(doc! { "referred_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("referred_id_unique".to_string())
                        .build(),
                )
                .build(),
            // 按邀请人列出下级
            IndexModel::builder()
                .keys(doc! { "referrer_id": 1, "created_at": 1 })
                .options(IndexOptions::builder().name("referrer_created_at".to_string()).build())
                .build(),
        ];

        self.referrals.create_indexes(indexes, None).await?;
        info!("✅ ReferralEdge索引初始化完成");
        Ok(())
    }
}

#[async_trait]
impl ReferralRepositoryTrait for Database {
    async fn try_create_edge(&self, referrer_id: UserId, referred_id: UserId, date: NaiveDate) -> AppResult<EdgeInsert> {
        let edge = ReferralEdge::new(referrer_id, referred_id, date);

        // 不做"先查后插"，直接插入，由唯一索引判定是否重复
        match self.referrals.insert_one(&edge, None).await {
            Ok(_) => Ok(EdgeInsert::Created(edge)),
            Err(e) if is_duplicate_key_error(&e) => {
                debug!("🔁 被邀请人已有邀请人: referred_id={}", referred_id);
                let existing = self
                    .get_edge_for_referred(referred_id)
                    .await?
                    .ok_or_else(|| AppError::Conflict(format!("edge for {} vanished after duplicate key", referred_id)))?;
                Ok(EdgeInsert::AlreadyExists(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_edges_for_referrer(&self, referrer_id: UserId) -> AppResult<Vec<ReferralEdge>> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1, "_id": 1 }).build();
        let cursor = self.referrals.find(doc! { "referrer_id": referrer_id }, options).await?;

        let edges: Vec<ReferralEdge> = cursor.try_collect().await?;

        Ok(edges)
    }

    async fn count_for_referrer(&self, referrer_id: UserId) -> AppResult<u64> {
        let count = self
            .referrals
            .count_documents(doc! { "referrer_id": referrer_id }, None)
            .await?;

        Ok(count)
    }

    async fn get_edge_for_referred(&self, referred_id: UserId) -> AppResult<Option<ReferralEdge>> {
        let edge = self.referrals.find_one(doc! { "referred_id": referred_id }, None).await?;

        Ok(edge)
    }
}
