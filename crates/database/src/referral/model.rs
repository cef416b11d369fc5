use crate::account::model::UserId;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 邀请关系(邀请边)，一经创建不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEdge {
    /// 邀请人
    pub referrer_id: UserId,
    /// 被邀请人(唯一索引: 每个用户最多只有一个邀请人)
    pub referred_id: UserId,
    /// 建立关系的日期(由调用方传入)
    pub date: NaiveDate,
    /// 创建时间(毫秒)，用于排序
    pub created_at: i64,
}

impl ReferralEdge {
    pub fn new(referrer_id: UserId, referred_id: UserId, date: NaiveDate) -> Self {
        Self {
            referrer_id,
            referred_id,
            date,
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

/// 条件插入的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeInsert {
    Created(ReferralEdge),
    /// 被邀请人已有邀请人，携带已存在的那条边
    AlreadyExists(ReferralEdge),
}
