// Ledger: 每日签到与邀请奖励的账本核心
// - 前端(消息机器人)只负责渲染，所有余额/邀请/签到状态的变更都经由这里

pub mod dtos;
pub mod policy;
pub mod services;

pub use dtos::ledger_dto::*;
pub use policy::RewardPolicy;
pub use services::Services;
