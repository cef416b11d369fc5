use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

/// 账本统一错误类型
///
/// 业务结果(今日已领取、重复邀请、自邀请、余额不足等)不属于错误，
/// 都以普通返回值的形式交给调用方；这里只包含存储层故障和配置问题。
#[derive(Error, Debug)]
pub enum AppError {
    #[error("记录不存在: {0}")]
    NotFound(String),

    #[error("冲突: {0}")]
    Conflict(String),

    #[error("存储不可用: {0}")]
    StoreUnavailable(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// 存储层故障可整体重试(所有写操作均幂等)
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key_error(&err) {
            AppError::Conflict(err.to_string())
        } else {
            AppError::StoreUnavailable(err.to_string())
        }
    }
}

/// 检查是否为MongoDB重复键错误(E11000)
///
/// insert_one 走 WriteError，findAndModify(upsert) 走 CommandError，两种都要识别。
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    const DUPLICATE_KEY: i32 = 11000;

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => {
            let msg = err.to_string();
            msg.contains("E11000") && msg.contains("duplicate key")
        }
    }
}

/// Result类型别名
pub type AppResult<T> = std::result::Result<T, AppError>;
