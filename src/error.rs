//! 错误分类
//!
//! 编排器只在 `BlockDetected` 上做本地恢复（有次数上限），其余错误一律终止本次运行，
//! 已写入账本的结果不会丢弃。

use std::time::Duration;

use thiserror::Error;

use crate::models::{Keyword, Stage};

/// 外部调用失败时携带的底层错误
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 任务错误类型
#[derive(Debug, Error)]
pub enum JobError {
    /// 上游正在封锁自动化访问（可重试，有上限）
    #[error("检测到封锁: 关键词 {keyword} 阶段 {stage} 证据 [{}]", evidence.join("; "))]
    BlockDetected {
        keyword: Keyword,
        stage: Stage,
        evidence: Vec<String>,
    },

    /// 外部调用超时（本次运行终止，不自动重试）
    #[error("操作 {operation} 超时 (超过 {}秒)", after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// 关键词为空或无法编码
    #[error("无效的关键词 {value:?}: {reason}")]
    InvalidItem { value: String, reason: String },

    /// 其他外部协作方失败（抓取、存储、会话重置等）
    #[error("外部调用失败 ({operation}): {source}")]
    CollaboratorFailure {
        operation: String,
        #[source]
        source: BoxedSource,
    },
}

impl JobError {
    /// 包装外部协作方错误
    pub fn collaborator(operation: impl Into<String>, source: anyhow::Error) -> Self {
        JobError::CollaboratorFailure {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// 只有封锁信号允许编排器重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::BlockDetected { .. })
    }

    /// 事件与日志中使用的简短分类名
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::BlockDetected { .. } => "block_detected",
            JobError::Timeout { .. } => "timeout",
            JobError::InvalidItem { .. } => "invalid_item",
            JobError::CollaboratorFailure { .. } => "collaborator_failure",
        }
    }
}

/// 任务结果类型
pub type JobResult<T> = Result<T, JobError>;
