//! 页面抓取协作方
//!
//! 引擎只依赖这个能力接口，真正的抓取方式（浏览器、HTTP）在外部实现。

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::{JobError, JobResult};
use crate::models::{FetchedPage, Identity, SearchQuery};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 执行一次查询并返回页面信号与结果
    async fn fetch_page(&self, query: &SearchQuery) -> Result<FetchedPage>;

    /// 清除最近 `window` 时间内的会话数据（cookie、缓存）
    async fn reset_session(&self, window: Duration) -> Result<()>;

    /// 之后的请求使用新身份
    async fn apply_identity(&self, identity: &Identity) -> Result<()>;
}

/// 给外部调用加上超时
///
/// 超时映射为 `Timeout`，其他失败映射为 `CollaboratorFailure`。
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, call: F) -> JobResult<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(JobError::collaborator(operation, e)),
        Err(_) => Err(JobError::Timeout {
            operation: operation.to_string(),
            after: limit,
        }),
    }
}
