//! Webhook 告警服务 - 业务能力层
//!
//! 订阅通知总线，把终止和封锁事件转发到聊天 webhook。
//! 发送失败只记日志，不影响任务。

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::infrastructure::JobEvent;
use crate::models::ProgressSnapshot;

pub struct WebhookAlerter {
    client: Client,
    url: String,
}

impl WebhookAlerter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("创建 webhook 客户端失败")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// 发送一条告警
    pub async fn send(&self, message: &str, progress: &ProgressSnapshot) -> Result<()> {
        let keyword = progress
            .keyword
            .as_ref()
            .map(|k| k.as_str())
            .unwrap_or("-");
        let text = format!(
            "{}\n关键词: {}\n进度: {}/{}",
            message, keyword, progress.processed, progress.total
        );

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .context("webhook 请求失败")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("webhook 返回状态 {}", status);
        }
        debug!("webhook 告警已发送");
        Ok(())
    }

    /// 在后台监听事件直到总线关闭
    pub fn spawn(self, mut rx: broadcast::Receiver<JobEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(message) = alert_for(&event) {
                            if let Err(e) = self.send(&message, &event.snapshot()).await {
                                warn!("⚠️  webhook 告警发送失败: {:#}", e);
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("告警监听落后，跳过 {} 条事件", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// 需要告警的事件对应的消息
pub fn alert_for(event: &JobEvent) -> Option<String> {
    match event {
        JobEvent::BlockInterrupt {
            attempt, evidence, ..
        } => Some(format!(
            "🛑 检测到封锁 (第 {} 次)\n依据: {}",
            attempt,
            evidence.join(", ")
        )),
        JobEvent::JobFailed { cause, .. } => Some(format!("❌ 任务终止: {}", cause)),
        JobEvent::JobFinished { processed, total } => {
            Some(format!("✅ 任务完成 ({}/{})", processed, total))
        }
        JobEvent::ProgressUpdate { .. } | JobEvent::ItemResult { .. } => None,
    }
}
