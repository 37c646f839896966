//! 通知总线 - 基础设施层
//!
//! 单向广播，发送方不等待确认；没有订阅者或订阅者掉队都不会影响主流程。

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{Keyword, ProgressSnapshot, ResultRecord};

/// 任务事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobEvent {
    ProgressUpdate {
        status: String,
        processed: usize,
        total: usize,
    },
    ItemResult {
        record: ResultRecord,
        processed: usize,
        total: usize,
    },
    JobFinished {
        processed: usize,
        total: usize,
    },
    JobFailed {
        keyword: Option<Keyword>,
        processed: usize,
        total: usize,
        cause: String,
    },
    BlockInterrupt {
        keyword: Keyword,
        processed: usize,
        total: usize,
        attempt: u32,
        evidence: Vec<String>,
    },
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::ProgressUpdate { .. } => "progress-update",
            JobEvent::ItemResult { .. } => "item-result",
            JobEvent::JobFinished { .. } => "job-finished",
            JobEvent::JobFailed { .. } => "job-failed",
            JobEvent::BlockInterrupt { .. } => "block-interrupt",
        }
    }

    /// 事件对应的进度快照
    pub fn snapshot(&self) -> ProgressSnapshot {
        match self {
            JobEvent::ProgressUpdate {
                processed, total, ..
            }
            | JobEvent::JobFinished { processed, total } => {
                ProgressSnapshot::new(None, *processed, *total)
            }
            JobEvent::ItemResult {
                record,
                processed,
                total,
            } => ProgressSnapshot::new(Some(record.keyword.clone()), *processed, *total),
            JobEvent::JobFailed {
                keyword,
                processed,
                total,
                ..
            } => ProgressSnapshot::new(keyword.clone(), *processed, *total),
            JobEvent::BlockInterrupt {
                keyword,
                processed,
                total,
                ..
            } => ProgressSnapshot::new(Some(keyword.clone()), *processed, *total),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// 发送事件，不关心是否有人接收
    pub fn emit(&self, event: JobEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            debug!("事件 {} 没有订阅者", name);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
